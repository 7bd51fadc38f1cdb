use std::path::PathBuf;

use clap::{
    Parser,
    Subcommand,
};
use reflow_nvlog::config::Autorun;
use reflow_nvlog_tool::LogImage;

#[derive(Parser)]
#[command(name = "reflow-nvlog-tool")]
#[command(about = "Reflow oven log store inspector", long_about = None)]
struct Cli {
    /// Raw dump of the whole store region
    image: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the sessions, their entry counts and the space in use
    Info,
    /// Export every log entry to a CSV file
    Dump {
        /// Output CSV file path
        output: PathBuf,
    },
    /// Print the stored config record
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    println!("Reading image: {}", cli.image.display());
    let mut image = LogImage::from_file(&cli.image)?;

    match cli.command {
        Commands::Info => {
            let info = image.info()?;
            println!("Current session: {}", info.current_session);
            for summary in &info.sessions {
                println!("  session {:>4}: {} entries", summary.session, summary.entries);
            }
            println!(
                "Log: {} bytes used, {} bytes free",
                info.used, info.free
            );

            Ok(())
        }
        Commands::Dump { output } => {
            let entries = image.entries()?;
            println!("Found {} entries", entries.len());

            image.to_csv_file(&output)?;
            println!("Successfully wrote log to: {}", output.display());

            Ok(())
        }
        Commands::Config => {
            let (config, current) = image.config()?;
            println!(
                "Version: 0x{:08X} ({})",
                config.version,
                if current {
                    "current"
                } else {
                    "outdated, factory defaults are restored on next boot"
                }
            );
            if !current {
                return Ok(());
            }

            println!("Log output: {}", if config.log_output_csv { "CSV" } else { "text" });
            println!(
                "Set point: {}.{} °C",
                config.set_point / 10,
                config.set_point % 10
            );
            println!("Record interval: {} s", config.record_interval);
            println!(
                "PID: k={} Cp={} Ci={} Cd={}",
                config.k, config.cp, config.ci, config.cd
            );
            for (i, profile) in config.profiles.iter().enumerate() {
                println!("Profile {i}: {}", profile.name.as_str());
                for step in &profile.steps {
                    println!("  {:?}", step);
                }
            }
            match config.autorun {
                Autorun::Idle => println!("Autorun: idle"),
                Autorun::Static => println!("Autorun: static set point"),
                Autorun::Profile(i) => println!("Autorun: profile {i}"),
            }

            Ok(())
        }
    }
}
