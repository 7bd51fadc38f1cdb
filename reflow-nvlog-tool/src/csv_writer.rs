use std::path::Path;

use csv::Writer;
use reflow_nvlog::LogEntry;
use serde::Serialize;

use crate::error::Error;

#[derive(Serialize)]
struct EntryRow<'a> {
    session: u32,
    tag: u8,
    name: &'a str,
    value: u32,
    units: &'a str,
}

impl<'a> From<&'a LogEntry> for EntryRow<'a> {
    fn from(entry: &'a LogEntry) -> Self {
        Self {
            session: entry.session,
            tag: entry.tag,
            name: entry.name(),
            value: entry.value(),
            units: entry.units(),
        }
    }
}

/// Write `entries` to a CSV file at `output_path`, one row per entry in replay order.
pub(crate) fn write_csv<P: AsRef<Path>>(entries: &[LogEntry], output_path: P) -> Result<(), Error> {
    let mut wtr = Writer::from_path(output_path)?;
    write_records(&mut wtr, entries)
}

/// Serialize `entries` to CSV and return the content as a `String`.
pub(crate) fn write_csv_content(entries: &[LogEntry]) -> Result<String, Error> {
    let mut wtr = Writer::from_writer(Vec::new());
    write_records(&mut wtr, entries)?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| Error::IoError(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::InvalidValue(format!("CSV output is not valid UTF-8: {}", e)))
}

fn write_records<W: std::io::Write>(wtr: &mut Writer<W>, entries: &[LogEntry]) -> Result<(), Error> {
    if entries.is_empty() {
        // serialize() only emits the header together with the first row
        wtr.write_record(["session", "tag", "name", "value", "units"])?;
    }

    for entry in entries {
        wtr.serialize(EntryRow::from(entry))?;
    }

    wtr.flush()?;
    Ok(())
}
