use thiserror::Error;

/// Errors that can occur while loading or exporting a flash image.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to write CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("log store error: {0}")]
    StoreError(#[from] reflow_nvlog::error::Error),

    #[error("invalid image size {0}: must be a multiple of 64 bytes and leave room for the log")]
    InvalidImageSize(usize),

    #[error("invalid value: {0}")]
    InvalidValue(String),
}
