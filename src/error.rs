use thiserror::Error;

/// Errors that can occur during log and config operations. Marked as non-exhaustive to allow
/// for future additions without breaking the API. A caller would usually only need to handle
/// `LogFull` and `Brownout` at runtime, the other errors are static or hardware faults.
#[derive(Error, Debug, PartialEq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The region start has to be aligned to the flash erase size
    #[error("invalid region offset")]
    InvalidRegionOffset,

    /// The region end has to be aligned to the flash erase size and leave at least one block
    /// for the log after the config region was carved off the top.
    #[error("invalid region size")]
    InvalidRegionSize,

    /// The flash erase size must hold whole words and whole write units, and a word has to be
    /// readable on its own.
    #[error("unsupported flash geometry")]
    UnsupportedGeometry,

    /// The internal error value is returned from the provided `NorFlash`, or the log region was
    /// left half erased and needs another flush.
    #[error("internal flash error")]
    FlashError,

    /// The supply voltage is currently unsafe for program or erase operations.
    #[error("brownout active")]
    Brownout,

    /// The append cursor reached the config region.
    #[error("log full")]
    LogFull,

    /// `0xFFFF_FFFF` marks unwritten flash and may not be appended.
    #[error("reserved word")]
    ReservedWord,

    /// The tag is not part of the catalog.
    #[error("unknown variable: {0}")]
    UnknownVariable(u8),
}
