//! Host side inspection of raw `reflow-nvlog` flash dumps.
//!
//! The image has to cover the whole store region: the log followed by the [`SysConfig`] region
//! at the top, with the controller's 64 byte program blocks. Images are only ever read, opening
//! one does not start a new session.

pub mod error;
pub mod image;

mod csv_writer;

use std::fs;
use std::path::Path;

pub use error::Error;
pub use image::{BLOCK_SIZE, ImageFlash};
use reflow_nvlog::{
    ConfigRecord, LogEntry, LogIterator, NvStore, OVEN_CATALOG, SessionSummary, SysConfig,
};

/// Overview of a stored log as printed by `reflow-nvlog-tool info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// All sessions in order, including the ones without entries.
    pub sessions: Vec<SessionSummary>,
    /// Number of session markers, i.e. the session the next entry would belong to.
    pub current_session: u32,
    /// Log bytes in use.
    pub used: usize,
    /// Log bytes still free.
    pub free: usize,
}

/// A dumped store region, decoded with [`OVEN_CATALOG`] and [`SysConfig`].
pub struct LogImage {
    nv: NvStore<ImageFlash, SysConfig>,
}

impl LogImage {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, Error> {
        let len = data.len();
        if len == 0 || !len.is_multiple_of(BLOCK_SIZE) {
            return Err(Error::InvalidImageSize(len));
        }

        let nv = NvStore::new(ImageFlash::new(data), 0..len as u32).map_err(|e| match e {
            reflow_nvlog::error::Error::InvalidRegionSize => Error::InvalidImageSize(len),
            e => e.into(),
        })?;
        Ok(Self { nv })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_bytes(fs::read(path)?)
    }

    pub fn info(&mut self) -> Result<ImageInfo, Error> {
        let current_session = LogIterator::new(&mut self.nv, OVEN_CATALOG).goto_end()?;
        let sessions = LogIterator::new(&mut self.nv, OVEN_CATALOG).summarize()?;
        Ok(ImageInfo {
            sessions,
            current_session,
            used: self.nv.total_space() - self.nv.remaining_space(),
            free: self.nv.remaining_space(),
        })
    }

    /// Every stored entry in replay order.
    pub fn entries(&mut self) -> Result<Vec<LogEntry>, Error> {
        LogIterator::new(&mut self.nv, OVEN_CATALOG)
            .map(|entry| entry.map_err(Error::from))
            .collect()
    }

    /// Export all entries as CSV with the columns `session,tag,name,value,units`.
    pub fn to_csv(&mut self) -> Result<String, Error> {
        csv_writer::write_csv_content(&self.entries()?)
    }

    pub fn to_csv_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        csv_writer::write_csv(&self.entries()?, path)
    }

    /// The stored config record and whether its version matches this build. A mismatching
    /// record would be replaced by factory defaults on the controller's next boot.
    pub fn config(&mut self) -> Result<(SysConfig, bool), Error> {
        let config = self.nv.read_config()?;
        let current = config.version() == SysConfig::VERSION;
        Ok((config, current))
    }
}
