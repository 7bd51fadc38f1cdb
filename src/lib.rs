#![doc = include_str ! ("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

pub mod bits;
pub mod catalog;
pub mod config;
mod entry;
pub mod error;
mod iter;
mod nv;
pub mod platform;

extern crate alloc;

pub use catalog::{Catalog, OVEN_CATALOG, OvenVariable, Variable};
pub use config::{ConfigRecord, ConfigSource, SysConfig};
pub use entry::LogEntry;
pub use iter::{IterState, LogIterator, SessionSummary};
pub use nv::{EMPTY_WORD, NvStore, SESSION_MARKER};

use crate::bits::{BitWriter, WordCounter};
use crate::error::Error;
use crate::platform::Platform;
use alloc::vec::Vec;
use core::ops::Range;
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

/// The session-aware log. Owns the flash region, the bit writer and the session counter.
///
/// Every instance starts a new session when it is created, so session boundaries line up with
/// power cycles and explicit [`LogStore::new_session`] calls.
pub struct LogStore<T: Platform, C: ConfigRecord> {
    nv: NvStore<T, C>,
    writer: BitWriter,
    catalog: Catalog,
    sessions: u32,
    // the marker of the current session still has to be written
    marker_pending: bool,
}

impl<T: Platform, C: ConfigRecord> LogStore<T, C> {
    /// Scans the region, counts the sessions already stored and opens a new one.
    ///
    /// Failing to write the new session marker (full log, brownout) does not fail the boot. The
    /// marker is written in front of the next entry instead.
    pub fn new(hal: T, region: Range<u32>, catalog: Catalog) -> Result<Self, Error> {
        let mut nv = NvStore::new(hal, region)?;
        let sessions = LogIterator::new(&mut nv, catalog).goto_end()?;

        let mut store = Self {
            nv,
            writer: BitWriter::new(),
            catalog,
            sessions,
            marker_pending: false,
        };

        #[cfg(feature = "defmt")]
        trace!("log: {} sessions stored", sessions);

        if let Err(_e) = store.new_session() {
            #[cfg(feature = "defmt")]
            warn!("log: boot session not started: {}", _e);

            #[cfg(feature = "debug-logs")]
            println!("log: boot session not started: {_e:?}");
        }

        Ok(store)
    }

    /// Start a new session: drop the writer's partial word and append a raw marker.
    pub fn new_session(&mut self) -> Result<(), Error> {
        self.writer.reset();
        self.marker_pending = true;
        self.nv.append(SESSION_MARKER)?;
        self.marker_pending = false;
        self.sessions += 1;

        #[cfg(feature = "defmt")]
        trace!("log: session {} started", self.sessions);

        Ok(())
    }

    /// Log `value` for the catalog entry `tag`.
    ///
    /// The value is divided by the variable's scale and saturated to its width. Nothing is
    /// written when the brownout detector is active or the completed words of this entry do not
    /// fit into the log. Using a tag outside of the catalog is a programming error.
    pub fn write(&mut self, tag: u8, value: u32) -> Result<(), Error> {
        debug_assert!(
            self.catalog.get(tag).is_some(),
            "tag {tag} is not part of the catalog"
        );
        if self.catalog.get(tag).is_none() {
            return Err(Error::UnknownVariable(tag));
        }

        if self.nv.hal.is_active() {
            return Err(Error::Brownout);
        }

        if self.marker_pending {
            self.new_session()?;
        }

        let mut probe = self.writer;
        let mut needed = WordCounter::default();
        entry::encode(&mut probe, &mut needed, &self.catalog, tag, value)?;
        if self.nv.remaining_words() == 0 || needed.0 > self.nv.remaining_words() {
            return Err(Error::LogFull);
        }

        if let Err(e) = entry::encode(&mut self.writer, &mut self.nv, &self.catalog, tag, value) {
            // part of the entry may be on flash already; resynchronise on a fresh marker
            self.writer.reset();
            self.marker_pending = true;

            #[cfg(feature = "defmt")]
            warn!("log: write of tag {} torn: {}", tag, e);

            return Err(e);
        }
        Ok(())
    }

    /// Erase all sessions and start over with session 1.
    pub fn flush_all(&mut self) -> Result<(), Error> {
        self.nv.flush_region()?;
        self.sessions = 0;
        self.new_session()
    }

    /// Number of sessions, including the current one.
    pub fn session_count(&self) -> u32 {
        self.sessions
    }

    /// Free log space in bytes.
    pub fn remaining_space(&self) -> usize {
        self.nv.remaining_space()
    }

    /// Size of the log region in bytes.
    pub fn total_space(&self) -> usize {
        self.nv.total_space()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Replay everything from the first session, including entries whose bits have not filled
    /// a flash word yet.
    pub fn iter(&mut self) -> LogIterator<'_, T, C> {
        LogIterator::with_tail(&mut self.nv, self.catalog, self.writer.pending())
    }

    /// Entry counts of all sessions.
    pub fn summary(&mut self) -> Result<Vec<SessionSummary>, Error> {
        self.iter().summarize()
    }

    pub fn read_config(&mut self) -> Result<C, Error> {
        self.nv.read_config()
    }

    pub fn write_config(&mut self, config: &C) -> Result<(), Error> {
        self.nv.write_config(config)
    }

    /// See [`NvStore::load_config`].
    pub fn load_config(&mut self) -> Result<(C, ConfigSource), Error> {
        self.nv.load_config()
    }

    /// Release the flash.
    pub fn into_inner(self) -> T {
        self.nv.into_inner()
    }
}
