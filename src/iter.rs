//! Replay of the stored log from the first word.

use crate::bits::{BitReader, Word, WordSource};
use crate::catalog::Catalog;
use crate::config::ConfigRecord;
use crate::entry::{self, Decoded, LogEntry};
use crate::error::Error;
use crate::nv::{EMPTY_WORD, NvStore, SESSION_MARKER, WORD_SIZE};
use crate::platform::Platform;
use alloc::vec::Vec;

#[derive(strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IterState {
    Ok,
    /// Flash could not be read or the stream contains a tag the catalog does not know.
    Error,
    /// Unwritten flash or the end of the log region was reached.
    End,
}

/// Number of entries in one session, as reported by [`LogIterator::summarize`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionSummary {
    pub session: u32,
    pub entries: u32,
}

// Raw words in write order up to the append cursor, followed by the writer's partial word if
// there is one.
struct StoredWords<'a, T: Platform, C: ConfigRecord> {
    nv: &'a mut NvStore<T, C>,
    addr: u32,
    tail: Option<(u32, u8)>,
}

impl<T: Platform, C: ConfigRecord> WordSource for StoredWords<'_, T, C> {
    fn next_word(&mut self) -> Result<Word, Error> {
        let end = self.nv.cursor();
        if self.addr < end {
            match self.nv.read_word(self.addr)? {
                EMPTY_WORD => self.addr = end,
                SESSION_MARKER => {
                    self.addr += WORD_SIZE as u32;
                    return Ok(Word::Marker);
                }
                bits => {
                    self.addr += WORD_SIZE as u32;
                    return Ok(Word::Data { bits, len: 32 });
                }
            }
        }

        Ok(match self.tail.take() {
            Some((bits, len)) => Word::Data { bits, len },
            None => Word::End,
        })
    }
}

/// Walks the log from the beginning, yielding entries in write order. Session markers are
/// consumed and only show up as an increasing [`LogEntry::session`].
///
/// The iterator only reads; it borrows the store mutably because flash reads need `&mut`.
pub struct LogIterator<'a, T: Platform, C: ConfigRecord> {
    source: StoredWords<'a, T, C>,
    reader: BitReader,
    catalog: Catalog,
    session: u32,
    state: IterState,
}

impl<'a, T: Platform, C: ConfigRecord> LogIterator<'a, T, C> {
    /// Replay only what is stored in flash.
    pub fn new(nv: &'a mut NvStore<T, C>, catalog: Catalog) -> Self {
        Self::with_tail(nv, catalog, (0, 0))
    }

    /// Replay flash followed by `pending`, the not yet flushed bits of the writer.
    pub(crate) fn with_tail(nv: &'a mut NvStore<T, C>, catalog: Catalog, pending: (u32, u8)) -> Self {
        let addr = nv.log_start();
        Self {
            source: StoredWords {
                nv,
                addr,
                tail: (pending.1 > 0).then_some(pending),
            },
            reader: BitReader::new(),
            catalog,
            session: 0,
            state: IterState::Ok,
        }
    }

    pub fn state(&self) -> IterState {
        self.state
    }

    /// Number of session markers passed so far.
    pub fn current_session(&self) -> u32 {
        self.session
    }

    /// Skip to the end of the log without decoding entries and return the number of sessions.
    ///
    /// Markers are always word aligned and payload words never equal the marker, so whole
    /// words can be skipped.
    pub fn goto_end(&mut self) -> Result<u32, Error> {
        while self.state == IterState::Ok {
            self.skip_word()?;
        }
        Ok(self.session)
    }

    /// Skip forward until session `session` starts. Returns `false` if the log ended first.
    pub fn goto_session(&mut self, session: u32) -> Result<bool, Error> {
        while self.state == IterState::Ok && self.session < session {
            self.skip_word()?;
        }
        Ok(self.state == IterState::Ok)
    }

    /// Consume the iterator and count the entries of every session. Sessions without entries
    /// are included, entries written before the first marker are reported as session 0.
    pub fn summarize(mut self) -> Result<Vec<SessionSummary>, Error> {
        let mut counts: Vec<u32> = Vec::new();
        for entry in self.by_ref() {
            let session = entry?.session as usize;
            if counts.len() <= session {
                counts.resize(session + 1, 0);
            }
            counts[session] += 1;
        }

        let last = self.session as usize;
        if counts.len() <= last {
            counts.resize(last + 1, 0);
        }

        Ok(counts
            .into_iter()
            .enumerate()
            .filter(|&(session, entries)| session > 0 || entries > 0)
            .map(|(session, entries)| SessionSummary {
                session: session as u32,
                entries,
            })
            .collect())
    }

    fn skip_word(&mut self) -> Result<(), Error> {
        self.reader.discard_word();
        match self.source.next_word() {
            Ok(Word::Marker) => self.session += 1,
            Ok(Word::Data { .. }) => {}
            Ok(Word::End) => self.state = IterState::End,
            Err(e) => {
                self.state = IterState::Error;
                return Err(e);
            }
        }
        Ok(())
    }

    fn next_entry(&mut self) -> Result<Option<LogEntry>, Error> {
        loop {
            match entry::decode(&mut self.reader, &mut self.source, &self.catalog)? {
                Decoded::Entry { tag, raw, variable } => {
                    return Ok(Some(LogEntry {
                        session: self.session,
                        tag,
                        raw,
                        variable,
                    }));
                }
                Decoded::Marker => self.session += 1,
                Decoded::End => return Ok(None),
            }
        }
    }
}

impl<T: Platform, C: ConfigRecord> Iterator for LogIterator<'_, T, C> {
    type Item = Result<LogEntry, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != IterState::Ok {
            return None;
        }

        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.state = IterState::End;
                None
            }
            Err(e) => {
                self.state = IterState::Error;
                Some(Err(e))
            }
        }
    }
}
