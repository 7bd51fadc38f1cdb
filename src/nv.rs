//! Append-only word storage on raw NOR flash, plus a separately erased config region at the
//! top of the store.
//!
//! ```text
//! start                                       config_start                 end
//!   | log words ... | cursor -> 0xFFFFFFFF ... |  config image + zero pad  |
//! ```
//!
//! Appends rely on NOR semantics: programming can only clear bits. The whole block holding the
//! cursor is read, the target word is patched into the copy and the block is programmed again.
//! Words already in the block are rewritten with their own value, the new word programs over
//! erased flash.

use crate::bits::WordSink;
use crate::config::{ConfigRecord, ConfigSource};
use crate::error::Error;
use crate::platform::{AlignedOps, Platform};
use alloc::vec;
use core::marker::PhantomData;
use core::ops::Range;
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

pub(crate) const WORD_SIZE: usize = 4;

/// Content of erased flash.
pub const EMPTY_WORD: u32 = 0xFFFF_FFFF;

/// Raw, word aligned start of a logging session. Can never be produced by the bit codec.
pub const SESSION_MARKER: u32 = 0xFFFF_FFFE;

pub struct NvStore<T: Platform, C: ConfigRecord> {
    pub(crate) hal: T,
    log_start: u32,
    config_start: u32,
    end: u32,
    cursor: u32,
    // a log erase failed half way, the content below the cursor is unknown
    torn: bool,
    _config: PhantomData<C>,
}

impl<T: Platform, C: ConfigRecord> NvStore<T, C> {
    /// Takes ownership of `region` and scans the log for the first unwritten word.
    ///
    /// Both ends of the region have to be aligned to the flash erase size. The config region is
    /// `C::SIZE` rounded up to whole blocks, at least one block has to remain for the log.
    pub fn new(hal: T, region: Range<u32>) -> Result<Self, Error> {
        if !T::ERASE_SIZE.is_multiple_of(WORD_SIZE)
            || !T::ERASE_SIZE.is_multiple_of(T::WRITE_SIZE)
            || !WORD_SIZE.is_multiple_of(T::READ_SIZE)
        {
            return Err(Error::UnsupportedGeometry);
        }

        if !(region.start as usize).is_multiple_of(T::ERASE_SIZE) {
            return Err(Error::InvalidRegionOffset);
        }

        if !(region.end as usize).is_multiple_of(T::ERASE_SIZE) || region.end <= region.start {
            return Err(Error::InvalidRegionSize);
        }

        let config_len = T::align_block_ceil(C::SIZE) as u32;
        let region_len = region.end - region.start;
        if config_len >= region_len {
            return Err(Error::InvalidRegionSize);
        }

        let mut store = Self {
            hal,
            log_start: region.start,
            config_start: region.end - config_len,
            end: region.end,
            cursor: region.start,
            torn: false,
            _config: PhantomData,
        };
        store.cursor = store.find_cursor()?;

        #[cfg(feature = "defmt")]
        trace!(
            "nv: log {:#x}..{:#x}, cursor {:#x}",
            store.log_start, store.config_start, store.cursor
        );

        #[cfg(feature = "debug-logs")]
        println!(
            "nv: log 0x{:08x}..0x{:08x} cursor 0x{:08x} config 0x{:08x}..0x{:08x}",
            store.log_start, store.config_start, store.cursor, store.config_start, store.end
        );

        Ok(store)
    }

    /// Release the flash.
    pub fn into_inner(self) -> T {
        self.hal
    }

    /// Append one word at the cursor.
    ///
    /// `0xFFFF_FFFF` is reserved for unwritten flash; passing it is a programming error. A target
    /// word that is not erased (an interrupted flush) fails with `FlashError` and blocks further
    /// appends until the region is flushed.
    pub fn append(&mut self, word: u32) -> Result<(), Error> {
        debug_assert_ne!(word, EMPTY_WORD, "unwritten marker may not be appended");
        if word == EMPTY_WORD {
            return Err(Error::ReservedWord);
        }

        if self.hal.is_active() {
            return Err(Error::Brownout);
        }

        if self.torn {
            return Err(Error::FlashError);
        }

        if self.cursor >= self.config_start {
            return Err(Error::LogFull);
        }

        let block_start = T::align_block_floor(self.cursor as usize) as u32;
        let mut block = vec![0u8; T::ERASE_SIZE];
        self.hal
            .read(block_start, &mut block)
            .map_err(|_| Error::FlashError)?;

        let offset = (self.cursor - block_start) as usize;
        let target = &mut block[offset..offset + WORD_SIZE];
        if target.iter().any(|&b| b != 0xFF) {
            // leftovers of an interrupted erase; programming would AND into them
            self.torn = true;

            #[cfg(feature = "defmt")]
            warn!("append @{:#x}: word not erased", self.cursor);

            return Err(Error::FlashError);
        }
        target.copy_from_slice(&word.to_le_bytes());

        #[cfg(feature = "defmt")]
        trace!("append @{:#x}: {:#x}", self.cursor, word);

        self.program_block(block_start, &block)?;
        self.cursor += WORD_SIZE as u32;
        Ok(())
    }

    /// Free log space in bytes.
    pub fn remaining_space(&self) -> usize {
        (self.config_start - self.cursor) as usize
    }

    /// Size of the log region in bytes.
    pub fn total_space(&self) -> usize {
        (self.config_start - self.log_start) as usize
    }

    pub fn remaining_words(&self) -> usize {
        self.remaining_space() / WORD_SIZE
    }

    /// Erase the whole log region, block by block.
    ///
    /// Stops at the first failing block. Once any block was erased, or a failed erase may have
    /// touched the first one, the region is in an unknown state and appends are refused until a
    /// later flush succeeds.
    pub fn flush_region(&mut self) -> Result<(), Error> {
        let mut addr = self.log_start;
        while addr < self.config_start {
            if let Err(e) = self.erase_block(addr) {
                // a brownout is detected before the block is touched
                if addr > self.log_start || e != Error::Brownout {
                    self.torn = true;
                }

                #[cfg(feature = "defmt")]
                warn!("flush_region: failed @{:#x}", addr);

                return Err(e);
            }
            addr += T::ERASE_SIZE as u32;
        }

        self.cursor = self.log_start;
        self.torn = false;
        Ok(())
    }

    /// Replace the stored config: erase the config region, then program the record image padded
    /// with zeros up to the end of the region.
    pub fn write_config(&mut self, config: &C) -> Result<(), Error> {
        let block = T::ERASE_SIZE;
        let mut image = vec![0u8; (self.end - self.config_start) as usize];
        config.to_bytes(&mut image[..C::SIZE]);

        #[cfg(feature = "defmt")]
        trace!("write_config: version {:#x}", config.version());

        let mut addr = self.config_start;
        while addr < self.end {
            self.erase_block(addr)?;
            addr += block as u32;
        }

        for (i, chunk) in image.chunks(block).enumerate() {
            self.program_block(self.config_start + (i * block) as u32, chunk)?;
        }
        Ok(())
    }

    /// Decode the record currently stored in the config region.
    pub fn read_config(&mut self) -> Result<C, Error> {
        let mut image = vec![0u8; (self.end - self.config_start) as usize];
        self.hal
            .read(self.config_start, &mut image)
            .map_err(|_| Error::FlashError)?;
        Ok(C::from_bytes(&image[..C::SIZE]))
    }

    /// Read the stored config. A record with a different version (including erased flash) is
    /// replaced by `C::factory_default()`, which is committed and read back.
    pub fn load_config(&mut self) -> Result<(C, ConfigSource), Error> {
        let config = self.read_config()?;
        if config.version() == C::VERSION {
            return Ok((config, ConfigSource::Stored));
        }

        #[cfg(feature = "defmt")]
        warn!(
            "load_config: version {:#x} != {:#x}, restoring defaults",
            config.version(),
            C::VERSION
        );

        #[cfg(feature = "debug-logs")]
        println!(
            "nv: config version 0x{:08x} != 0x{:08x}, restoring defaults",
            config.version(),
            C::VERSION
        );

        self.write_config(&C::factory_default())?;
        Ok((self.read_config()?, ConfigSource::FactoryDefault))
    }

    pub(crate) fn log_start(&self) -> u32 {
        self.log_start
    }

    /// End of the stored log. Anything between here and the config region is not part of it,
    /// even if it is not erased.
    pub(crate) fn cursor(&self) -> u32 {
        self.cursor
    }

    pub(crate) fn read_word(&mut self, addr: u32) -> Result<u32, Error> {
        let mut buf = [0u8; WORD_SIZE];
        self.hal
            .read(addr, &mut buf)
            .map_err(|_| Error::FlashError)?;
        Ok(u32::from_le_bytes(buf))
    }

    // Boot scan: the first unwritten word, or the end of the log if there is none.
    fn find_cursor(&mut self) -> Result<u32, Error> {
        let mut block = vec![0u8; T::ERASE_SIZE];
        let mut block_start = self.log_start;
        while block_start < self.config_start {
            self.hal
                .read(block_start, &mut block)
                .map_err(|_| Error::FlashError)?;

            for (i, word) in block.chunks_exact(WORD_SIZE).enumerate() {
                if word.iter().all(|&b| b == 0xFF) {
                    return Ok(block_start + (i * WORD_SIZE) as u32);
                }
            }
            block_start += T::ERASE_SIZE as u32;
        }
        Ok(self.config_start)
    }

    fn program_block(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        if self.hal.is_active() {
            return Err(Error::Brownout);
        }

        let hal = &mut self.hal;
        critical_section::with(|_| hal.write(addr, data)).map_err(|_| Error::FlashError)
    }

    fn erase_block(&mut self, addr: u32) -> Result<(), Error> {
        if self.hal.is_active() {
            return Err(Error::Brownout);
        }

        #[cfg(feature = "defmt")]
        trace!("erase_block @{:#x}", addr);

        let hal = &mut self.hal;
        critical_section::with(|_| hal.erase(addr, addr + T::ERASE_SIZE as u32))
            .map_err(|_| Error::FlashError)
    }
}

impl<T: Platform, C: ConfigRecord> WordSink for NvStore<T, C> {
    fn push_word(&mut self, word: u32) -> Result<(), Error> {
        self.append(word)
    }
}
