//! In-memory NOR flash backed by a dumped image.

use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use reflow_nvlog::platform::Brownout;

/// Program block size of the controller's flash.
pub const BLOCK_SIZE: usize = 64;
const WORD_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFlash {
    buf: Vec<u8>,
}

#[derive(Debug)]
pub struct OutOfBounds;

impl NorFlashError for OutOfBounds {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::OutOfBounds
    }
}

impl ImageFlash {
    pub fn new(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    /// A freshly erased image of `len` bytes.
    pub fn erased(len: usize) -> Self {
        Self::new(vec![0xFF; len])
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn range(&self, offset: u32, len: usize) -> Result<core::ops::Range<usize>, OutOfBounds> {
        let start = offset as usize;
        let end = start.checked_add(len).ok_or(OutOfBounds)?;
        if end > self.buf.len() {
            return Err(OutOfBounds);
        }
        Ok(start..end)
    }
}

impl ErrorType for ImageFlash {
    type Error = OutOfBounds;
}

impl ReadNorFlash for ImageFlash {
    const READ_SIZE: usize = WORD_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let range = self.range(offset, bytes.len())?;
        bytes.copy_from_slice(&self.buf[range]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl NorFlash for ImageFlash {
    const WRITE_SIZE: usize = WORD_SIZE;
    const ERASE_SIZE: usize = BLOCK_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        let range = self.range(from, to.saturating_sub(from) as usize)?;
        self.buf[range].fill(0xFF);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let range = self.range(offset, bytes.len())?;
        for (dst, src) in self.buf[range].iter_mut().zip(bytes) {
            *dst &= src;
        }
        Ok(())
    }
}

// A dump is inspected on the host, there is no supply to watch.
impl Brownout for ImageFlash {
    fn is_active(&self) -> bool {
        false
    }
}
