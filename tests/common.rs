#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use reflow_nvlog::ConfigRecord;
use reflow_nvlog::platform::Brownout;

pub const BLOCK_SIZE: usize = 64;
pub const WORD_SIZE: usize = 4;

#[derive(Default)]
pub struct Flash {
    pub buf: Vec<u8>,
    pub fail_after_operation: usize,
    pub fail_at_operation: Option<usize>,
    pub operations: Vec<Operation>,
    pub brownout: bool,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { offset: u32, len: usize },
    Write { offset: u32, len: usize },
    Erase { offset: u32, len: usize },
    Fault,
}

impl Flash {
    pub fn new(blocks: usize) -> Self {
        Self {
            buf: vec![0xffu8; BLOCK_SIZE * blocks],
            fail_after_operation: usize::MAX,
            ..Default::default()
        }
    }

    pub fn new_with_fault(blocks: usize, fail_after_operation: usize) -> Self {
        Self {
            fail_after_operation,
            ..Self::new(blocks)
        }
    }

    /// Fail only operation number `operation`, counted from zero.
    pub fn new_with_single_fault(blocks: usize, operation: usize) -> Self {
        Self {
            fail_at_operation: Some(operation),
            ..Self::new(blocks)
        }
    }

    fn should_fail(&self) -> bool {
        let op = self.operations.len();
        op >= self.fail_after_operation || self.fail_at_operation == Some(op)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
    }

    /// Fail every operation from now on.
    pub fn fail_now(&mut self) {
        self.fail_after_operation = self.operations.len();
    }

    pub fn word(&self, index: usize) -> u32 {
        let offset = index * WORD_SIZE;
        u32::from_le_bytes(self.buf[offset..offset + WORD_SIZE].try_into().unwrap())
    }

    pub fn words(&self) -> Vec<u32> {
        (0..self.buf.len() / WORD_SIZE).map(|i| self.word(i)).collect()
    }

    pub fn mutations(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Write { .. } | Operation::Erase { .. }))
            .count()
    }

    pub fn erases(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Erase { .. }))
            .count()
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }
}

#[derive(Debug)]
pub struct FlashError;

impl NorFlashError for FlashError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

impl ErrorType for Flash {
    type Error = FlashError;
}

impl ReadNorFlash for Flash {
    const READ_SIZE: usize = WORD_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::READ_SIZE as _));

        if self.should_fail() {
            println!("    flash: FAULT");
            self.fail_at_operation = None;
            self.operations.push(Operation::Fault);
            return Err(FlashError);
        }
        self.operations.push(Operation::Read {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl NorFlash for Flash {
    const WRITE_SIZE: usize = WORD_SIZE;

    const ERASE_SIZE: usize = BLOCK_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        assert!(from.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to.is_multiple_of(Self::ERASE_SIZE as _));

        println!(
            "    flash: erase: {from:04X} - {to:04X} #{:>2}",
            self.operations.len()
        );

        if self.should_fail() {
            println!("    flash: FAULT");
            self.fail_at_operation = None;
            self.operations.push(Operation::Fault);
            return Err(FlashError);
        }

        self.operations.push(Operation::Erase {
            offset: from,
            len: (to - from) as usize,
        });

        for addr in from..to {
            self.buf[addr as usize] = 0xff;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::WRITE_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::WRITE_SIZE as _));

        println!(
            "    flash: write: 0x{offset:04X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );

        if self.should_fail() {
            println!("    flash: FAULT");
            self.fail_at_operation = None;
            self.operations.push(Operation::Fault);
            return Err(FlashError);
        }
        assert!(bytes.len() > 0);

        self.operations.push(Operation::Write {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        for (i, &val) in bytes.iter().enumerate() {
            // NOR flash can only flip bits from 1 to 0
            self.buf[offset + i] &= val;
        }
        Ok(())
    }
}

impl Brownout for Flash {
    fn is_active(&self) -> bool {
        self.brownout
    }
}

/// An eight byte record, one block of config region with the test geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct TinyConfig {
    pub version: u32,
    pub value: u32,
}

impl ConfigRecord for TinyConfig {
    const VERSION: u32 = 7;
    const SIZE: usize = 8;

    fn factory_default() -> Self {
        Self {
            version: Self::VERSION,
            value: 42,
        }
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn to_bytes(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.version.to_le_bytes());
        buf[4..].copy_from_slice(&self.value.to_le_bytes());
    }

    fn from_bytes(buf: &[u8]) -> Self {
        Self {
            version: u32::from_le_bytes(buf[..4].try_into().unwrap()),
            value: u32::from_le_bytes(buf[4..].try_into().unwrap()),
        }
    }
}
