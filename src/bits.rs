//! Bit pump between logical bit sequences and the 32-bit word stream.
//!
//! Flash reads back `0xFFFF_FFFF` where nothing was written, and the session manager uses
//! `0xFFFF_FFFE` as a raw, word aligned marker. Both values need an unbroken run of at least
//! 31 ones, so the encoder forces a `0` after every 30 consecutive ones and the decoder drops
//! the bit that follows such a run. The run counter carries across word boundaries.
//!
//! Bits enter a word at the top and are shifted right, so the first bit of a word lands in
//! bit 0 and the decoder consumes words starting from the least significant bit.

use crate::error::Error;

/// Length of a ones run after which a `0` is stuffed into the stream.
pub(crate) const MAX_ONES: u8 = 30;
pub(crate) const WORD_BITS: u8 = 32;

/// Receives every completed word from a [`BitWriter`].
pub trait WordSink {
    fn push_word(&mut self, word: u32) -> Result<(), Error>;
}

impl<S: WordSink> WordSink for &mut S {
    fn push_word(&mut self, word: u32) -> Result<(), Error> {
        (*self).push_word(word)
    }
}

/// Counts completed words without storing them. Used to check for space before anything is
/// written.
#[derive(Default)]
pub(crate) struct WordCounter(pub(crate) usize);

impl WordSink for WordCounter {
    fn push_word(&mut self, _word: u32) -> Result<(), Error> {
        self.0 += 1;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitWriter {
    acc: u32,
    len: u8,
    ones: u8,
}

impl BitWriter {
    pub const fn new() -> Self {
        Self {
            acc: 0,
            len: 0,
            ones: 0,
        }
    }

    /// Push one logical bit, stuffing a `0` after the 30th consecutive `1`.
    pub fn pump<S: WordSink>(&mut self, bit: bool, sink: &mut S) -> Result<(), Error> {
        let mut next = Some(bit);
        while let Some(bit) = next.take() {
            self.shift(bit, sink)?;
            if bit {
                self.ones += 1;
                if self.ones == MAX_ONES {
                    self.ones = 0;
                    next = Some(false);
                }
            } else {
                self.ones = 0;
            }
        }
        Ok(())
    }

    /// Push the `width` low bits of `value`, most significant bit first.
    pub fn pump_bits<S: WordSink>(
        &mut self,
        value: u32,
        width: u32,
        sink: &mut S,
    ) -> Result<(), Error> {
        for i in (0..width).rev() {
            self.pump(value & (1 << i) != 0, sink)?;
        }
        Ok(())
    }

    /// Forget the partial word and the ones run, e.g. before a raw marker is written.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// The bits of the partial word in stream order starting at bit 0, and how many there are.
    pub fn pending(&self) -> (u32, u8) {
        match self.len {
            0 => (0, 0),
            len => (self.acc >> (WORD_BITS - len), len),
        }
    }

    fn shift<S: WordSink>(&mut self, bit: bool, sink: &mut S) -> Result<(), Error> {
        self.acc = (self.acc >> 1) | ((bit as u32) << 31);
        self.len += 1;

        if self.len == WORD_BITS {
            let word = self.acc;
            self.acc = 0;
            self.len = 0;
            sink.push_word(word)?;
        }
        Ok(())
    }
}

/// One unit of the word stream as seen by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Word {
    /// Payload; `len` bits starting at bit 0 are valid. Only a not yet flushed tail is shorter
    /// than a full word.
    Data { bits: u32, len: u8 },
    /// A raw session marker.
    Marker,
    /// Unwritten flash or the end of the log region.
    End,
}

pub trait WordSource {
    fn next_word(&mut self) -> Result<Word, Error>;
}

/// Result of pulling a single logical bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Bit(bool),
    Marker,
    End,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BitReader {
    word: u32,
    avail: u8,
    ones: u8,
    drop_next: bool,
}

impl BitReader {
    pub const fn new() -> Self {
        Self {
            word: 0,
            avail: 0,
            ones: 0,
            drop_next: false,
        }
    }

    /// Next logical bit with stuffing removed. Markers and the end of the stream are passed
    /// through so the caller can react to them; both clear the ones run.
    pub fn unpump<S: WordSource>(&mut self, source: &mut S) -> Result<Pull, Error> {
        if self.drop_next {
            match self.raw_bit(source)? {
                Pull::Bit(_) => self.drop_next = false,
                other => return Ok(other),
            }
        }

        let pull = self.raw_bit(source)?;
        if let Pull::Bit(bit) = pull {
            if bit {
                self.ones += 1;
                if self.ones == MAX_ONES {
                    self.ones = 0;
                    self.drop_next = true;
                }
            } else {
                self.ones = 0;
            }
        }
        Ok(pull)
    }

    /// Read `width` logical bits most significant bit first. Returns the interrupting marker
    /// or end of stream if one shows up before all bits were read.
    pub fn unpump_bits<S: WordSource>(
        &mut self,
        width: u32,
        source: &mut S,
    ) -> Result<Result<u32, Pull>, Error> {
        let mut value = 0u32;
        for _ in 0..width {
            match self.unpump(source)? {
                Pull::Bit(bit) => value = (value << 1) | bit as u32,
                other => return Ok(Err(other)),
            }
        }
        Ok(Ok(value))
    }

    /// Drop whatever is left of the current word. Used by the word level fast scans.
    pub fn discard_word(&mut self) {
        *self = Self::new();
    }

    fn raw_bit<S: WordSource>(&mut self, source: &mut S) -> Result<Pull, Error> {
        while self.avail == 0 {
            match source.next_word()? {
                Word::Data { bits, len } => {
                    self.word = bits;
                    self.avail = len;
                }
                other => {
                    self.discard_word();
                    return Ok(match other {
                        Word::Marker => Pull::Marker,
                        _ => Pull::End,
                    });
                }
            }
        }

        let bit = self.word & 1 != 0;
        self.word >>= 1;
        self.avail -= 1;
        Ok(Pull::Bit(bit))
    }
}
