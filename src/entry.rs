use crate::bits::{BitReader, BitWriter, Pull, WordSink, WordSource};
use crate::catalog::{Catalog, Variable};
use crate::error::Error;

/// A decoded log record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogEntry {
    /// Session the entry was written in, counting from 1.
    pub session: u32,
    pub tag: u8,
    /// The value as stored, before scaling.
    pub raw: u32,
    pub variable: &'static Variable,
}

impl LogEntry {
    /// The value as presented to the user: `raw * scale`.
    pub fn value(&self) -> u32 {
        self.variable.present(self.raw)
    }

    pub fn name(&self) -> &'static str {
        self.variable.name
    }

    pub fn units(&self) -> &'static str {
        self.variable.units
    }

    pub fn scale(&self) -> u32 {
        self.variable.scale
    }
}

/// Pump `tag` and the quantized `value` into the writer, both most significant bit first.
pub(crate) fn encode<S: WordSink>(
    writer: &mut BitWriter,
    sink: &mut S,
    catalog: &Catalog,
    tag: u8,
    value: u32,
) -> Result<(), Error> {
    let variable = catalog.get(tag).ok_or(Error::UnknownVariable(tag))?;
    writer.pump_bits(tag as u32, catalog.tag_bits(), sink)?;
    writer.pump_bits(variable.quantize(value), variable.bits, sink)
}

/// Outcome of decoding a single entry from the bit stream.
pub(crate) enum Decoded {
    Entry { tag: u8, raw: u32, variable: &'static Variable },
    /// A session marker cut the entry short; whatever was read belongs to nothing.
    Marker,
    End,
}

pub(crate) fn decode<S: WordSource>(
    reader: &mut BitReader,
    source: &mut S,
    catalog: &Catalog,
) -> Result<Decoded, Error> {
    let tag = match reader.unpump_bits(catalog.tag_bits(), source)? {
        Ok(tag) => tag as u8,
        Err(pull) => return Ok(interrupted(pull)),
    };

    let variable = catalog.get(tag).ok_or(Error::UnknownVariable(tag))?;
    match reader.unpump_bits(variable.bits, source)? {
        Ok(raw) => Ok(Decoded::Entry { tag, raw, variable }),
        Err(pull) => Ok(interrupted(pull)),
    }
}

fn interrupted(pull: Pull) -> Decoded {
    match pull {
        Pull::Marker => Decoded::Marker,
        _ => Decoded::End,
    }
}
