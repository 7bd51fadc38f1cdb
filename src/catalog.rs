use core::fmt;
use strum::EnumCount;

/// How a single loggable quantity is stored and presented.
#[derive(Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Variable {
    /// Stored width of the scaled value.
    pub bits: u32,
    /// Values are divided by this before they are stored and multiplied on replay.
    pub scale: u32,
    pub units: &'static str,
    pub name: &'static str,
}

impl Variable {
    /// Usage: `Variable::new(12, 1, "°C", "Temperature")`
    ///
    /// Tip: use a const context so invalid widths or scales fail at compile time.
    pub const fn new(bits: u32, scale: u32, units: &'static str, name: &'static str) -> Self {
        assert!(bits >= 1 && bits <= 32);
        assert!(scale >= 1);
        Self {
            bits,
            scale,
            units,
            name,
        }
    }

    /// Largest raw value that fits into `bits`.
    pub const fn max_raw(&self) -> u32 {
        if self.bits == 32 {
            u32::MAX
        } else {
            (1 << self.bits) - 1
        }
    }

    /// Scales `value` down and saturates it to the stored width.
    pub const fn quantize(&self, value: u32) -> u32 {
        let raw = value / self.scale;
        if raw > self.max_raw() {
            self.max_raw()
        } else {
            raw
        }
    }

    pub const fn present(&self, raw: u32) -> u32 {
        raw.saturating_mul(self.scale)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Variable({:?}, {} bits, x{} {})",
            self.name, self.bits, self.scale, self.units
        )
    }
}

/// Ordered table of loggable variables. The position in the table is the tag written to flash.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Catalog {
    tag_bits: u32,
    variables: &'static [Variable],
}

impl Catalog {
    /// `tag_bits` is the fixed width of every stored tag and may be at most 8.
    pub const fn new(tag_bits: u32, variables: &'static [Variable]) -> Self {
        assert!(tag_bits >= 1 && tag_bits <= 8);
        assert!(!variables.is_empty());
        assert!(variables.len() <= 1 << tag_bits);
        Self {
            tag_bits,
            variables,
        }
    }

    pub const fn tag_bits(&self) -> u32 {
        self.tag_bits
    }

    pub const fn len(&self) -> usize {
        self.variables.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn get(&self, tag: u8) -> Option<&'static Variable> {
        self.variables.get(tag as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &'static Variable)> {
        self.variables
            .iter()
            .enumerate()
            .map(|(tag, variable)| (tag as u8, variable))
    }
}

/// Tenths of a degree per degree Celsius.
pub const DEGREE: u32 = 10;

/// Tags of the stock reflow oven catalog.
#[derive(strum::FromRepr, strum::Display, strum::EnumCount, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OvenVariable {
    Temperature = 0,
    OnPercentage = 1,
    RecordInterval = 2,
    Setpoint = 3,
    BodTriggered = 4,
}

impl From<OvenVariable> for u8 {
    fn from(val: OvenVariable) -> Self {
        val as u8
    }
}

const OVEN_VARIABLES: [Variable; OvenVariable::COUNT] = [
    Variable::new(12, 1, "°C", "Temperature"),
    Variable::new(7, 1, "%", "On Percentage"),
    Variable::new(7, 1, "s", "Record Interval"),
    Variable::new(8, DEGREE, "°C", "Setpoint"),
    Variable::new(1, 1, "BOOL", "BOD Triggered"),
];

/// The variables logged by the oven controller, four tag bits each.
pub const OVEN_CATALOG: Catalog = Catalog::new(4, &OVEN_VARIABLES);
