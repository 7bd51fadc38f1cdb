//! The configuration record kept at the top of the store region, and the oven controller's
//! concrete record.
//!
//! Records are stored as a fixed little endian byte image. Decoding never fails: an erased or
//! foreign image simply yields a record whose version does not match, which is the trigger for
//! falling back to factory defaults.

use core::fmt;

/// A fixed-size, versioned record that is committed as a whole.
pub trait ConfigRecord: Sized {
    /// Version expected by this build. Any other stored version is replaced by defaults.
    const VERSION: u32;

    /// Size of the byte image in bytes.
    const SIZE: usize;

    fn factory_default() -> Self;

    fn version(&self) -> u32;

    /// Serialize into `buf`, which is exactly `SIZE` bytes long.
    fn to_bytes(&self, buf: &mut [u8]);

    /// Deserialize from `buf`, which is exactly `SIZE` bytes long.
    fn from_bytes(buf: &[u8]) -> Self;
}

/// Where [`crate::NvStore::load_config`] got the record from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigSource {
    Stored,
    FactoryDefault,
}

pub const MAX_PROFILES: usize = 3;
pub const MAX_PROFILE_STEPS: usize = 5;
/// Profile names are stored in 23 bytes, shorter names are padded with null bytes.
pub const PROFILE_NAME_LENGTH: usize = 23;

/// Milliseconds per second.
const MS: u32 = 1000;
const DEGREE: u32 = crate::catalog::DEGREE;

const STEP_COMMAND_SHIFT: u32 = 28;
const STEP_TEMP_MASK: u32 = 0x0FFF_FFFF;

const AUTORUN_IDLE: u32 = 0xFFFF_FFFF;
const AUTORUN_STATIC: u32 = 0xFFFF_FFFE;

/// A 23-byte, null-padded profile name.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct ProfileName([u8; PROFILE_NAME_LENGTH]);

impl ProfileName {
    /// Usage: `ProfileName::from_str("Component Bake")`
    ///
    /// Tip: use a const context if possible to ensure that the name is transformed at compile
    /// time: `let name = const { ProfileName::from_str("Component Bake") };`
    pub const fn from_str(s: &str) -> Self {
        let src = s.as_bytes();
        assert!(src.len() <= PROFILE_NAME_LENGTH);
        let mut dst = [0u8; PROFILE_NAME_LENGTH];
        let mut i = 0;
        while i < src.len() {
            dst[i] = src[i];
            i += 1;
        }
        Self(dst)
    }

    pub const fn as_bytes(&self) -> &[u8; PROFILE_NAME_LENGTH] {
        &self.0
    }

    /// The name up to the first null byte, or an empty string if that is not valid UTF-8.
    pub fn as_str(&self) -> &str {
        let len = self
            .0
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(PROFILE_NAME_LENGTH);
        core::str::from_utf8(&self.0[..len]).unwrap_or("")
    }
}

impl fmt::Debug for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProfileName(b\"")?;
        for &byte in &self.0 {
            // escape_default would escape 0 as \x00, but \0 is more readable
            if byte == 0 {
                write!(f, "\\0")?;
                continue;
            }
            write!(f, "{}", core::ascii::escape_default(byte))?;
        }
        write!(f, "\")")
    }
}

/// What a profile step does. Stored in the top nibble of the step's temperature word.
#[derive(strum::FromRepr, strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StepKind {
    /// Hold the temperature for the given time.
    ReachTime = 0,
    /// Keep this step active forever.
    Forever = 1,
    /// Continue with another profile, `time` holds its index.
    Jump = 2,
    /// End of profile.
    End = 3,
    /// Reach the temperature as fast as possible.
    ReachTemp = 4,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProfileStep {
    pub kind: StepKind,
    /// Tenths of a degree, 28 bits.
    pub temp: u32,
    /// Milliseconds, or the target profile for [`StepKind::Jump`].
    pub time: u32,
}

impl ProfileStep {
    pub const fn new(kind: StepKind, temp: u32, time: u32) -> Self {
        Self { kind, temp, time }
    }

    pub const fn end() -> Self {
        Self::new(StepKind::End, 0, 0)
    }

    const fn command_word(&self) -> u32 {
        ((self.kind as u32) << STEP_COMMAND_SHIFT) | (self.temp & STEP_TEMP_MASK)
    }

    fn from_words(command: u32, time: u32) -> Self {
        // unknown commands stop the profile rather than running something undefined
        let kind = StepKind::from_repr((command >> STEP_COMMAND_SHIFT) as u8).unwrap_or(StepKind::End);
        Self {
            kind,
            temp: command & STEP_TEMP_MASK,
            time,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: ProfileName,
    pub steps: [ProfileStep; MAX_PROFILE_STEPS],
}

const PROFILE_SIZE: usize = PROFILE_NAME_LENGTH + 1 + MAX_PROFILE_STEPS * 8;

/// What the controller does after power up.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Autorun {
    /// No heating at all.
    Idle,
    /// Regulate to the static set point.
    Static,
    /// Run the profile with this index.
    Profile(u32),
}

impl From<Autorun> for u32 {
    fn from(val: Autorun) -> Self {
        match val {
            Autorun::Idle => AUTORUN_IDLE,
            Autorun::Static => AUTORUN_STATIC,
            Autorun::Profile(idx) => idx,
        }
    }
}

impl From<u32> for Autorun {
    fn from(val: u32) -> Self {
        match val {
            AUTORUN_IDLE => Autorun::Idle,
            AUTORUN_STATIC => Autorun::Static,
            idx => Autorun::Profile(idx),
        }
    }
}

/// Persistent configuration of the oven controller. Changing the layout requires bumping
/// [`SysConfig::VERSION`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysConfig {
    pub version: u32,
    pub log_output_csv: bool,
    /// Tenths of a degree.
    pub set_point: u32,
    /// Seconds between log records.
    pub record_interval: u32,
    /// Low pass filter constant in bits.
    pub k: u32,
    pub cp: i32,
    pub ci: i32,
    pub cd: i32,
    pub profiles: [Profile; MAX_PROFILES],
    pub autorun: Autorun,
}

const HEADER_SIZE: usize = 8 * 4;

impl ConfigRecord for SysConfig {
    const VERSION: u32 = 0x1401_1501;
    const SIZE: usize = HEADER_SIZE + MAX_PROFILES * PROFILE_SIZE + 4;

    fn factory_default() -> Self {
        use StepKind::*;

        Self {
            version: Self::VERSION,
            log_output_csv: true,
            set_point: 13 * DEGREE,
            record_interval: 20,
            k: 3,
            cp: 10,
            ci: 400,
            cd: 30000,
            profiles: [
                Profile {
                    name: ProfileName::from_str("Oven Reflow - Leaded"),
                    steps: [
                        ProfileStep::new(ReachTemp, 150 * DEGREE, 70 * MS),
                        ProfileStep::new(ReachTime, 175 * DEGREE, 130 * MS),
                        ProfileStep::new(ReachTemp, 220 * DEGREE, 40 * MS),
                        ProfileStep::new(ReachTime, 220 * DEGREE, 5 * MS),
                        ProfileStep::new(ReachTime, 50 * DEGREE, 100 * MS),
                    ],
                },
                Profile {
                    name: ProfileName::from_str("Oven Reflow - Unleaded"),
                    steps: [
                        ProfileStep::new(ReachTemp, 150 * DEGREE, 70 * MS),
                        ProfileStep::new(ReachTime, 175 * DEGREE, 130 * MS),
                        ProfileStep::new(ReachTemp, 245 * DEGREE, 40 * MS),
                        ProfileStep::new(ReachTime, 245 * DEGREE, 5 * MS),
                        ProfileStep::new(ReachTime, 50 * DEGREE, 100 * MS),
                    ],
                },
                Profile {
                    name: ProfileName::from_str("Component Bake"),
                    steps: [
                        ProfileStep::new(ReachTemp, 125 * DEGREE, 2000 * MS),
                        ProfileStep::new(ReachTime, 125 * DEGREE, 24 * 60 * 60 * MS),
                        ProfileStep::end(),
                        ProfileStep::end(),
                        ProfileStep::end(),
                    ],
                },
            ],
            autorun: Autorun::Static,
        }
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn to_bytes(&self, buf: &mut [u8]) {
        let mut w = Cursor::new(buf);
        w.put(self.version);
        w.put(self.log_output_csv as u32);
        w.put(self.set_point);
        w.put(self.record_interval);
        w.put(self.k);
        w.put(self.cp.cast_unsigned());
        w.put(self.ci.cast_unsigned());
        w.put(self.cd.cast_unsigned());
        for profile in &self.profiles {
            w.put_bytes(profile.name.as_bytes());
            w.put_bytes(&[0]);
            for step in &profile.steps {
                w.put(step.command_word());
                w.put(step.time);
            }
        }
        w.put(self.autorun.into());
    }

    fn from_bytes(buf: &[u8]) -> Self {
        let mut r = Cursor::new(buf);
        let version = r.get();
        let log_output_csv = r.get() != 0;
        let set_point = r.get();
        let record_interval = r.get();
        let k = r.get();
        let cp = r.get().cast_signed();
        let ci = r.get().cast_signed();
        let cd = r.get().cast_signed();
        let profiles = core::array::from_fn(|_| {
            let mut name = [0u8; PROFILE_NAME_LENGTH];
            name.copy_from_slice(r.get_bytes(PROFILE_NAME_LENGTH));
            r.get_bytes(1);
            let steps = core::array::from_fn(|_| {
                let command = r.get();
                let time = r.get();
                ProfileStep::from_words(command, time)
            });
            Profile {
                name: ProfileName(name),
                steps,
            }
        });
        let autorun = r.get().into();

        Self {
            version,
            log_output_csv,
            set_point,
            record_interval,
            k,
            cp,
            ci,
            cd,
            profiles,
            autorun,
        }
    }
}

/// Little endian field cursor over a record image.
struct Cursor<B> {
    buf: B,
    pos: usize,
}

impl<B> Cursor<B> {
    fn new(buf: B) -> Self {
        Self { buf, pos: 0 }
    }
}

impl Cursor<&mut [u8]> {
    fn put(&mut self, val: u32) {
        self.put_bytes(&val.to_le_bytes());
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }
}

impl<'a> Cursor<&'a [u8]> {
    fn get(&mut self) -> u32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.get_bytes(4));
        u32::from_le_bytes(raw)
    }

    fn get_bytes(&mut self, len: usize) -> &'a [u8] {
        let buf = self.buf;
        let bytes = &buf[self.pos..self.pos + len];
        self.pos += len;
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn layout_size() {
        assert_eq!(SysConfig::SIZE, 228);
    }

    #[test]
    fn image_roundtrip() {
        let mut config = SysConfig::factory_default();
        config.cd = -12;
        config.autorun = Autorun::Profile(2);
        config.profiles[1].steps[4] = ProfileStep::new(StepKind::Jump, 0, 2);

        let mut buf = vec![0u8; SysConfig::SIZE];
        config.to_bytes(&mut buf);
        assert_eq!(&buf[..4], &0x1401_1501u32.to_le_bytes());
        assert_eq!(SysConfig::from_bytes(&buf), config);
    }

    #[test]
    fn erased_image_has_foreign_version() {
        let buf = vec![0xFFu8; SysConfig::SIZE];
        let config = SysConfig::from_bytes(&buf);
        assert_ne!(config.version(), SysConfig::VERSION);
        assert_eq!(config.autorun, Autorun::Idle);
        assert_eq!(config.profiles[0].name.as_str(), "");
        assert_eq!(config.profiles[0].steps[0].kind, StepKind::End);
    }

    #[test]
    fn profile_names() {
        let config = SysConfig::factory_default();
        assert_eq!(config.profiles[1].name.as_str(), "Oven Reflow - Unleaded");
        assert_eq!(config.profiles[2].name.as_str(), "Component Bake");
        assert_eq!(
            format!("{:?}", ProfileName::from_str("ab")),
            "ProfileName(b\"ab\\0\\0\\0\\0\\0\\0\\0\\0\\0\\0\\0\\0\\0\\0\\0\\0\\0\\0\\0\\0\\0\")"
        );
    }
}
