//! Argument checksums.
//!
//! Wire form is a one-byte type tag followed by a four-byte big-endian digest
//! for every type except [`ChecksumType::None`]. The digest in each frame of a
//! call covers every argument byte sent in that call so far, so the running
//! state lives in [`ChecksumState`] and is carried from frame to frame.

use std::fmt;

use chanwire_rw::{check_remaining, LengthResult, ReadResult, Rw, RwError, WriteResult};
use crc::{Crc, Digest, CRC_32_ISCSI, CRC_32_ISO_HDLC};

use crate::error::{FrameError, Result};

static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
static CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ChecksumType {
    #[default]
    None = 0x00,
    Crc32 = 0x01,
    Farm32 = 0x02,
    Crc32c = 0x03,
}

impl ChecksumType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::None),
            0x01 => Some(Self::Crc32),
            0x02 => Some(Self::Farm32),
            0x03 => Some(Self::Crc32c),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Crc32 => "crc32",
            Self::Farm32 => "farm32",
            Self::Crc32c => "crc32c",
        }
    }

    /// Digest bytes following the tag on the wire.
    pub fn digest_width(self) -> usize {
        match self {
            Self::None => 0,
            _ => 4,
        }
    }
}

impl fmt::Display for ChecksumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ChecksumType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "crc32" => Ok(Self::Crc32),
            "farm32" => Ok(Self::Farm32),
            "crc32c" => Ok(Self::Crc32c),
            other => Err(format!("unknown checksum type: {other}")),
        }
    }
}

/// A checksum as carried in a call body. `value` is zero for
/// [`ChecksumType::None`] and is not encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Checksum {
    pub kind: ChecksumType,
    pub value: u32,
}

impl Checksum {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(kind: ChecksumType, value: u32) -> Self {
        Self { kind, value }
    }
}

/// Codec for `csumtype:1 (csum:4)?`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumRw;

impl Rw for ChecksumRw {
    type Value = Checksum;

    fn byte_length(&self, value: &Checksum) -> LengthResult {
        check_digestless(value, 0)?;
        Ok(1 + value.kind.digest_width())
    }

    fn write_into(&self, value: &Checksum, buffer: &mut [u8], offset: usize) -> WriteResult {
        check_digestless(value, offset)?;
        let width = value.kind.digest_width();
        check_remaining(buffer, offset, 1 + width)?;
        buffer[offset] = value.kind.code();
        if width > 0 {
            buffer[offset + 1..offset + 5].copy_from_slice(&value.value.to_be_bytes());
        }
        Ok(offset + 1 + width)
    }

    fn read_from(&self, buffer: &[u8], offset: usize) -> ReadResult<Checksum> {
        check_remaining(buffer, offset, 1)?;
        let code = buffer[offset];
        let kind = ChecksumType::from_code(code).ok_or(RwError::InvalidSwitchValue {
            value: code.into(),
            offset,
        })?;
        let width = kind.digest_width();
        if width == 0 {
            return Ok((offset + 1, Checksum::none()));
        }
        check_remaining(buffer, offset + 1, width)?;
        let mut digest = [0u8; 4];
        digest.copy_from_slice(&buffer[offset + 1..offset + 5]);
        Ok((offset + 5, Checksum::new(kind, u32::from_be_bytes(digest))))
    }
}

/// A type without digest bytes can only carry a zero value.
fn check_digestless(value: &Checksum, offset: usize) -> std::result::Result<(), RwError> {
    if value.kind.digest_width() == 0 && value.value != 0 {
        return Err(RwError::invalid(
            format!("{} checksum carries no value, got {:#010x}", value.kind, value.value),
            offset,
        ));
    }
    Ok(())
}

/// Running checksum over the argument bytes of one call.
#[derive(Clone)]
pub struct ChecksumState {
    kind: ChecksumType,
    digest: Option<Digest<'static, u32>>,
}

impl ChecksumState {
    /// Start a running checksum. Farm32 is accepted here so that frames can
    /// still carry the tag, but [`ChecksumState::value`] reports it as
    /// unsupported.
    pub fn new(kind: ChecksumType) -> Self {
        let digest = match kind {
            ChecksumType::Crc32 => Some(CRC32.digest()),
            ChecksumType::Crc32c => Some(CRC32C.digest()),
            ChecksumType::None | ChecksumType::Farm32 => None,
        };
        Self { kind, digest }
    }

    pub fn kind(&self) -> ChecksumType {
        self.kind
    }

    pub fn update(&mut self, bytes: &[u8]) {
        if let Some(digest) = self.digest.as_mut() {
            digest.update(bytes);
        }
    }

    /// Digest of everything seen so far.
    pub fn value(&self) -> Result<u32> {
        match (&self.digest, self.kind) {
            (Some(digest), _) => Ok(digest.clone().finalize()),
            (None, ChecksumType::None) => Ok(0),
            (None, kind) => Err(FrameError::UnsupportedChecksum(kind)),
        }
    }

    /// The checksum to put on a frame after its chunks were fed to `update`.
    pub fn checksum(&self) -> Result<Checksum> {
        Ok(Checksum::new(self.kind, self.value()?))
    }

    /// Compare against the checksum a received frame carries.
    pub fn verify(&self, carried: &Checksum) -> Result<()> {
        if carried.kind != self.kind {
            return Err(FrameError::ChecksumMismatch {
                kind: carried.kind,
                expected: carried.value,
                actual: 0,
            });
        }
        let actual = self.value()?;
        if actual != carried.value {
            return Err(FrameError::ChecksumMismatch {
                kind: self.kind,
                expected: carried.value,
                actual,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ChecksumState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChecksumState")
            .field("kind", &self.kind)
            .field("value", &self.value().ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanwire_rw::{from_bytes, to_bytes};

    #[test]
    fn none_has_no_digest_bytes() {
        let bytes = to_bytes(&ChecksumRw, &Checksum::none()).unwrap();
        assert_eq!(bytes.as_ref(), &[0x00]);
        assert_eq!(from_bytes(&ChecksumRw, &bytes).unwrap(), Checksum::none());
    }

    #[test]
    fn none_rejects_a_value() {
        let csum = Checksum::new(ChecksumType::None, 5);
        let err = ChecksumRw.byte_length(&csum).unwrap_err();
        assert!(matches!(err, RwError::InvalidValue { offset: 0, .. }));
        let mut buf = [0xffu8; 4];
        let err = ChecksumRw.write_into(&csum, &mut buf, 2).unwrap_err();
        assert!(matches!(err, RwError::InvalidValue { offset: 2, .. }));
        assert_eq!(buf, [0xff; 4]);
    }

    #[test]
    fn typed_checksum_layout() {
        let csum = Checksum::new(ChecksumType::Crc32c, 0x0102_0304);
        let bytes = to_bytes(&ChecksumRw, &csum).unwrap();
        assert_eq!(bytes.as_ref(), &[0x03, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(from_bytes(&ChecksumRw, &bytes).unwrap(), csum);
    }

    #[test]
    fn unknown_type_and_short_digest() {
        let err = ChecksumRw.read_from(&[0x09], 0).unwrap_err();
        assert!(matches!(err, RwError::InvalidSwitchValue { value: 9, .. }));
        let err = ChecksumRw.read_from(&[0x01, 0xaa], 0).unwrap_err();
        assert!(err.is_short_buffer());
    }

    #[test]
    fn known_check_values() {
        let mut crc = ChecksumState::new(ChecksumType::Crc32);
        crc.update(b"123456789");
        assert_eq!(crc.value().unwrap(), 0xcbf4_3926);

        let mut crcc = ChecksumState::new(ChecksumType::Crc32c);
        crcc.update(b"12345");
        crcc.update(b"6789");
        assert_eq!(crcc.value().unwrap(), 0xe306_9283);
    }

    #[test]
    fn running_value_is_cumulative() {
        let mut state = ChecksumState::new(ChecksumType::Crc32);
        state.update(b"door");
        let first = state.value().unwrap();
        state.update(b"key");
        assert_ne!(state.value().unwrap(), first);

        let mut whole = ChecksumState::new(ChecksumType::Crc32);
        whole.update(b"doorkey");
        assert_eq!(whole.value().unwrap(), state.value().unwrap());
    }

    #[test]
    fn farm32_is_carried_but_not_computed() {
        let state = ChecksumState::new(ChecksumType::Farm32);
        assert!(matches!(
            state.value(),
            Err(FrameError::UnsupportedChecksum(ChecksumType::Farm32))
        ));
        assert_eq!(ChecksumState::new(ChecksumType::None).value().unwrap(), 0);
    }

    #[test]
    fn verify_reports_mismatch() {
        let mut state = ChecksumState::new(ChecksumType::Crc32);
        state.update(b"turn");
        let good = state.checksum().unwrap();
        assert!(state.verify(&good).is_ok());
        let bad = Checksum::new(ChecksumType::Crc32, good.value ^ 1);
        assert!(matches!(
            state.verify(&bad),
            Err(FrameError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn parses_cli_names() {
        assert_eq!("crc32c".parse::<ChecksumType>(), Ok(ChecksumType::Crc32c));
        assert!("md5".parse::<ChecksumType>().is_err());
    }
}
