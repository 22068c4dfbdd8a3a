use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Represents a 128-bit Bluetooth UUID.
///
/// Short 16-bit and 32-bit SIG-assigned values are expanded against the base
/// UUID, so `Uuid::from_u16(0x1105)` and the full 128-bit form of Object Push
/// compare equal. Internally the UUID is stored little-endian.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Uuid {
    bytes: [u8; 16],
}

/// "00000000-0000-1000-8000-00805F9B34FB" in little-endian order.
const BASE_UUID_BYTES: [u8; 16] = [
    0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Offset within the base UUID where the 16/32-bit value is inserted.
const BASE_OFFSET: usize = 12;

impl Uuid {
    /// SDP protocol
    pub const SDP: Uuid = Uuid::from_u16(0x0001);
    /// RFCOMM protocol
    pub const RFCOMM: Uuid = Uuid::from_u16(0x0003);
    /// OBEX protocol
    pub const OBEX: Uuid = Uuid::from_u16(0x0008);
    /// L2CAP protocol
    pub const L2CAP: Uuid = Uuid::from_u16(0x0100);
    /// Serial Port profile
    pub const SERIAL_PORT: Uuid = Uuid::from_u16(0x1101);
    /// Public browse group root
    pub const PUBLIC_BROWSE_ROOT: Uuid = Uuid::from_u16(0x1002);
    /// OBEX Object Push profile
    pub const OBEX_OBJECT_PUSH: Uuid = Uuid::from_u16(0x1105);
    /// OBEX File Transfer profile
    pub const OBEX_FILE_TRANSFER: Uuid = Uuid::from_u16(0x1106);

    /// Creates a new 128-bit UUID directly from 16 bytes (little-endian).
    pub const fn from_bytes_le(bytes: [u8; 16]) -> Self {
        Uuid { bytes }
    }

    /// Creates a new 128-bit UUID directly from 16 bytes (big-endian).
    pub fn from_bytes_be(mut bytes: [u8; 16]) -> Self {
        bytes.reverse();
        Uuid { bytes }
    }

    /// Creates a 128-bit UUID from a 16-bit SIG-assigned value.
    pub const fn from_u16(uuid16: u16) -> Self {
        Self::from_u32(uuid16 as u32)
    }

    /// Creates a 128-bit UUID from a 32-bit SIG-assigned value.
    /// Formula: `value * 2^96 + BASE_UUID`
    pub const fn from_u32(uuid32: u32) -> Self {
        let mut bytes = BASE_UUID_BYTES;
        bytes[BASE_OFFSET] = uuid32 as u8;
        bytes[BASE_OFFSET + 1] = (uuid32 >> 8) as u8;
        bytes[BASE_OFFSET + 2] = (uuid32 >> 16) as u8;
        bytes[BASE_OFFSET + 3] = (uuid32 >> 24) as u8;
        Uuid { bytes }
    }

    /// Returns the underlying 16 bytes in big-endian order.
    pub fn as_bytes_be(&self) -> [u8; 16] {
        let mut bytes = self.bytes;
        bytes.reverse();
        bytes
    }

    fn is_sig_assigned(&self) -> bool {
        self.bytes[0..BASE_OFFSET] == BASE_UUID_BYTES[0..BASE_OFFSET]
    }

    /// Tries to represent the UUID as a 16-bit value.
    pub fn as_u16(&self) -> Option<u16> {
        self.as_u32().and_then(|value| u16::try_from(value).ok())
    }

    /// Tries to represent the UUID as a 32-bit value.
    pub fn as_u32(&self) -> Option<u32> {
        if self.is_sig_assigned() {
            Some(u32::from_le_bytes([
                self.bytes[BASE_OFFSET],
                self.bytes[BASE_OFFSET + 1],
                self.bytes[BASE_OFFSET + 2],
                self.bytes[BASE_OFFSET + 3],
            ]))
        } else {
            None
        }
    }
}

impl From<u16> for Uuid {
    fn from(uuid16: u16) -> Self {
        Uuid::from_u16(uuid16)
    }
}

impl From<u32> for Uuid {
    fn from(uuid32: u32) -> Self {
        Uuid::from_u32(uuid32)
    }
}

impl PartialEq<u16> for Uuid {
    fn eq(&self, other: &u16) -> bool {
        self.as_u16() == Some(*other)
    }
}

impl PartialEq<Uuid> for u16 {
    fn eq(&self, other: &Uuid) -> bool {
        other.as_u16() == Some(*self)
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.as_bytes_be();
        write!(
            f,
            "{}-{}-{}-{}-{}",
            hex::encode(&b[0..4]),
            hex::encode(&b[4..6]),
            hex::encode(&b[6..8]),
            hex::encode(&b[8..10]),
            hex::encode(&b[10..16])
        )
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form when the value is SIG-assigned
        match self.as_u32() {
            Some(value) if value <= u16::MAX as u32 => write!(f, "Uuid(0x{:04X})", value),
            Some(value) => write!(f, "Uuid(0x{:08X})", value),
            None => write!(f, "Uuid({})", self),
        }
    }
}

/// Errors produced when parsing a UUID from text
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UuidParseError {
    #[error("UUID must have 4, 8 or 32 hex digits")]
    InvalidLength,
    #[error("UUID contains non-hex characters")]
    InvalidFormat,
}

impl From<hex::FromHexError> for UuidParseError {
    fn from(_: hex::FromHexError) -> Self {
        UuidParseError::InvalidFormat
    }
}

impl FromStr for Uuid {
    type Err = UuidParseError;

    /// Accepts "1105", "00001105", a bare 32-digit value or the hyphenated form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if !trimmed.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
            return Err(UuidParseError::InvalidFormat);
        }
        let cleaned: String = trimmed.chars().filter(|c| *c != '-').collect();

        match cleaned.len() {
            4 | 8 => {
                let value =
                    u32::from_str_radix(&cleaned, 16).map_err(|_| UuidParseError::InvalidFormat)?;
                Ok(Uuid::from_u32(value))
            }
            32 => {
                let mut bytes_be = [0u8; 16];
                hex::decode_to_slice(&cleaned, &mut bytes_be)?;
                Ok(Uuid::from_bytes_be(bytes_be))
            }
            _ => Err(UuidParseError::InvalidLength),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_and_long_forms_match() {
        let long: Uuid = "00001105-0000-1000-8000-00805f9b34fb".parse().unwrap();
        assert_eq!(long, Uuid::OBEX_OBJECT_PUSH);
        assert_eq!(long.as_u16(), Some(0x1105));
        assert_eq!(long, 0x1105u16);
        assert_eq!("1105".parse::<Uuid>().unwrap(), Uuid::from_u16(0x1105));
    }

    #[test]
    fn test_custom_uuid_is_not_short() {
        let custom: Uuid = "B10C0000000000000000000000000001".parse().unwrap();
        assert_eq!(custom.as_u16(), None);
        assert_eq!(custom.to_string(), "b10c0000-0000-0000-0000-000000000001");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("12".parse::<Uuid>(), Err(UuidParseError::InvalidLength));
        assert_eq!("11zz".parse::<Uuid>(), Err(UuidParseError::InvalidFormat));
    }
}
