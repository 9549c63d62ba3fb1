use std::{fmt, str::FromStr};

use thiserror::Error;

/// 128-bit identifier used for player profiles and chat sessions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uuid(pub [u8; 16]);

impl Uuid {
    pub const fn nil() -> Self {
        Self([0; 16])
    }

    pub const fn is_nil(&self) -> bool {
        u128::from_be_bytes(self.0) == 0
    }

    /// Random (version 4) UUID.
    pub fn new_v4() -> Self {
        let mut bytes: [u8; 16] = rand::random();
        bytes[6] = (bytes[6] & 0x0F) | 0x40;
        bytes[8] = (bytes[8] & 0x3F) | 0x80;
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                write!(f, "-")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
#[error("Invalid UUID string {0:?}")]
pub struct UuidParseError(String);

impl FromStr for Uuid {
    type Err = UuidParseError;

    /// Parses both hyphenated and plain 32-digit hexadecimal forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s.chars().filter(|c| *c != '-').collect();
        if hex.len() != 32 {
            return Err(UuidParseError(s.to_owned()));
        }
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| UuidParseError(s.to_owned()))?;
        }
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod test {
    use super::Uuid;

    #[test]
    fn display_parse_round_trip() {
        let uuid: Uuid = "c06f8906-4c8a-4911-9c29-ea1dbd1aab82".parse().unwrap();
        assert_eq!(uuid.to_string(), "c06f8906-4c8a-4911-9c29-ea1dbd1aab82");
        let plain: Uuid = "c06f89064c8a49119c29ea1dbd1aab82".parse().unwrap();
        assert_eq!(uuid, plain);
    }

    #[test]
    fn rejects_malformed() {
        assert!("not-a-uuid".parse::<Uuid>().is_err());
        assert!("c06f8906-4c8a-4911-9c29".parse::<Uuid>().is_err());
    }

    #[test]
    fn v4_version_bits() {
        let uuid = Uuid::new_v4();
        assert!(!uuid.is_nil());
        assert_eq!(uuid.0[6] >> 4, 4);
        assert_eq!(uuid.0[8] >> 6, 0b10);
    }

    #[test]
    fn nil_is_nil() {
        assert!(Uuid::nil().is_nil());
        assert_eq!(Uuid::default(), Uuid::nil());
    }
}
