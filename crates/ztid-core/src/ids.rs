//! Newtype wrappers for identifiers to ensure type safety.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Maximum accepted length of a service identifier.
pub const MAX_SERVICE_ID_LEN: usize = 128;

/// Identifier of a registered service.
///
/// Restricted to the SPIFFE path-segment alphabet (`[A-Za-z0-9._-]`) so the
/// derived SPIFFE URI is always a valid IA5 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceId(String);

impl ServiceId {
    /// Validate and wrap a service identifier.
    pub fn parse(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.is_empty() {
            return Err(CoreError::InvalidServiceId {
                id,
                reason: "must not be empty",
            });
        }
        if id.len() > MAX_SERVICE_ID_LEN {
            return Err(CoreError::InvalidServiceId {
                id,
                reason: "too long",
            });
        }
        if !id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
        {
            return Err(CoreError::InvalidServiceId {
                id,
                reason: "only [A-Za-z0-9._-] allowed",
            });
        }
        Ok(Self(id))
    }

    /// Get the inner string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ServiceId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<ServiceId> for String {
    fn from(id: ServiceId) -> Self {
        id.0
    }
}

/// Certificate serial number: a positive value drawn from a 128-bit random
/// space.
///
/// Rendered as uppercase hex without leading zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Serial(u128);

impl Serial {
    /// Generate a new random serial.
    pub fn generate() -> Self {
        Self(rand::thread_rng().gen_range(1..=u128::MAX))
    }

    /// Wrap a raw value. Zero is not a valid serial.
    pub fn from_u128(value: u128) -> Result<Self, CoreError> {
        if value == 0 {
            return Err(CoreError::InvalidSerial("0".to_string()));
        }
        Ok(Self(value))
    }

    /// Decode a big-endian unsigned integer, as found in DER.
    pub fn from_be_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let significant: Vec<u8> = bytes.iter().copied().skip_while(|b| *b == 0).collect();
        if significant.len() > 16 {
            return Err(CoreError::InvalidSerial(hex_string(bytes)));
        }
        let value = significant
            .iter()
            .fold(0u128, |acc, b| (acc << 8) | u128::from(*b));
        Self::from_u128(value)
    }

    /// Minimal big-endian encoding (no leading zero bytes).
    pub fn to_be_bytes(&self) -> Vec<u8> {
        self.0
            .to_be_bytes()
            .into_iter()
            .skip_while(|b| *b == 0)
            .collect()
    }

    /// Get the raw value.
    pub fn value(&self) -> u128 {
        self.0
    }
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

impl FromStr for Serial {
    type Err = CoreError;

    /// Accepts hex in either case, optionally colon separated (`01:AB:..`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.trim().chars().filter(|c| *c != ':').collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidSerial(s.to_string()));
        }
        let trimmed = digits.trim_start_matches('0');
        if trimmed.len() > 32 {
            return Err(CoreError::InvalidSerial(s.to_string()));
        }
        let value = u128::from_str_radix(if trimmed.is_empty() { "0" } else { trimmed }, 16)
            .map_err(|_| CoreError::InvalidSerial(s.to_string()))?;
        Self::from_u128(value).map_err(|_| CoreError::InvalidSerial(s.to_string()))
    }
}

impl TryFrom<String> for Serial {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Serial> for String {
    fn from(serial: Serial) -> Self {
        serial.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_id_validation() {
        assert!(ServiceId::parse("checkout").is_ok());
        assert!(ServiceId::parse("payments.v2_blue-1").is_ok());
        assert!(matches!(
            ServiceId::parse(""),
            Err(CoreError::InvalidServiceId { .. })
        ));
        assert!(ServiceId::parse("a/b").is_err());
        assert!(ServiceId::parse("spaces not ok").is_err());
        assert!(ServiceId::parse("x".repeat(MAX_SERVICE_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_service_id_deserialize_validates() {
        let ok: ServiceId = serde_json::from_str("\"checkout\"").unwrap();
        assert_eq!(ok.as_str(), "checkout");
        assert!(serde_json::from_str::<ServiceId>("\"\"").is_err());
    }

    #[test]
    fn test_serial_generate() {
        let s1 = Serial::generate();
        let s2 = Serial::generate();
        assert_ne!(s1, s2);
        assert_ne!(s1.value(), 0);
    }

    #[test]
    fn test_serial_display_and_parse() {
        let serial = Serial::from_u128(0x01AB_00FF).unwrap();
        assert_eq!(serial.to_string(), "1AB00FF");
        assert_eq!("1ab00ff".parse::<Serial>().unwrap(), serial);
        assert_eq!("01:AB:00:FF".parse::<Serial>().unwrap(), serial);
        assert_eq!("0001AB00FF".parse::<Serial>().unwrap(), serial);
    }

    #[test]
    fn test_serial_rejects_bad_input() {
        assert!("".parse::<Serial>().is_err());
        assert!("0".parse::<Serial>().is_err());
        assert!("xyz".parse::<Serial>().is_err());
        assert!("1".repeat(33).parse::<Serial>().is_err());
    }

    #[test]
    fn test_serial_bytes() {
        let serial = Serial::from_u128(0x80_01).unwrap();
        assert_eq!(serial.to_be_bytes(), vec![0x80, 0x01]);
        // DER keeps a leading zero byte for positive values with the high bit set
        assert_eq!(Serial::from_be_bytes(&[0x00, 0x80, 0x01]).unwrap(), serial);
        assert!(Serial::from_be_bytes(&[0x00]).is_err());
        assert!(Serial::from_be_bytes(&[0x01; 17]).is_err());
    }
}
