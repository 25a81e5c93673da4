use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use super::errors::ParseError;

const MAX_IDENTITY_LEN: usize = 256;

/// Verified identity of a registry caller.
///
/// The host environment is responsible for authenticating callers; the registry
/// only compares identities against the stored owner and trusted CA set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Creates an identity, trimming surrounding whitespace.
    ///
    /// Identities must be non-empty, at most 256 bytes long and must not
    /// contain whitespace or control characters.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ParseError> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return Err(ParseError::EmptyIdentity);
        }
        if value.len() > MAX_IDENTITY_LEN
            || value.chars().any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(ParseError::InvalidIdentity(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Identity {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.0
    }
}

/// Fixed-size certificate serial identifier used as the revocation key.
///
/// Rendered as a lowercase, `0x` prefixed hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SerialNumber([u8; 32]);

impl SerialNumber {
    pub const LEN: usize = 32;

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derives the serial identifier as the Keccak-256 digest of `data`.
    pub fn digest(data: impl AsRef<[u8]>) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(data.as_ref());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex without the `0x` prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerialNumber({self})")
    }
}

impl FromStr for SerialNumber {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = hex::decode(digits)?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| ParseError::InvalidSerialLength(b.len()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for SerialNumber {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SerialNumber> for String {
    fn from(value: SerialNumber) -> Self {
        value.to_string()
    }
}

/// Stored revocation details for a single serial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRecord {
    /// Issuer name as asserted by the revoking CA.
    pub issuer_id: String,
    /// Revocation time as supplied by the revoking CA.
    pub timestamp: u64,
}

/// Notification emitted for every committed revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationEvent {
    pub serial_number: SerialNumber,
    pub issuer_id: String,
    pub timestamp: u64,
}

impl RevocationEvent {
    pub fn new(serial_number: SerialNumber, record: &RevocationRecord) -> Self {
        Self {
            serial_number,
            issuer_id: record.issuer_id.clone(),
            timestamp: record.timestamp,
        }
    }
}

/// A revocation event together with its position in the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Zero-based position in the append-only event log.
    pub sequence: u64,
    pub committed_at: DateTime<Utc>,
    pub event: RevocationEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_digest() {
        let serial = SerialNumber::digest("hello world");
        assert_eq!(
            serial.to_hex(),
            "47173285a8d7341e5e972fc677286384f802f8ef42a5ec5f03bbfa254cb01fad"
        );
    }

    #[test]
    fn test_serial_parsing() {
        let serial = SerialNumber::digest("123456");
        let rendered = serial.to_string();
        assert!(rendered.starts_with("0x"));
        assert_eq!(rendered.len(), 66);

        assert_eq!(rendered.parse::<SerialNumber>().unwrap(), serial);
        assert_eq!(serial.to_hex().parse::<SerialNumber>().unwrap(), serial);
        assert_eq!(
            rendered.to_uppercase().replacen("0X", "0x", 1).parse::<SerialNumber>().unwrap(),
            serial
        );
    }

    #[test]
    fn test_serial_parsing_errors() {
        assert_eq!(
            "0xabcd".parse::<SerialNumber>(),
            Err(ParseError::InvalidSerialLength(2))
        );
        assert!(matches!(
            "0xzz".parse::<SerialNumber>(),
            Err(ParseError::InvalidSerialHex(_))
        ));
        assert_eq!(
            "".parse::<SerialNumber>(),
            Err(ParseError::InvalidSerialLength(0))
        );
    }

    #[test]
    fn test_identity_validation() {
        assert_eq!(Identity::new("  ca-1 ").unwrap().as_str(), "ca-1");
        assert_eq!(Identity::new("   "), Err(ParseError::EmptyIdentity));
        assert!(matches!(
            Identity::new("two words"),
            Err(ParseError::InvalidIdentity(_))
        ));
        assert!(Identity::new("a".repeat(MAX_IDENTITY_LEN + 1)).is_err());
    }

    #[test]
    fn test_event_record_json_shape() {
        let serial = SerialNumber::digest("ABCDEF");
        let record = RevocationRecord {
            issuer_id: "CA-Test".to_string(),
            timestamp: 1_700_000_000,
        };
        let event = EventRecord {
            sequence: 3,
            committed_at: Utc::now(),
            event: RevocationEvent::new(serial, &record),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["sequence"], 3);
        assert_eq!(json["event"]["serialNumber"], serial.to_string());
        assert_eq!(json["event"]["issuerId"], "CA-Test");
        assert_eq!(json["event"]["timestamp"], 1_700_000_000u64);

        let decoded: EventRecord = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, event);
    }
}
