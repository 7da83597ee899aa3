//! Implementation of the opaque record identifier.

use crate::{IdError, IdResult};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// Upper bound on the byte length of an accepted identifier.
pub const MAX_ID_LEN: usize = 128;

/// Opaque identifier for a patient or a timeline event.
///
/// Once constructed, the contained value is guaranteed to be a non-empty token drawn from the
/// accepted alphabet, so it is safe to embed in URLs, file names and log lines.
///
/// # Construction
/// - [`RecordId::new`] allocates a fresh canonical UUID (for new records).
/// - [`RecordId::parse`] validates an externally supplied identifier (API paths, CLI arguments,
///   identifiers read back from a stored journal).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordId {
    /// Allocates a new identifier in canonical UUID form.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Validates and wraps an identifier string.
    ///
    /// Surrounding whitespace is not trimmed: identifiers are compared byte for byte, so a
    /// padded value is rejected rather than silently altered.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if `input` is empty, longer than [`MAX_ID_LEN`], or
    /// contains characters outside the accepted alphabet.
    pub fn parse(input: &str) -> IdResult<Self> {
        if input.is_empty() {
            return Err(IdError::InvalidInput("identifier cannot be empty".into()));
        }

        if input.len() > MAX_ID_LEN {
            return Err(IdError::InvalidInput(format!(
                "identifier exceeds maximum length of {} characters",
                MAX_ID_LEN
            )));
        }

        let ok = input
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'-'));
        if !ok {
            return Err(IdError::InvalidInput(format!(
                "identifier may only contain ASCII letters, digits, '_' and '-', got: '{}'",
                input
            )));
        }

        Ok(Self(input.to_owned()))
    }

    /// Returns true if `input` is a canonical UUID (32 lowercase hex characters).
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the UUID behind this identifier, if it was allocated in canonical form.
    pub fn uuid(&self) -> Option<Uuid> {
        if Self::is_canonical(&self.0) {
            Uuid::parse_str(&self.0).ok()
        } else {
            None
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordId::parse(s)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for RecordId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RecordId::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_canonical_uuid() {
        let id = RecordId::new();

        assert_eq!(id.as_str().len(), 32);
        assert!(RecordId::is_canonical(id.as_str()));
        assert!(id.uuid().is_some());
    }

    #[test]
    fn test_new_ids_are_distinct() {
        assert_ne!(RecordId::new(), RecordId::new());
    }

    #[test]
    fn test_parse_accepts_canonical_uuid() {
        let canonical = "550e8400e29b41d4a716446655440000";
        let id = RecordId::parse(canonical).expect("canonical uuid should parse");

        assert_eq!(id.to_string(), canonical);
        assert_eq!(
            id.uuid().expect("canonical id has a uuid").simple().to_string(),
            canonical
        );
    }

    #[test]
    fn test_parse_accepts_legacy_identifiers() {
        let id = RecordId::parse("patient_1712345678901_0").expect("legacy id should parse");

        assert_eq!(id.as_str(), "patient_1712345678901_0");
        assert!(id.uuid().is_none());
    }

    #[test]
    fn test_parse_rejects_empty() {
        let result = RecordId::parse("");

        match result {
            Err(IdError::InvalidInput(msg)) => assert!(msg.contains("empty")),
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_parse_rejects_path_characters() {
        assert!(RecordId::parse("../etc/passwd").is_err());
        assert!(RecordId::parse("a b").is_err());
        assert!(RecordId::parse(" abc").is_err());
    }

    #[test]
    fn test_parse_rejects_too_long() {
        let long = "a".repeat(MAX_ID_LEN + 1);
        assert!(RecordId::parse(&long).is_err());

        let max = "a".repeat(MAX_ID_LEN);
        assert!(RecordId::parse(&max).is_ok());
    }

    #[test]
    fn test_is_canonical() {
        assert!(RecordId::is_canonical("ffffffffffffffffffffffffffffffff"));
        assert!(!RecordId::is_canonical("550E8400E29B41D4A716446655440000"));
        assert!(!RecordId::is_canonical("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!RecordId::is_canonical(""));
    }

    #[test]
    fn test_from_str_round_trip() {
        let original = RecordId::new();
        let parsed: RecordId = original.to_string().parse().expect("should parse");

        assert_eq!(original, parsed);
    }

    #[test]
    fn test_serde_rejects_invalid_identifier() {
        let err = serde_json::from_str::<RecordId>("\"not valid\"");
        assert!(err.is_err());

        let ok: RecordId = serde_json::from_str("\"event_42\"").expect("should deserialize");
        assert_eq!(ok.as_str(), "event_42");
    }
}
