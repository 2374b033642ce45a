//! `If-Match` preconditions for replace and delete.
//!
//! A precondition names either the etag or the generation the caller last
//! saw. Backends check it against the current record under the same lock or
//! transaction as the write, so a failed precondition never mutates anything.

use std::fmt;
use std::str::FromStr;

use crate::error::{ConcurrencyError, StorageError, StorageResult, ValidationError};
use crate::types::StoredRecord;

/// An expected record state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// The record's etag must equal this value (including the `etag:` prefix).
    Etag(String),
    /// The record's generation must equal this value.
    Generation(u64),
}

impl Precondition {
    /// Parses an `If-Match` header value.
    ///
    /// Accepts `"etag:<hex>"` and `"generation:<n>"`, with or without the
    /// surrounding quotes.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidPrecondition` for anything else.
    pub fn parse(header: &str) -> StorageResult<Self> {
        let value = normalize_etag(header.trim());

        if value.starts_with("etag:") && value.len() > "etag:".len() {
            return Ok(Precondition::Etag(value.to_string()));
        }

        if let Some(generation) = value.strip_prefix("generation:")
            && let Ok(generation) = generation.parse::<u64>()
        {
            return Ok(Precondition::Generation(generation));
        }

        Err(StorageError::Validation(
            ValidationError::InvalidPrecondition {
                value: header.to_string(),
            },
        ))
    }

    /// Checks the precondition against the current record.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrencyError::EtagMismatch` or
    /// `ConcurrencyError::GenerationMismatch` when it does not hold.
    pub fn check(&self, current: &StoredRecord) -> StorageResult<()> {
        match self {
            Precondition::Etag(expected) if expected != current.etag() => {
                Err(ConcurrencyError::EtagMismatch {
                    type_name: current.type_name().to_string(),
                    id: current.id().to_string(),
                    expected: expected.clone(),
                    actual: current.etag().to_string(),
                }
                .into())
            }
            Precondition::Generation(expected) if *expected != current.generation() => {
                Err(ConcurrencyError::GenerationMismatch {
                    type_name: current.type_name().to_string(),
                    id: current.id().to_string(),
                    expected: *expected,
                    actual: current.generation(),
                }
                .into())
            }
            _ => Ok(()),
        }
    }
}

impl FromStr for Precondition {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Precondition::parse(s)
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precondition::Etag(etag) => write!(f, "\"{}\"", etag),
            Precondition::Generation(generation) => write!(f, "\"generation:{}\"", generation),
        }
    }
}

/// Strips an optional weak prefix and surrounding quotes from an entity tag.
pub fn normalize_etag(etag: &str) -> &str {
    etag.trim_start_matches("W/")
        .trim_start_matches('"')
        .trim_end_matches('"')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> StoredRecord {
        StoredRecord::new("testtype", "abc", json!({"text": "foo", "num": 5}))
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            Precondition::parse("\"etag:abc123\"").unwrap(),
            Precondition::Etag("etag:abc123".to_string())
        );
        assert_eq!(
            Precondition::parse("\"generation:3\"").unwrap(),
            Precondition::Generation(3)
        );
        assert_eq!(
            Precondition::parse("generation:0").unwrap(),
            Precondition::Generation(0)
        );
    }

    #[test]
    fn test_parse_invalid() {
        for value in ["\"foobar\"", "\"generation:x\"", "\"etag:\"", ""] {
            let err = Precondition::parse(value).unwrap_err();
            assert!(err.is_invalid_argument(), "{value}");
            assert!(err.to_string().contains("invalid If-Match"));
        }
    }

    #[test]
    fn test_check() {
        let current = record();

        assert!(Precondition::Etag(current.etag().to_string()).check(&current).is_ok());
        assert!(Precondition::Generation(0).check(&current).is_ok());

        let err = Precondition::Etag("etag:doesnotmatch".to_string())
            .check(&current)
            .unwrap_err();
        assert!(err.to_string().contains("etag mismatch"));

        let err = Precondition::Generation(50).check(&current).unwrap_err();
        assert!(err.to_string().contains("generation mismatch"));
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        let precondition = Precondition::Generation(7);
        assert_eq!(precondition.to_string(), "\"generation:7\"");
        assert_eq!(Precondition::parse(&precondition.to_string()).unwrap(), precondition);
    }
}
