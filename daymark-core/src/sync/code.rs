use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MAX_CODE_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncCodeError {
    #[error("sync code is empty after removing unsupported characters")]
    Empty,
    #[error("sync code is longer than {MAX_CODE_LEN} characters")]
    TooLong,
}

/// A normalized sync code: lower-case ASCII letters, digits, `-` and `_`.
///
/// Backends use it as a lookup key, so two spellings of the same code always
/// land on the same row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SyncCode(String);

impl SyncCode {
    pub fn parse(raw: &str) -> Result<Self, SyncCodeError> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return Err(SyncCodeError::Empty);
        }
        if normalized.len() > MAX_CODE_LEN {
            return Err(SyncCodeError::TooLong);
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Case-folds and strips everything outside `[a-z0-9_-]`.
pub fn normalize(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

impl fmt::Display for SyncCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SyncCode {
    type Err = SyncCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SyncCode {
    type Error = SyncCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SyncCode> for String {
    fn from(code: SyncCode) -> Self {
        code.0
    }
}

/// What a session authenticates with: the code plus an optional shared word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCredentials {
    pub code: SyncCode,
    pub word: Option<String>,
}

impl SyncCredentials {
    pub fn new(code: SyncCode, word: Option<String>) -> Self {
        Self {
            code,
            word: word.filter(|w| !w.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  My-Family_01 "), "my-family_01");
        assert_eq!(normalize("a b/c..d"), "abcd");
        assert_eq!(normalize("ÄBC"), "bc");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(SyncCode::parse("   "), Err(SyncCodeError::Empty));
        assert_eq!(SyncCode::parse("!!!"), Err(SyncCodeError::Empty));
    }

    #[test]
    fn test_parse_rejects_too_long() {
        let raw = "x".repeat(MAX_CODE_LEN + 1);
        assert_eq!(SyncCode::parse(&raw), Err(SyncCodeError::TooLong));
        assert!(SyncCode::parse(&"x".repeat(MAX_CODE_LEN)).is_ok());
    }

    #[test]
    fn test_spellings_collide() {
        assert_eq!(
            SyncCode::parse("ABC").unwrap(),
            SyncCode::parse(" abc ").unwrap()
        );
    }

    #[test]
    fn test_serde_normalizes() {
        let code: SyncCode = serde_json::from_str("\"Home-1\"").unwrap();
        assert_eq!(code.as_str(), "home-1");
        assert!(serde_json::from_str::<SyncCode>("\"%%%\"").is_err());
    }

    #[test]
    fn test_empty_word_is_none() {
        let credentials = SyncCredentials::new(SyncCode::parse("abc").unwrap(), Some(String::new()));
        assert!(credentials.word.is_none());
    }
}
