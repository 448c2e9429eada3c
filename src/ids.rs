//! Transaction-id validation and deferred references.
//!
//! Ledger ids are exactly 43 characters of base64url alphabet. Declared
//! inputs may also reference the output of a resource that has not been
//! applied yet; such values are carried as [`TxRef::Deferred`] and accepted
//! wherever an id is validated, because the real value only exists after the
//! upstream resource is created.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Wire placeholder for a value produced by a not-yet-applied resource.
pub const DEFERRED_SENTINEL: &str = "04da6b54-80e4-46f7-96ec-b56ff0331ba9";

static TX_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^[a-zA-Z0-9_-]{43}$").expect("tx id pattern is valid")
});

/// Format check for a raw ledger id.
pub fn is_tx_id(id: &str) -> bool {
    TX_ID_PATTERN.is_match(id)
}

/// A ledger id that may not be resolved yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TxRef {
    /// Value produced by a resource that has not been applied yet
    #[default]
    Deferred,
    /// A concrete ledger id
    Id(String),
}

impl TxRef {
    /// Parse a wire value, mapping the deferred sentinel to [`TxRef::Deferred`].
    pub fn parse(value: &str) -> Self {
        if value == DEFERRED_SENTINEL {
            Self::Deferred
        } else {
            Self::Id(value.to_string())
        }
    }

    /// The concrete id, if resolved.
    pub fn as_id(&self) -> Option<&str> {
        match self {
            Self::Deferred => None,
            Self::Id(id) => Some(id),
        }
    }

    /// Whether the value passes the id format check. Deferred values are
    /// accepted since the real id is unknown at validation time.
    pub fn is_valid_tx_id(&self) -> bool {
        match self {
            Self::Deferred => true,
            Self::Id(id) => is_tx_id(id),
        }
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deferred => f.write_str(DEFERRED_SENTINEL),
            Self::Id(id) => f.write_str(id),
        }
    }
}

impl From<&str> for TxRef {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl Serialize for TxRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TxRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_ID: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

    #[test]
    fn test_is_tx_id_accepts_43_char_ids() {
        assert!(is_tx_id(VALID_ID));
        assert!(is_tx_id("abcDEF123-_abcDEF123-_abcDEF123-_abcDEF123-"));
    }

    #[test]
    fn test_is_tx_id_rejects_wrong_length() {
        assert!(!is_tx_id("AAAA"));
        assert!(!is_tx_id(&"A".repeat(42)));
        assert!(!is_tx_id(&"A".repeat(44)));
        assert!(!is_tx_id(""));
    }

    #[test]
    fn test_is_tx_id_rejects_other_characters() {
        assert!(!is_tx_id(&format!("{}+", "A".repeat(42))));
        assert!(!is_tx_id(&format!("{}=", "A".repeat(42))));
        assert!(!is_tx_id(&format!("{} ", "A".repeat(42))));
    }

    #[test]
    fn test_sentinel_is_not_a_raw_tx_id() {
        assert!(!is_tx_id(DEFERRED_SENTINEL));
    }

    #[test]
    fn test_deferred_ref_is_always_valid() {
        assert!(TxRef::Deferred.is_valid_tx_id());
        assert!(TxRef::parse(DEFERRED_SENTINEL).is_valid_tx_id());
    }

    #[test]
    fn test_resolved_ref_uses_format_check() {
        assert!(TxRef::Id(VALID_ID.to_string()).is_valid_tx_id());
        assert!(!TxRef::Id("not-an-id".to_string()).is_valid_tx_id());
    }

    #[test]
    fn test_parse_maps_sentinel_to_deferred() {
        assert_eq!(TxRef::parse(DEFERRED_SENTINEL), TxRef::Deferred);
        assert_eq!(TxRef::parse(VALID_ID), TxRef::Id(VALID_ID.to_string()));
    }

    #[test]
    fn test_serde_round_trip() {
        let id = TxRef::Id(VALID_ID.to_string());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{VALID_ID}\""));
        assert_eq!(serde_json::from_str::<TxRef>(&json).unwrap(), id);

        let deferred_json = serde_json::to_string(&TxRef::Deferred).unwrap();
        assert_eq!(deferred_json, format!("\"{DEFERRED_SENTINEL}\""));
        assert_eq!(
            serde_json::from_str::<TxRef>(&deferred_json).unwrap(),
            TxRef::Deferred
        );
    }
}
