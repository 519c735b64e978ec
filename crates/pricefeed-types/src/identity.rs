//! Identifiers for priced assets and for the accounts acting on the feed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a priced asset (a token address, a ticker, ...).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifier of an account: a reporter submitting prices, or the authority
/// allowed to intervene.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A stake-backed price source.
pub type ReporterId = AccountId;

/// The governance identity allowed to halt and resume publication.
pub type AuthorityId = AccountId;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_id_serializes_as_plain_string() {
        let asset = AssetId::from("EUR-T");
        let json = serde_json::to_string(&asset).expect("serialize");
        assert_eq!(json, "\"EUR-T\"");
        let back: AssetId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, asset);
    }

    #[test]
    fn test_account_ordering_is_lexicographic() {
        let a = AccountId::from("alice");
        let b = AccountId::from("bob");
        assert!(a < b);
        assert_eq!(a.to_string(), "alice");
    }
}
