//! Published price records.
//!
//! Prices are `u128` and travel as decimal strings on the wire so that JSON
//! consumers never lose precision above 2^53.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::{AssetId, Price, Timestamp};

/// A canonical price together with its recency and precision.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceInfo {
    /// Whether the price was published within the feed's validity period.
    pub is_recent: bool,
    #[serde_as(as = "DisplayFromStr")]
    pub price: Price,
    /// Decimal precision of `price`.
    pub decimals: u8,
}

/// Prices committed by one successful epoch finalization.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricPrices {
    /// Start of the epoch the prices were collected in.
    pub epoch_start: Timestamp,
    /// Time at which the epoch was finalized.
    pub finalized_at: Timestamp,
    #[serde_as(as = "BTreeMap<_, DisplayFromStr>")]
    pub prices: BTreeMap<AssetId, Price>,
}

/// Whether canonical prices may currently change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionState {
    #[default]
    Active,
    Halted,
}

impl InterventionState {
    pub fn is_halted(self) -> bool {
        matches!(self, Self::Halted)
    }
}

impl fmt::Display for InterventionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Halted => f.write_str("halted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_info_uses_string_price() {
        let info = PriceInfo {
            is_recent: true,
            price: 25_000_000_000,
            decimals: 12,
        };
        let value = serde_json::to_value(&info).expect("serialize");
        assert_eq!(value["price"], "25000000000");
        assert_eq!(value["decimals"], 12);
    }

    #[test]
    fn test_historic_prices_above_u64() {
        let big = u128::from(u64::MAX) * 10;
        let record = HistoricPrices {
            epoch_start: 100,
            finalized_at: 120,
            prices: BTreeMap::from([(AssetId::from("MLN-T"), big)]),
        };
        let json = serde_json::to_string(&record).expect("serialize");
        let back: HistoricPrices = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.prices[&AssetId::from("MLN-T")], big);
    }

    #[test]
    fn test_intervention_state_default_and_display() {
        assert_eq!(InterventionState::default(), InterventionState::Active);
        assert!(InterventionState::Halted.is_halted());
        assert_eq!(InterventionState::Halted.to_string(), "halted");
    }
}
