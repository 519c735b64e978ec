//! # pricefeed-types
//!
//! Shared domain types used across the price feed workspace: identifiers for
//! assets and accounts, published price records, and the event envelope the
//! daemon broadcasts to subscribers.

pub mod events;
pub mod identity;
pub mod price;

pub use identity::{AccountId, AssetId, AuthorityId, ReporterId};
pub use price::{HistoricPrices, InterventionState, PriceInfo};

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// A price in quote-asset base units (scaled by the quote asset's decimals).
pub type Price = u128;

/// An amount of locked collateral.
pub type Stake = u128;

/// Price value a reporter submits to mean "no observation for this asset".
pub const NO_OBSERVATION: Price = 0;

/// Largest decimal precision a registered asset may declare.
///
/// `10^38` is the largest power of ten representable in a `u128`.
pub const MAX_DECIMALS: u8 = 38;
