//! Asset directory.
//!
//! Registration metadata (names, symbols, URLs) is managed outside the feed.
//! The feed only needs to know whether an asset may be priced and how many
//! decimals its prices carry.

use std::collections::BTreeMap;

use pricefeed_types::{AssetId, MAX_DECIMALS};

use crate::{OracleError, Result};

/// Read-only view of registered assets.
pub trait AssetDirectory {
    /// Whether prices may be submitted and read for `asset`.
    fn is_registered(&self, asset: &AssetId) -> bool;

    /// Decimal precision of `asset`, or `None` if it is not registered.
    fn decimals_of(&self, asset: &AssetId) -> Option<u8>;
}

/// Asset directory held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssetDirectory {
    assets: BTreeMap<AssetId, u8>,
}

impl InMemoryAssetDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `asset`, or update its precision if it is already known.
    ///
    /// # Errors
    ///
    /// - [`OracleError::InvalidDecimals`] if `decimals` exceeds [`MAX_DECIMALS`]
    pub fn register(&mut self, asset: AssetId, decimals: u8) -> Result<()> {
        if decimals > MAX_DECIMALS {
            return Err(OracleError::InvalidDecimals { asset, decimals });
        }
        tracing::debug!(%asset, decimals, "asset registered");
        self.assets.insert(asset, decimals);
        Ok(())
    }

    /// Remove `asset`. Returns whether it was registered.
    pub fn deregister(&mut self, asset: &AssetId) -> bool {
        self.assets.remove(asset).is_some()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Registered assets in identifier order.
    pub fn assets(&self) -> impl Iterator<Item = (&AssetId, u8)> {
        self.assets.iter().map(|(asset, decimals)| (asset, *decimals))
    }
}

impl AssetDirectory for InMemoryAssetDirectory {
    fn is_registered(&self, asset: &AssetId) -> bool {
        self.assets.contains_key(asset)
    }

    fn decimals_of(&self, asset: &AssetId) -> Option<u8> {
        self.assets.get(asset).copied()
    }
}
