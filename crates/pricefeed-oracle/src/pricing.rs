//! Price queries derived from the canonical prices.
//!
//! Canonical prices are quoted in the feed's quote asset: the price of one
//! whole unit of an asset, scaled by the quote asset's decimals. From those
//! the feed derives:
//!
//! ```text
//! inverted(a)        = 10^(dec(a) + dec(q)) / price(a)        (precision dec(a))
//! reference(b, c)    = price(b) * 10^dec(c) / price(c)        (precision dec(c))
//! ```
//!
//! where `q` is the quote asset. A price is recent while
//! `now - published_at <= validity`.

use pricefeed_types::{AssetId, Price, PriceInfo, Timestamp};

use crate::directory::AssetDirectory;
use crate::feed::CanonicalPriceFeed;
use crate::stake::StakeLedger;
use crate::{OracleError, Result};

impl<D: AssetDirectory, S: StakeLedger> CanonicalPriceFeed<D, S> {
    /// Whether `asset` has a price published within the validity period.
    ///
    /// Unregistered or never-priced assets are never recent.
    pub fn has_recent_price(&self, asset: &AssetId, now: Timestamp) -> bool {
        self.published_price(asset)
            .map(|p| now.saturating_sub(p.published_at) <= self.config().validity)
            .unwrap_or(false)
    }

    /// Whether every asset in `assets` has a recent price.
    pub fn has_recent_prices(&self, assets: &[AssetId], now: Timestamp) -> bool {
        assets.iter().all(|asset| self.has_recent_price(asset, now))
    }

    /// Canonical price of `asset` with its recency and precision.
    ///
    /// # Errors
    ///
    /// - [`OracleError::UnknownAsset`] if `asset` is not registered
    /// - [`OracleError::NoPrice`] if no price has been published yet
    pub fn get_price_info(&self, asset: &AssetId, now: Timestamp) -> Result<PriceInfo> {
        let published = self.published_price(asset)?;
        Ok(PriceInfo {
            is_recent: self.has_recent_price(asset, now),
            price: published.price,
            decimals: self.quote_decimals()?,
        })
    }

    /// Price of one quote-asset unit expressed in `asset`.
    ///
    /// # Errors
    ///
    /// - [`OracleError::UnknownAsset`] / [`OracleError::NoPrice`] as for
    ///   [`get_price_info`](Self::get_price_info)
    /// - [`OracleError::InvalidPrice`] if the result does not fit a price
    pub fn get_inverted_price_info(&self, asset: &AssetId, now: Timestamp) -> Result<PriceInfo> {
        let info = self.get_price_info(asset, now)?;
        let asset_decimals = self.decimals(asset)?;
        let scale = pow10(u32::from(asset_decimals) + u32::from(info.decimals))?;
        if info.price == 0 {
            return Err(OracleError::NoPrice(asset.clone()));
        }
        Ok(PriceInfo {
            is_recent: info.is_recent,
            price: scale / info.price,
            decimals: asset_decimals,
        })
    }

    /// Price of one `base` unit expressed in `quote`.
    ///
    /// # Errors
    ///
    /// - [`OracleError::UnknownAsset`] / [`OracleError::NoPrice`] for either asset
    /// - [`OracleError::InvalidPrice`] if the result does not fit a price
    pub fn get_reference_price_info(
        &self,
        base: &AssetId,
        quote: &AssetId,
        now: Timestamp,
    ) -> Result<PriceInfo> {
        let quote_asset = &self.config().quote_asset;
        if quote == quote_asset {
            return self.get_price_info(base, now);
        }
        if base == quote_asset {
            return self.get_inverted_price_info(quote, now);
        }

        let base_info = self.get_price_info(base, now)?;
        let quote_info = self.get_price_info(quote, now)?;
        if quote_info.price == 0 {
            return Err(OracleError::NoPrice(quote.clone()));
        }
        let quote_decimals = self.decimals(quote)?;
        let scaled = base_info
            .price
            .checked_mul(pow10(u32::from(quote_decimals))?)
            .ok_or_else(|| {
                OracleError::InvalidPrice(format!("{base}/{quote} reference price overflows"))
            })?;

        Ok(PriceInfo {
            is_recent: base_info.is_recent && quote_info.is_recent,
            price: scaled / quote_info.price,
            decimals: quote_decimals,
        })
    }

    /// Whether both assets of a pair have recent prices.
    pub fn exists_price_on_asset_pair(&self, base: &AssetId, quote: &AssetId, now: Timestamp) -> bool {
        self.has_recent_price(base, now) && self.has_recent_price(quote, now)
    }

    fn decimals(&self, asset: &AssetId) -> Result<u8> {
        self.directory()
            .decimals_of(asset)
            .ok_or_else(|| OracleError::UnknownAsset(asset.clone()))
    }

    fn quote_decimals(&self) -> Result<u8> {
        self.decimals(&self.config().quote_asset)
    }
}

fn pow10(exp: u32) -> Result<Price> {
    10u128
        .checked_pow(exp)
        .ok_or_else(|| OracleError::InvalidPrice(format!("10^{exp} overflows")))
}
