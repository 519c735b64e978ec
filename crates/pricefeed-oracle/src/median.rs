//! Median aggregation.
//!
//! Combines every reporter's observation of an asset into one canonical
//! price. Zero is the "no observation" sentinel and never takes part.
//!
//! ```text
//! v      = sort_ascending(prices without zeros)
//! median = v[n/2]                          if n is odd
//!        = floor((v[n/2 - 1] + v[n/2]) / 2) if n is even
//! ```
//!
//! The even case rounds toward zero and is computed without overflow, so
//! every host derives the identical value.

use std::collections::BTreeMap;

use pricefeed_types::{AssetId, Price, NO_OBSERVATION};

/// Median of the non-zero values in `prices`.
///
/// Returns `None` when there is no valid observation.
///
/// # Examples
///
/// ```
/// use pricefeed_oracle::median::medianize;
///
/// assert_eq!(medianize(&[30, 0, 10, 20]), Some(20));
/// assert_eq!(medianize(&[20_000_000_000, 30_000_000_000]), Some(25_000_000_000));
/// assert_eq!(medianize(&[0, 0]), None);
/// ```
pub fn medianize(prices: &[Price]) -> Option<Price> {
    let mut valid: Vec<Price> = prices
        .iter()
        .copied()
        .filter(|p| *p != NO_OBSERVATION)
        .collect();
    if valid.is_empty() {
        return None;
    }
    valid.sort_unstable();

    let n = valid.len();
    if n % 2 == 1 {
        Some(valid[n / 2])
    } else {
        Some(floor_average(valid[n / 2 - 1], valid[n / 2]))
    }
}

/// `floor((a + b) / 2)` without overflowing.
fn floor_average(a: Price, b: Price) -> Price {
    a / 2 + b / 2 + (a % 2 + b % 2) / 2
}

/// Canonical price per asset from one epoch's observations.
///
/// Assets with fewer than `minimum_price_count` valid observations are left
/// out of the result so that their previous canonical price is retained.
pub fn compute_canonical<'a, I>(observations: I, minimum_price_count: usize) -> BTreeMap<AssetId, Price>
where
    I: IntoIterator<Item = (&'a AssetId, Price)>,
{
    let mut by_asset: BTreeMap<&AssetId, Vec<Price>> = BTreeMap::new();
    for (asset, price) in observations {
        let prices = by_asset.entry(asset).or_default();
        if price != NO_OBSERVATION {
            prices.push(price);
        }
    }

    by_asset
        .into_iter()
        .filter(|(_, prices)| !prices.is_empty() && prices.len() >= minimum_price_count)
        .filter_map(|(asset, prices)| medianize(&prices).map(|m| (asset.clone(), m)))
        .collect()
}
