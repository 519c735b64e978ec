//! Canonical price query functions.

use std::collections::BTreeMap;

use pricefeed_oracle::feed::PublishedPrice;
use pricefeed_types::{AssetId, Price, Timestamp};
use rusqlite::Connection;

use crate::{parse_price, Result};

/// A stored canonical price row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPriceRow {
    pub asset: AssetId,
    pub price: Price,
    pub published_at: Timestamp,
    pub update_count: u32,
}

/// Insert or replace the canonical price of an asset.
pub fn upsert(
    conn: &Connection,
    asset: &AssetId,
    published: &PublishedPrice,
    update_count: u32,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO canonical_prices (asset, price, published_at, update_count)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            asset.as_str(),
            published.price.to_string(),
            published.published_at as i64,
            update_count,
        ],
    )?;
    Ok(())
}

/// All canonical prices, in asset order.
pub fn all(conn: &Connection) -> Result<Vec<CanonicalPriceRow>> {
    let mut stmt = conn.prepare(
        "SELECT asset, price, published_at, update_count
         FROM canonical_prices ORDER BY asset",
    )?;
    let raw = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, u32>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(asset, price, published_at, update_count)| {
            Ok(CanonicalPriceRow {
                asset: AssetId::new(asset),
                price: parse_price(&price)?,
                published_at: published_at as u64,
                update_count,
            })
        })
        .collect()
}

/// Canonical prices keyed by asset, as held by the feed.
pub fn load_map(
    conn: &Connection,
) -> Result<(BTreeMap<AssetId, PublishedPrice>, BTreeMap<AssetId, u32>)> {
    let mut prices = BTreeMap::new();
    let mut counts = BTreeMap::new();
    for row in all(conn)? {
        prices.insert(
            row.asset.clone(),
            PublishedPrice {
                price: row.price,
                published_at: row.published_at,
            },
        );
        counts.insert(row.asset, row.update_count);
    }
    Ok((prices, counts))
}
