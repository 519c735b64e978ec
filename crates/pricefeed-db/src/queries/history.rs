//! Price history query functions.

use std::collections::BTreeMap;

use pricefeed_types::{AssetId, HistoricPrices};
use rusqlite::Connection;

use crate::{parse_price, Result};

/// Record a finalized epoch. Re-recording the same epoch is a no-op.
pub fn record(conn: &Connection, record: &HistoricPrices) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO price_history (epoch_start, finalized_at, asset, price)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (asset, price) in &record.prices {
        stmt.execute(rusqlite::params![
            record.epoch_start as i64,
            record.finalized_at as i64,
            asset.as_str(),
            price.to_string(),
        ])?;
    }
    Ok(())
}

/// The `limit` most recent finalized epochs, oldest first.
pub fn recent(conn: &Connection, limit: usize) -> Result<Vec<HistoricPrices>> {
    let mut stmt = conn.prepare(
        "SELECT epoch_start, finalized_at, asset, price FROM price_history
         WHERE epoch_start IN (
             SELECT DISTINCT epoch_start FROM price_history
             ORDER BY epoch_start DESC LIMIT ?1
         )
         ORDER BY epoch_start, asset",
    )?;
    let rows = stmt
        .query_map([limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut epochs: BTreeMap<u64, HistoricPrices> = BTreeMap::new();
    for (epoch_start, finalized_at, asset, price) in rows {
        let entry = epochs
            .entry(epoch_start as u64)
            .or_insert_with(|| HistoricPrices {
                epoch_start: epoch_start as u64,
                finalized_at: finalized_at as u64,
                prices: BTreeMap::new(),
            });
        entry.prices.insert(AssetId::new(asset), parse_price(&price)?);
    }
    Ok(epochs.into_values().collect())
}

/// Delete history older than the `keep` most recent epochs.
pub fn prune(conn: &Connection, keep: usize) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM price_history WHERE epoch_start NOT IN (
             SELECT DISTINCT epoch_start FROM price_history
             ORDER BY epoch_start DESC LIMIT ?1
         )",
        [keep as i64],
    )?;
    if deleted > 0 {
        tracing::debug!(deleted, keep, "pruned price history");
    }
    Ok(deleted)
}
