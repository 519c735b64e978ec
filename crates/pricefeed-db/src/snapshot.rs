//! Whole-feed snapshot persistence.
//!
//! A [`FeedSnapshot`] is spread across the three tables: canonical prices
//! and their update counts in `canonical_prices`, finalized epochs in
//! `price_history`, and the scheduler position and intervention state in
//! `settings`. Saving happens inside one transaction.

use pricefeed_oracle::FeedSnapshot;
use pricefeed_types::InterventionState;
use rusqlite::Connection;

use crate::queries::{history, prices, settings};
use crate::{DbError, Result};

const LAST_EPOCH_TIME: &str = "last_epoch_time";
const INTERVENTION_STATE: &str = "intervention_state";

/// Persist `snapshot`, keeping at most `history_capacity` finalized epochs.
pub fn save_snapshot(
    conn: &mut Connection,
    snapshot: &FeedSnapshot,
    history_capacity: usize,
) -> Result<()> {
    let tx = conn.transaction()?;

    for (asset, published) in &snapshot.prices {
        let count = snapshot.update_counts.get(asset).copied().unwrap_or(0);
        prices::upsert(&tx, asset, published, count)?;
    }
    for record in &snapshot.history {
        history::record(&tx, record)?;
    }
    history::prune(&tx, history_capacity)?;

    settings::set(&tx, LAST_EPOCH_TIME, &snapshot.last_epoch_time.to_string())?;
    settings::set(&tx, INTERVENTION_STATE, &snapshot.state.to_string())?;

    tx.commit()?;
    tracing::debug!(
        last_epoch_time = snapshot.last_epoch_time,
        prices = snapshot.prices.len(),
        "feed snapshot saved"
    );
    Ok(())
}

/// Load the last saved snapshot, or `None` if nothing was ever saved.
pub fn load_snapshot(conn: &Connection, history_capacity: usize) -> Result<Option<FeedSnapshot>> {
    let Some(last_epoch_time) = settings::get_u64_opt(conn, LAST_EPOCH_TIME)? else {
        return Ok(None);
    };

    let state = match settings::get(conn, INTERVENTION_STATE)?.as_str() {
        "active" => InterventionState::Active,
        "halted" => InterventionState::Halted,
        other => {
            return Err(DbError::Serialization(format!(
                "intervention state '{other}'"
            )))
        }
    };

    let (prices, mut update_counts) = prices::load_map(conn)?;
    update_counts.retain(|_, count| *count > 0);

    let history = history::recent(conn, history_capacity)?;

    Ok(Some(FeedSnapshot {
        last_epoch_time,
        state,
        prices,
        update_counts,
        history,
    }))
}
