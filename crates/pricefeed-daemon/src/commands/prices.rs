//! Price and feed status query handlers.

use std::sync::Arc;

use pricefeed_oracle::stake::StakeLedger;
use serde_json::Value;

use super::asset_param;
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Default number of history records returned.
const DEFAULT_HISTORY_LIMIT: usize = 32;

/// Current canonical price of an asset.
pub async fn get_price(state: &Arc<DaemonState>, params: &Value) -> Result {
    let asset = asset_param(params, "asset")?;
    let (feed, _) = state.settle().await?;
    let published = feed.published_price(&asset)?;

    Ok(serde_json::json!({
        "asset": asset,
        "price": published.price.to_string(),
        "published_at": published.published_at,
    }))
}

/// Canonical price with recency and decimals.
pub async fn get_price_info(state: &Arc<DaemonState>, params: &Value) -> Result {
    let asset = asset_param(params, "asset")?;
    let (feed, now) = state.settle().await?;
    let info = feed.get_price_info(&asset, now)?;
    serde_json::to_value(info).map_err(|e| RpcError::internal_error(&e.to_string()))
}

/// Price of one `base` unit expressed in `quote`.
pub async fn get_reference_price_info(state: &Arc<DaemonState>, params: &Value) -> Result {
    let base = asset_param(params, "base")?;
    let quote = asset_param(params, "quote")?;
    let (feed, now) = state.settle().await?;
    let info = feed.get_reference_price_info(&base, &quote, now)?;
    serde_json::to_value(info).map_err(|e| RpcError::internal_error(&e.to_string()))
}

/// Recently finalized epochs, oldest first.
pub async fn get_price_history(state: &Arc<DaemonState>, params: &Value) -> Result {
    let limit = params
        .get("limit")
        .and_then(|v| v.as_u64())
        .map_or(DEFAULT_HISTORY_LIMIT, |n| n as usize);
    let (feed, _) = state.settle().await?;

    let history: Vec<_> = feed.price_history().collect();
    let skip = history.len().saturating_sub(limit);
    serde_json::to_value(&history[skip..]).map_err(|e| RpcError::internal_error(&e.to_string()))
}

/// Epoch boundaries around the current time.
pub async fn get_epoch_times(state: &Arc<DaemonState>) -> Result {
    let (feed, now) = state.settle().await?;
    let scheduler = feed.scheduler();

    Ok(serde_json::json!({
        "now": now,
        "last_epoch_time": scheduler.last_epoch_time(),
        "next_epoch_time": scheduler.next_epoch_time(),
        "update_window_start": scheduler.update_window_start(),
        "finalization_time": scheduler.finalization_time(),
        "in_update_window": scheduler.is_in_update_window(now),
    }))
}

/// Whether publication is active or halted.
pub async fn get_intervention_state(state: &Arc<DaemonState>) -> Result {
    let (feed, _) = state.settle().await?;
    Ok(serde_json::json!({
        "state": feed.get_intervention_state(),
        "authority": feed.config().authority,
    }))
}

/// Feed counters.
pub async fn get_feed_stats(state: &Arc<DaemonState>) -> Result {
    let (feed, _) = state.settle().await?;
    let mut stats =
        serde_json::to_value(feed.stats()).map_err(|e| RpcError::internal_error(&e.to_string()))?;
    stats["events_emitted"] = state.event_bus.sequence().into();
    Ok(stats)
}

/// Reporters allowed to submit, highest stake first.
pub async fn get_operators(state: &Arc<DaemonState>) -> Result {
    let (feed, _) = state.settle().await?;
    let operators: Vec<Value> = feed
        .operators()
        .into_iter()
        .map(|reporter| {
            let stake = feed.ledger().stake_of(&reporter);
            serde_json::json!({"reporter": reporter, "stake": stake.to_string()})
        })
        .collect();
    Ok(Value::Array(operators))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::feed::submit_prices;
    use crate::tests::{test_state, ALICE, BOB};

    async fn finalize_eur(state: &Arc<DaemonState>, clock: &pricefeed_oracle::clock::ManualClock) {
        clock.set(1_012);
        submit_prices(
            state,
            &serde_json::json!({"reporter": ALICE, "prices": {"EUR-T": "20000000000"}}),
        )
        .await
        .expect("alice");
        submit_prices(
            state,
            &serde_json::json!({"reporter": BOB, "prices": {"EUR-T": "30000000000"}}),
        )
        .await
        .expect("bob");
        clock.set(1_021);
    }

    #[tokio::test]
    async fn test_get_price_before_and_after_finalization() {
        let (state, clock) = test_state(1_000);
        let asset = serde_json::json!({"asset": "EUR-T"});

        let err = get_price(&state, &asset).await.expect_err("no price yet");
        assert_eq!(err.code, -32101);

        finalize_eur(&state, &clock).await;
        let price = get_price(&state, &asset).await.expect("price");
        assert_eq!(price["price"], "25000000000");
        assert_eq!(price["published_at"], 1_021);

        let err = get_price(&state, &serde_json::json!({"asset": "XYZ"}))
            .await
            .expect_err("unknown");
        assert_eq!(err.code, -32100);
    }

    #[tokio::test]
    async fn test_price_info_and_history() {
        let (state, clock) = test_state(1_000);
        finalize_eur(&state, &clock).await;

        let info = get_price_info(&state, &serde_json::json!({"asset": "EUR-T"}))
            .await
            .expect("info");
        assert_eq!(info["is_recent"], true);
        assert_eq!(info["decimals"], 18);

        let history = get_price_history(&state, &serde_json::json!({}))
            .await
            .expect("history");
        assert_eq!(history[0]["epoch_start"], 1_000);
        assert_eq!(history[0]["prices"]["EUR-T"], "25000000000");
    }

    #[tokio::test]
    async fn test_reference_price_against_quote() {
        let (state, clock) = test_state(1_000);
        finalize_eur(&state, &clock).await;

        let info = get_reference_price_info(
            &state,
            &serde_json::json!({"base": "EUR-T", "quote": "MLN-T"}),
        )
        .await
        .expect("reference");
        assert_eq!(info["price"], "25000000000");
    }

    #[tokio::test]
    async fn test_epoch_times_follow_clock() {
        let (state, clock) = test_state(1_000);
        clock.set(1_011);
        let times = get_epoch_times(&state).await.expect("times");
        assert_eq!(times["update_window_start"], 1_010);
        assert_eq!(times["finalization_time"], 1_020);
        assert_eq!(times["in_update_window"], true);

        clock.set(1_031);
        let times = get_epoch_times(&state).await.expect("times");
        assert_eq!(times["last_epoch_time"], 1_030);
    }

    #[tokio::test]
    async fn test_status_queries() {
        let (state, _clock) = test_state(1_000);
        let intervention = get_intervention_state(&state).await.expect("state");
        assert_eq!(intervention["state"], "active");

        let operators = get_operators(&state).await.expect("operators");
        assert_eq!(operators[0]["reporter"], BOB);
        assert_eq!(operators[1]["reporter"], ALICE);

        let stats = get_feed_stats(&state).await.expect("stats");
        assert_eq!(stats["finalized_epochs"], 0);
    }
}
