//! Reporter submission and intervention command handlers.
//!
//! Every handler first settles the feed at the current time, so an epoch
//! that became finalizable is committed before the command takes effect.

use std::collections::BTreeMap;
use std::sync::Arc;

use pricefeed_oracle::InterventionReceipt;
use pricefeed_types::events::{Event, EventType};
use pricefeed_types::{AccountId, ReporterId, Timestamp};
use serde_json::Value;

use super::{parse_price, str_param};
use crate::events::outcome_event;
use crate::rpc::RpcError;
use crate::{DaemonState, Feed};

type Result = std::result::Result<Value, RpcError>;

/// Submit a reporter's batch of prices for the current epoch.
pub async fn submit_prices(state: &Arc<DaemonState>, params: &Value) -> Result {
    let reporter = ReporterId::from(str_param(params, "reporter")?);
    let raw = params
        .get("prices")
        .and_then(|v| v.as_object())
        .ok_or_else(|| RpcError::invalid_params("prices required"))?;

    let mut batch = BTreeMap::new();
    for (asset, value) in raw {
        batch.insert(asset.as_str().into(), parse_price(value)?);
    }

    let (mut feed, now) = state.settle().await?;
    match feed.submit(&reporter, &batch, now) {
        Ok(receipt) => {
            let prices: BTreeMap<_, _> = batch
                .iter()
                .map(|(asset, price)| (asset.to_string(), price.to_string()))
                .collect();
            state.event_bus.emit_new(
                EventType::ObservationRecorded,
                now,
                serde_json::json!({
                    "reporter": reporter,
                    "epoch_start": receipt.epoch_start,
                    "prices": prices,
                }),
            );
            Ok(serde_json::json!({
                "epoch_start": receipt.epoch_start,
                "recorded": receipt.recorded,
                "replaced": receipt.replaced,
            }))
        }
        Err(err) => {
            state.event_bus.emit_new(
                EventType::SubmissionRejected,
                now,
                serde_json::json!({
                    "reporter": reporter,
                    "error": err.to_string(),
                }),
            );
            Err(err.into())
        }
    }
}

/// Halt publication of canonical prices.
pub async fn interrupt_updating(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = AccountId::from(str_param(params, "caller")?);
    let (mut feed, now) = state.settle().await?;
    let receipt = feed.interrupt_updating(&caller, now)?;
    commit_intervention(state, &feed, receipt, EventType::UpdatingInterrupted, &caller, now).await
}

/// Resume publication of canonical prices.
pub async fn resume_updating(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = AccountId::from(str_param(params, "caller")?);
    let (mut feed, now) = state.settle().await?;
    let receipt = feed.resume_updating(&caller, now)?;
    commit_intervention(state, &feed, receipt, EventType::UpdatingResumed, &caller, now).await
}

/// Store an accepted transition and announce it.
///
/// The transition has already taken effect, so a storage failure is reported
/// together with the new state. The write is retried on the next settle.
async fn commit_intervention(
    state: &DaemonState,
    feed: &Feed,
    receipt: InterventionReceipt,
    event_type: EventType,
    caller: &AccountId,
    now: Timestamp,
) -> Result {
    let mut events: Vec<Event> = receipt
        .finalized
        .iter()
        .map(|outcome| outcome_event(outcome, now))
        .collect();
    events.push(Event {
        event_type,
        timestamp: now,
        payload: serde_json::json!({"caller": caller}),
    });

    if let Err(e) = state.commit(feed, events).await {
        let mut err = RpcError::from(e);
        err.data = Some(serde_json::json!({
            "state": receipt.state,
            "persisted": false,
        }));
        return Err(err);
    }
    Ok(serde_json::json!({"state": receipt.state}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{test_state, ALICE, AUTHORITY, BOB};

    fn submit(reporter: &str, eur: &str) -> Value {
        serde_json::json!({"reporter": reporter, "prices": {"EUR-T": eur}})
    }

    #[tokio::test]
    async fn test_submit_and_finalize() {
        let (state, clock) = test_state(1_000);
        let mut events = state.event_bus.subscribe();

        clock.set(1_012);
        let receipt = submit_prices(&state, &submit(ALICE, "20000000000"))
            .await
            .expect("alice submits");
        assert_eq!(receipt["epoch_start"], 1_000);
        assert_eq!(receipt["recorded"], 1);

        clock.set(1_013);
        submit_prices(&state, &submit(BOB, "30000000000"))
            .await
            .expect("bob submits");

        let recorded = events.try_recv().expect("first event");
        assert_eq!(recorded.event_type, EventType::ObservationRecorded);
        assert_eq!(recorded.payload["prices"]["EUR-T"], "20000000000");

        clock.set(1_021);
        let (feed, _) = state.settle().await.expect("settle");
        assert_eq!(
            feed.get_price(&"EUR-T".into()).expect("price"),
            25_000_000_000
        );
    }

    #[tokio::test]
    async fn test_rejected_submission_reported() {
        let (state, clock) = test_state(1_000);
        let mut events = state.event_bus.subscribe();
        clock.set(1_012);

        let err = submit_prices(&state, &submit("mallory", "1"))
            .await
            .expect_err("no stake");
        assert_eq!(err.code, -32102);

        let rejected = events.try_recv().expect("event");
        assert_eq!(rejected.event_type, EventType::SubmissionRejected);

        let (feed, _) = state.settle().await.expect("settle");
        assert_eq!(
            feed.stats().rejected_submissions.get(&ReporterId::from("mallory")),
            Some(&1)
        );
    }

    #[tokio::test]
    async fn test_submit_bad_params() {
        let (state, _clock) = test_state(1_000);
        let err = submit_prices(&state, &serde_json::json!({"reporter": ALICE}))
            .await
            .expect_err("no prices");
        assert_eq!(err.code, -32602);

        let err = submit_prices(&state, &submit(ALICE, "-5"))
            .await
            .expect_err("negative price");
        assert_eq!(err.code, -32602);
    }

    #[tokio::test]
    async fn test_interrupt_and_resume() {
        let (state, clock) = test_state(1_000);
        let authority = serde_json::json!({"caller": AUTHORITY});

        let err = interrupt_updating(&state, &serde_json::json!({"caller": ALICE}))
            .await
            .expect_err("not authority");
        assert_eq!(err.code, -32106);

        let halted = interrupt_updating(&state, &authority)
            .await
            .expect("interrupt");
        assert_eq!(halted["state"], "halted");

        clock.set(1_012);
        let err = submit_prices(&state, &submit(ALICE, "1"))
            .await
            .expect_err("halted");
        assert_eq!(err.code, -32105);

        let err = interrupt_updating(&state, &authority)
            .await
            .expect_err("already halted");
        assert_eq!(err.code, -32107);

        let active = resume_updating(&state, &authority).await.expect("resume");
        assert_eq!(active["state"], "active");

        let db = state.db.lock().await;
        let stored = pricefeed_db::queries::settings::get(&db, "intervention_state")
            .expect("stored state");
        assert_eq!(stored, "active");
    }

    #[tokio::test]
    async fn test_intervention_storage_failure_reports_new_state() {
        let (state, clock) = test_state(1_000);
        let authority = serde_json::json!({"caller": AUTHORITY});
        let mut events = state.event_bus.subscribe();

        state
            .db
            .lock()
            .await
            .execute_batch("PRAGMA query_only = ON")
            .expect("read-only");
        let err = interrupt_updating(&state, &authority)
            .await
            .expect_err("storage fails");
        assert_eq!(err.code, -32603);
        let data = err.data.expect("error data");
        assert_eq!(data["state"], "halted");
        assert_eq!(data["persisted"], false);
        assert!(events.try_recv().is_err());

        state
            .db
            .lock()
            .await
            .execute_batch("PRAGMA query_only = OFF")
            .expect("writable");
        clock.set(1_001);
        drop(state.settle().await.expect("settle"));

        let interrupted = events.try_recv().expect("interrupt announced");
        assert_eq!(interrupted.event_type, EventType::UpdatingInterrupted);
        let db = state.db.lock().await;
        let stored = pricefeed_db::queries::settings::get(&db, "intervention_state")
            .expect("stored state");
        assert_eq!(stored, "halted");
    }
}
