//! Event emission system.
//!
//! Events are pushed from the daemon to subscribed RPC connections as
//! JSON-RPC notifications. Each subscriber has an independent buffer of
//! `advanced.event_capacity` events; a subscriber that falls behind skips
//! the oldest ones.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pricefeed_oracle::EpochOutcome;
use pricefeed_types::events::{Event, EventType};
use pricefeed_types::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Filter for event subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Category filter: "submission", "epoch", "intervention", "system".
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    /// Only events mentioning one of these assets in their payload.
    #[serde(default)]
    pub assets: Option<Vec<String>>,
}

/// Event bus for broadcasting events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: Event) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Emit an event built from its parts.
    pub fn emit_new(&self, event_type: EventType, timestamp: Timestamp, payload: serde_json::Value) {
        self.emit(Event {
            event_type,
            timestamp,
            payload,
        });
    }

    /// Subscribe to events. Returns a receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Get the current sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl EventFilter {
    /// Check if an event matches this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref categories) = self.categories {
            let category = event.event_type.category();
            if !categories.iter().any(|c| c == category) {
                return false;
            }
        }

        // Events without asset information pass the asset filter.
        if let Some(ref assets) = self.assets {
            let mentioned = payload_assets(&event.payload);
            if !mentioned.is_empty() && !mentioned.iter().any(|a| assets.contains(a)) {
                return false;
            }
        }

        true
    }
}

/// Asset ids found under `payload.asset` or as keys of `payload.prices`.
fn payload_assets(payload: &serde_json::Value) -> Vec<String> {
    let mut assets = Vec::new();
    if let Some(asset) = payload.get("asset").and_then(|v| v.as_str()) {
        assets.push(asset.to_string());
    }
    if let Some(prices) = payload.get("prices").and_then(|v| v.as_object()) {
        assets.extend(prices.keys().cloned());
    }
    assets
}

/// The event announcing an epoch outcome.
pub fn outcome_event(outcome: &EpochOutcome, timestamp: Timestamp) -> Event {
    match outcome {
        EpochOutcome::Finalized(record) => Event {
            event_type: EventType::EpochFinalized,
            timestamp,
            payload: serde_json::to_value(record).unwrap_or_default(),
        },
        EpochOutcome::Skipped {
            epoch_start,
            discarded,
        } => Event {
            event_type: EventType::EpochSkipped,
            timestamp,
            payload: serde_json::json!({
                "epoch_start": epoch_start,
                "discarded": discarded,
            }),
        },
    }
}
