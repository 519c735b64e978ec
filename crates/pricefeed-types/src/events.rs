//! Event types broadcast by the daemon to subscribers.

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Envelope for all feed events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub timestamp: Timestamp,
    pub payload: serde_json::Value,
}

/// All event types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Submission events
    ObservationRecorded,
    SubmissionRejected,

    // Epoch events
    EpochFinalized,
    EpochSkipped,

    // Intervention events
    UpdatingInterrupted,
    UpdatingResumed,

    // System events
    DaemonStarted,
}

impl EventType {
    /// Category used by subscription filters.
    pub fn category(self) -> &'static str {
        match self {
            Self::ObservationRecorded | Self::SubmissionRejected => "submission",
            Self::EpochFinalized | Self::EpochSkipped => "epoch",
            Self::UpdatingInterrupted | Self::UpdatingResumed => "intervention",
            Self::DaemonStarted => "system",
        }
    }
}
