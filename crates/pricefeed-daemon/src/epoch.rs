//! Epoch boundary processing.
//!
//! Finalization also happens lazily on every RPC call, but without traffic an
//! ended epoch would stay unpublished. The ticker settles the feed every
//! `advanced.tick_interval_secs` so prices are published promptly after each
//! intervention delay.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::DaemonState;

/// Run the epoch ticker until a shutdown signal arrives.
pub async fn run_ticker(state: Arc<DaemonState>, mut shutdown_rx: broadcast::Receiver<()>) {
    let period = Duration::from_secs(state.config.advanced.tick_interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(?period, "epoch ticker started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match state.settle().await {
                    Ok((feed, now)) => debug!(
                        now,
                        next_epoch_time = feed.get_next_epoch_time(),
                        "tick"
                    ),
                    Err(e) => error!("epoch finalization could not be persisted: {e}"),
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }

    info!("epoch ticker stopped");
}
