//! pricefeed-daemon: hosts a canonical price feed.
//!
//! Single OS process running a Tokio async runtime. Reporters and the
//! governance authority talk to the daemon via JSON-RPC over a Unix socket;
//! the feed state is persisted to SQLite after every finalization and
//! intervention.

mod commands;
mod config;
mod epoch;
mod events;
mod rpc;

use std::sync::Arc;

use pricefeed_db::DbError;
use pricefeed_oracle::clock::{Clock, SystemClock};
use pricefeed_oracle::directory::InMemoryAssetDirectory;
use pricefeed_oracle::stake::InMemoryStakeLedger;
use pricefeed_oracle::CanonicalPriceFeed;
use pricefeed_types::events::{Event, EventType};
use pricefeed_types::Timestamp;
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tracing::{error, info, warn};

use crate::config::DaemonConfig;
use crate::events::EventBus;
use crate::rpc::RpcServer;

/// The feed as hosted by the daemon.
pub type Feed = CanonicalPriceFeed<InMemoryAssetDirectory, InMemoryStakeLedger>;

/// Daemon-wide shared state.
///
/// Lock order is `feed`, then `unsaved`, then `db`.
pub struct DaemonState {
    /// The price feed. Every RPC call and tick holds this for its whole run.
    pub feed: Mutex<Feed>,
    /// Events for feed changes that are not stored yet. Non-empty while the
    /// database lags the in-memory feed.
    pub unsaved: Mutex<Vec<Event>>,
    /// Database connection.
    pub db: Arc<Mutex<rusqlite::Connection>>,
    /// Configuration.
    pub config: DaemonConfig,
    /// Event bus for pushing events to subscribers.
    pub event_bus: EventBus,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

impl DaemonState {
    /// Build the state, restoring the feed from `conn` when it holds a snapshot.
    pub fn open(
        config: DaemonConfig,
        conn: rusqlite::Connection,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let directory = config.asset_directory()?;
        let ledger = config.stake_ledger();

        let snapshot = pricefeed_db::snapshot::load_snapshot(&conn, config.feed.history_capacity)?;
        let feed = match snapshot {
            Some(snapshot) => {
                Feed::restore(config.feed.clone(), directory, ledger, snapshot)?
            }
            None => {
                let feed = Feed::new(config.feed.clone(), directory, ledger, clock.now())?;
                info!("no stored feed state, starting a new feed");
                feed
            }
        };

        Ok(Self {
            feed: Mutex::new(feed),
            unsaved: Mutex::new(Vec::new()),
            db: Arc::new(Mutex::new(conn)),
            event_bus: EventBus::new(config.advanced.event_capacity),
            config,
            clock,
        })
    }

    /// Lock the feed and run any finalization that is due at the current time.
    ///
    /// A finalization or skip is persisted and announced before the guard is
    /// returned. A change whose earlier write failed is written again here.
    pub async fn settle(&self) -> Result<(MutexGuard<'_, Feed>, Timestamp), DbError> {
        let mut feed = self.feed.lock().await;
        let now = self.clock.now();
        let outcome = feed.tick(now);
        let pending = outcome.map(|o| events::outcome_event(&o, now));
        self.commit(&feed, pending.into_iter().collect()).await?;
        Ok((feed, now))
    }

    /// Persist `feed` and then announce `events`.
    ///
    /// On failure the events are kept and the write is retried, together with
    /// any new events, by the next commit.
    pub async fn commit(&self, feed: &Feed, events: Vec<Event>) -> Result<(), DbError> {
        let mut unsaved = self.unsaved.lock().await;
        unsaved.extend(events);
        if unsaved.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.persist(feed).await {
            warn!(pending = unsaved.len(), "feed state not stored, retrying on next settle: {e}");
            return Err(e);
        }
        for event in unsaved.drain(..) {
            self.event_bus.emit(event);
        }
        Ok(())
    }

    /// Write the durable feed state to the database.
    pub async fn persist(&self, feed: &Feed) -> Result<(), DbError> {
        let snapshot = feed.snapshot();
        let mut db = self.db.lock().await;
        pricefeed_db::snapshot::save_snapshot(&mut db, &snapshot, self.config.feed.history_capacity)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("pricefeed={}", config.advanced.log_level).parse()?),
        )
        .init();

    info!("Price feed daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open database
    let db_path = data_dir.join("pricefeed.db");
    let conn = pricefeed_db::open(&db_path)?;

    // 3. Build daemon state
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = Arc::new(DaemonState::open(config, conn, clock.clone())?);
    {
        let feed = state.feed.lock().await;
        info!(
            last_epoch_time = feed.get_last_epoch_time(),
            next_epoch_time = feed.get_next_epoch_time(),
            state = %feed.get_intervention_state(),
            operators = feed.operators().len(),
            "feed ready"
        );
    }

    // 4. Create shutdown channel
    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

    // 5. Start the epoch ticker
    let ticker = tokio::spawn(epoch::run_ticker(state.clone(), shutdown_tx.subscribe()));

    // 6. Start IPC server
    let socket_path = data_dir.join("pricefeed.sock");
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    info!("Starting JSON-RPC server on {:?}", socket_path);

    // 7. Emit DaemonStarted event
    state.event_bus.emit_new(
        EventType::DaemonStarted,
        clock.now(),
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
        }),
    );

    // 8. Run the RPC server until shutdown
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Graceful shutdown
    info!("Daemon shutting down gracefully");
    let _ = shutdown_tx.send(());
    let _ = ticker.await;

    {
        let feed = state.feed.lock().await;
        if let Err(e) = state.persist(&feed).await {
            error!("final snapshot failed: {e}");
        } else {
            state.unsaved.lock().await.clear();
        }
    }

    // Clean up socket file
    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}
