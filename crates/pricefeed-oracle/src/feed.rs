//! Canonical price feed.
//!
//! [`CanonicalPriceFeed`] owns all mutable feed state: the epoch scheduler,
//! the intervention switch, the current epoch's observation buffer and the
//! published canonical prices. Every mutating call first runs the implicit
//! finalization step:
//!
//! 1. If the epoch is not yet finalizable, nothing happens.
//! 2. If publication is halted, the epoch rolls over without publishing and
//!    its observations are discarded.
//! 3. Otherwise the median of the buffered observations is published, the
//!    buffer is cleared and the scheduler advances.
//!
//! The new prices are computed in full before any of them is written, so a
//! reader never sees a partially finalized epoch.

use std::collections::{BTreeMap, VecDeque};

use pricefeed_types::{
    AccountId, AssetId, HistoricPrices, InterventionState, Price, ReporterId, Timestamp,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use tracing::{debug, info, warn};

use crate::admission::{self, Observation, ObservationBuffer};
use crate::directory::AssetDirectory;
use crate::epoch::EpochScheduler;
use crate::intervention::InterventionControl;
use crate::median;
use crate::stake::{self, StakeLedger};
use crate::{FeedConfig, OracleError, Result};

/// A canonical price and the time it was published.
#[serde_as]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPrice {
    #[serde_as(as = "DisplayFromStr")]
    pub price: Price,
    pub published_at: Timestamp,
}

/// What happened when an epoch ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EpochOutcome {
    /// Observations were aggregated and published.
    Finalized(HistoricPrices),
    /// Publication was halted; the epoch rolled over without publishing.
    Skipped {
        /// Start of the skipped epoch.
        epoch_start: Timestamp,
        /// Buffered observations that were dropped.
        discarded: usize,
    },
}

/// Result of an accepted submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitReceipt {
    /// Start of the epoch the observations were recorded in.
    pub epoch_start: Timestamp,
    /// Number of prices recorded.
    pub recorded: usize,
    /// How many of them replaced the reporter's earlier price this epoch.
    pub replaced: usize,
    /// Finalization triggered on entry, before the submission was admitted.
    pub finalized: Option<EpochOutcome>,
}

/// Result of an accepted intervention.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterventionReceipt {
    /// Intervention state after the transition.
    pub state: InterventionState,
    /// Finalization triggered on entry, before the transition took effect.
    pub finalized: Option<EpochOutcome>,
}

/// Feed counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedStats {
    pub finalized_epochs: u64,
    pub skipped_epochs: u64,
    pub accepted_submissions: u64,
    /// Rejected submissions per reporter.
    pub rejected_submissions: BTreeMap<ReporterId, u64>,
    pub buffered_observations: usize,
}

/// Durable part of the feed state.
///
/// The observation buffer is not part of it: a restored feed starts its
/// current epoch with no observations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSnapshot {
    pub last_epoch_time: Timestamp,
    pub state: InterventionState,
    pub prices: BTreeMap<AssetId, PublishedPrice>,
    /// Finalized updates per asset, used for the bootstrap rule.
    pub update_counts: BTreeMap<AssetId, u32>,
    pub history: Vec<HistoricPrices>,
}

/// The orchestrator exposing the feed's public read/write surface.
pub struct CanonicalPriceFeed<D, S> {
    config: FeedConfig,
    directory: D,
    ledger: S,
    scheduler: EpochScheduler,
    intervention: InterventionControl,
    buffer: ObservationBuffer,
    prices: BTreeMap<AssetId, PublishedPrice>,
    update_counts: BTreeMap<AssetId, u32>,
    history: VecDeque<HistoricPrices>,
    stats: FeedStats,
}

impl<D: AssetDirectory, S: StakeLedger> CanonicalPriceFeed<D, S> {
    /// Create a feed whose first epoch starts at `genesis`.
    ///
    /// # Errors
    ///
    /// - [`OracleError::InvalidConfig`] if `config` fails validation
    /// - [`OracleError::InvalidConfig`] if the quote asset is not registered
    pub fn new(config: FeedConfig, directory: D, ledger: S, genesis: Timestamp) -> Result<Self> {
        config.validate()?;
        if !directory.is_registered(&config.quote_asset) {
            return Err(OracleError::InvalidConfig(format!(
                "quote asset {} is not registered",
                config.quote_asset
            )));
        }

        let scheduler = EpochScheduler::from_config(&config, genesis);
        let intervention = InterventionControl::new(config.authority.clone());
        info!(
            genesis,
            interval = config.interval,
            quote_asset = %config.quote_asset,
            "canonical price feed created"
        );

        Ok(Self {
            scheduler,
            intervention,
            buffer: ObservationBuffer::new(genesis),
            prices: BTreeMap::new(),
            update_counts: BTreeMap::new(),
            history: VecDeque::new(),
            stats: FeedStats::default(),
            config,
            directory,
            ledger,
        })
    }

    /// Rebuild a feed from a snapshot taken by [`snapshot`](Self::snapshot).
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn restore(config: FeedConfig, directory: D, ledger: S, snapshot: FeedSnapshot) -> Result<Self> {
        let mut feed = Self::new(config, directory, ledger, snapshot.last_epoch_time)?;
        feed.intervention =
            InterventionControl::with_state(feed.config.authority.clone(), snapshot.state);
        feed.prices = snapshot.prices;
        feed.update_counts = snapshot.update_counts;

        let capacity = feed.config.history_capacity;
        let skip = snapshot.history.len().saturating_sub(capacity);
        feed.history = snapshot.history.into_iter().skip(skip).collect();

        info!(
            last_epoch_time = feed.scheduler.last_epoch_time(),
            state = %feed.intervention.state(),
            prices = feed.prices.len(),
            "canonical price feed restored"
        );
        Ok(feed)
    }

    /// Capture the durable feed state.
    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            last_epoch_time: self.scheduler.last_epoch_time(),
            state: self.intervention.state(),
            prices: self.prices.clone(),
            update_counts: self.update_counts.clone(),
            history: self.history.iter().cloned().collect(),
        }
    }

    // ------------------------------------------------------------------
    // Write surface
    // ------------------------------------------------------------------

    /// Submit `reporter`'s prices at time `now`.
    ///
    /// Runs the implicit finalization step first, then admits the batch into
    /// the current epoch. A rejected batch records nothing.
    ///
    /// # Errors
    ///
    /// - [`OracleError::UpdatesHalted`] while publication is halted
    /// - [`OracleError::EmptyBatch`] if `batch` is empty
    /// - [`OracleError::UnknownAsset`] if any asset is unregistered
    /// - [`OracleError::InsufficientStake`] / [`OracleError::NotOperator`]
    ///   if the reporter may not submit
    /// - [`OracleError::OutsideUpdateWindow`] if `now` is outside the update window
    pub fn submit(
        &mut self,
        reporter: &ReporterId,
        batch: &BTreeMap<AssetId, Price>,
        now: Timestamp,
    ) -> Result<SubmitReceipt> {
        let finalized = self.tick(now);

        match self.admit(reporter, batch, now) {
            Ok(replaced) => {
                self.stats.accepted_submissions += 1;
                debug!(
                    %reporter,
                    now,
                    prices = batch.len(),
                    replaced,
                    epoch_start = self.buffer.epoch_start(),
                    "observations recorded"
                );
                Ok(SubmitReceipt {
                    epoch_start: self.buffer.epoch_start(),
                    recorded: batch.len(),
                    replaced,
                    finalized,
                })
            }
            Err(err) => {
                *self
                    .stats
                    .rejected_submissions
                    .entry(reporter.clone())
                    .or_default() += 1;
                warn!(%reporter, now, error = %err, "submission rejected");
                Err(err)
            }
        }
    }

    fn admit(
        &mut self,
        reporter: &ReporterId,
        batch: &BTreeMap<AssetId, Price>,
        now: Timestamp,
    ) -> Result<usize> {
        self.intervention.check_active()?;
        admission::check_assets(&self.directory, batch)?;
        admission::check_stake(
            &self.ledger,
            reporter,
            self.config.minimum_stake,
            self.config.num_operators,
        )?;
        admission::check_window(
            &self.scheduler,
            now,
            batch,
            &self.update_counts,
            self.config.minimum_updates,
        )?;

        let mut replaced = 0;
        for (asset, price) in batch {
            let previous = self.buffer.record(Observation {
                reporter: reporter.clone(),
                asset: asset.clone(),
                price: *price,
                submitted_at: now,
            });
            if previous.is_some() {
                replaced += 1;
            }
        }
        Ok(replaced)
    }

    /// Explicit finalization trigger.
    ///
    /// Returns `None` unless the current epoch ended at `now`. Calling it any
    /// number of times after the threshold has the same effect as calling it
    /// once.
    pub fn tick(&mut self, now: Timestamp) -> Option<EpochOutcome> {
        if !self.scheduler.is_finalizable(now) {
            return None;
        }
        if self.intervention.is_halted() {
            return Some(self.skip_epoch(now));
        }
        Some(EpochOutcome::Finalized(self.finalize(now)))
    }

    fn finalize(&mut self, now: Timestamp) -> HistoricPrices {
        let epoch_start = self.scheduler.last_epoch_time();
        let computed = median::compute_canonical(self.buffer.prices(), self.config.minimum_price_count);

        for (asset, price) in &computed {
            self.prices.insert(
                asset.clone(),
                PublishedPrice {
                    price: *price,
                    published_at: now,
                },
            );
            let count = self.update_counts.entry(asset.clone()).or_default();
            *count = count.saturating_add(1);
        }

        let record = HistoricPrices {
            epoch_start,
            finalized_at: now,
            prices: computed,
        };
        if !record.prices.is_empty() {
            self.push_history(record.clone());
        }

        let observations = self.buffer.len();
        self.scheduler.advance_epoch(now);
        self.buffer.reset(self.scheduler.last_epoch_time());
        self.stats.finalized_epochs += 1;

        info!(
            epoch_start,
            observations,
            published = record.prices.len(),
            next_epoch_time = self.scheduler.next_epoch_time(),
            "epoch finalized"
        );
        record
    }

    fn skip_epoch(&mut self, now: Timestamp) -> EpochOutcome {
        let epoch_start = self.scheduler.last_epoch_time();
        self.scheduler.advance_epoch(now);
        let discarded = self.buffer.reset(self.scheduler.last_epoch_time());
        self.stats.skipped_epochs += 1;

        warn!(
            epoch_start,
            discarded,
            next_epoch_time = self.scheduler.next_epoch_time(),
            "epoch skipped: updating interrupted"
        );
        EpochOutcome::Skipped {
            epoch_start,
            discarded,
        }
    }

    fn push_history(&mut self, record: HistoricPrices) {
        if self.config.history_capacity == 0 {
            return;
        }
        while self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }

    /// Halt publication. Canonical prices freeze until resumed.
    ///
    /// An epoch that was already finalizable at `now` is published first.
    ///
    /// # Errors
    ///
    /// - [`OracleError::Unauthorized`] if `caller` is not the authority
    /// - [`OracleError::NoOpTransition`] if already halted
    pub fn interrupt_updating(
        &mut self,
        caller: &AccountId,
        now: Timestamp,
    ) -> Result<InterventionReceipt> {
        let finalized = self.tick(now);
        self.intervention.interrupt_updating(caller)?;
        Ok(InterventionReceipt {
            state: self.intervention.state(),
            finalized,
        })
    }

    /// Resume publication.
    ///
    /// An epoch that ended while halted is skipped before the feed resumes,
    /// so none of its observations are published.
    ///
    /// # Errors
    ///
    /// - [`OracleError::Unauthorized`] if `caller` is not the authority
    /// - [`OracleError::NoOpTransition`] if already active
    pub fn resume_updating(
        &mut self,
        caller: &AccountId,
        now: Timestamp,
    ) -> Result<InterventionReceipt> {
        let finalized = self.tick(now);
        self.intervention.resume_updating(caller)?;
        Ok(InterventionReceipt {
            state: self.intervention.state(),
            finalized,
        })
    }

    // ------------------------------------------------------------------
    // Read surface
    // ------------------------------------------------------------------

    /// Current canonical price of `asset`.
    ///
    /// # Errors
    ///
    /// - [`OracleError::UnknownAsset`] if `asset` is not registered
    /// - [`OracleError::NoPrice`] if no price has been published yet
    pub fn get_price(&self, asset: &AssetId) -> Result<Price> {
        self.published_price(asset).map(|p| p.price)
    }

    /// Current canonical price of `asset` with its publication time.
    ///
    /// # Errors
    ///
    /// Same as [`get_price`](Self::get_price).
    pub fn published_price(&self, asset: &AssetId) -> Result<PublishedPrice> {
        if !self.directory.is_registered(asset) {
            return Err(OracleError::UnknownAsset(asset.clone()));
        }
        self.prices
            .get(asset)
            .copied()
            .ok_or_else(|| OracleError::NoPrice(asset.clone()))
    }

    pub fn get_last_epoch_time(&self) -> Timestamp {
        self.scheduler.last_epoch_time()
    }

    pub fn get_next_epoch_time(&self) -> Timestamp {
        self.scheduler.next_epoch_time()
    }

    pub fn get_intervention_state(&self) -> InterventionState {
        self.intervention.state()
    }

    pub fn scheduler(&self) -> &EpochScheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn directory_mut(&mut self) -> &mut D {
        &mut self.directory
    }

    pub fn ledger(&self) -> &S {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut S {
        &mut self.ledger
    }

    /// Observations buffered for the current epoch.
    pub fn pending_observations(&self) -> impl Iterator<Item = &Observation> {
        self.buffer.iter()
    }

    /// Finalized epochs that published at least one price, oldest first.
    pub fn price_history(&self) -> impl Iterator<Item = &HistoricPrices> {
        self.history.iter()
    }

    /// Number of finalizations that published a price for `asset`.
    pub fn update_count(&self, asset: &AssetId) -> u32 {
        self.update_counts.get(asset).copied().unwrap_or(0)
    }

    /// Whether `reporter` may currently submit, stake-wise.
    pub fn is_operator(&self, reporter: &ReporterId) -> bool {
        admission::check_stake(
            &self.ledger,
            reporter,
            self.config.minimum_stake,
            self.config.num_operators,
        )
        .is_ok()
    }

    /// Reporters currently allowed to submit, highest stake first.
    pub fn operators(&self) -> Vec<ReporterId> {
        let cap = self.config.num_operators.unwrap_or(usize::MAX);
        stake::operators(&self.ledger, self.config.minimum_stake, cap)
    }

    pub fn stats(&self) -> FeedStats {
        FeedStats {
            buffered_observations: self.buffer.len(),
            ..self.stats.clone()
        }
    }
}
