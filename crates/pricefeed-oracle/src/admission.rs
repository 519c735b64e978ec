//! Reporter submission path.
//!
//! A submission is admitted only if every check passes; a rejected
//! submission leaves the buffer untouched. Admitted prices are stored as one
//! observation per `(asset, reporter)` in the current epoch's buffer, so a
//! reporter that submits twice in an epoch simply replaces its earlier price.

use std::collections::BTreeMap;

use pricefeed_types::{AssetId, Price, ReporterId, Stake, Timestamp};

use crate::directory::AssetDirectory;
use crate::epoch::EpochScheduler;
use crate::stake::{self, StakeLedger};
use crate::{OracleError, Result};

/// One reporter's price for one asset in one epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub reporter: ReporterId,
    pub asset: AssetId,
    pub price: Price,
    pub submitted_at: Timestamp,
}

/// Observations collected for a single epoch.
#[derive(Debug, Clone, Default)]
pub struct ObservationBuffer {
    epoch_start: Timestamp,
    entries: BTreeMap<(AssetId, ReporterId), Observation>,
}

impl ObservationBuffer {
    pub fn new(epoch_start: Timestamp) -> Self {
        Self {
            epoch_start,
            entries: BTreeMap::new(),
        }
    }

    /// Start of the epoch these observations belong to.
    pub fn epoch_start(&self) -> Timestamp {
        self.epoch_start
    }

    /// Store `observation`, returning the one it replaced, if any.
    pub fn record(&mut self, observation: Observation) -> Option<Observation> {
        let key = (observation.asset.clone(), observation.reporter.clone());
        self.entries.insert(key, observation)
    }

    /// Drop all observations and rescope the buffer to a new epoch.
    ///
    /// Returns the number of observations discarded.
    pub fn reset(&mut self, epoch_start: Timestamp) -> usize {
        let discarded = self.entries.len();
        self.entries.clear();
        self.epoch_start = epoch_start;
        discarded
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.entries.values()
    }

    /// `(asset, price)` pairs in asset order, as consumed by the median.
    pub fn prices(&self) -> impl Iterator<Item = (&AssetId, Price)> {
        self.entries.values().map(|o| (&o.asset, o.price))
    }
}

/// Reject batches that are empty or mention unregistered assets.
///
/// # Errors
///
/// - [`OracleError::EmptyBatch`] if `batch` is empty
/// - [`OracleError::UnknownAsset`] for the first unregistered asset
pub fn check_assets<D: AssetDirectory + ?Sized>(
    directory: &D,
    batch: &BTreeMap<AssetId, Price>,
) -> Result<()> {
    if batch.is_empty() {
        return Err(OracleError::EmptyBatch);
    }
    if let Some(unknown) = batch.keys().find(|asset| !directory.is_registered(asset)) {
        return Err(OracleError::UnknownAsset(unknown.clone()));
    }
    Ok(())
}

/// Reject reporters without enough stake, or outside the operator set.
///
/// # Errors
///
/// - [`OracleError::InsufficientStake`] if the stake is below `minimum_stake`
/// - [`OracleError::NotOperator`] if `num_operators` is set and the reporter
///   is not among the top stakers
pub fn check_stake<S: StakeLedger + ?Sized>(
    ledger: &S,
    reporter: &ReporterId,
    minimum_stake: Stake,
    num_operators: Option<usize>,
) -> Result<()> {
    let staked = ledger.stake_of(reporter);
    if staked < minimum_stake {
        return Err(OracleError::InsufficientStake {
            reporter: reporter.clone(),
            stake: staked,
            minimum: minimum_stake,
        });
    }
    if let Some(n) = num_operators {
        if !stake::is_operator(ledger, reporter, minimum_stake, n) {
            return Err(OracleError::NotOperator(reporter.clone()));
        }
    }
    Ok(())
}

/// Reject submissions outside the current epoch's update window.
///
/// Submissions before the window opens are still admitted while every asset
/// in the batch is bootstrapping, i.e. has fewer than `minimum_updates`
/// finalized updates in `update_counts`. Submissions after the boundary are
/// never admitted: they wait for the next epoch's window.
///
/// # Errors
///
/// - [`OracleError::OutsideUpdateWindow`] if the submission is not admissible at `now`
pub fn check_window(
    scheduler: &EpochScheduler,
    now: Timestamp,
    batch: &BTreeMap<AssetId, Price>,
    update_counts: &BTreeMap<AssetId, u32>,
    minimum_updates: u32,
) -> Result<()> {
    if scheduler.is_in_update_window(now) {
        return Ok(());
    }

    let bootstrapping = batch
        .keys()
        .all(|asset| update_counts.get(asset).copied().unwrap_or(0) < minimum_updates);
    if scheduler.is_before_update_window(now) && bootstrapping {
        return Ok(());
    }

    Err(OracleError::OutsideUpdateWindow {
        now,
        window_start: scheduler.update_window_start(),
        window_end: scheduler.next_epoch_time(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryAssetDirectory;
    use crate::stake::InMemoryStakeLedger;

    fn eur() -> AssetId {
        AssetId::from("EUR-T")
    }

    fn observation(reporter: &str, asset: &AssetId, price: Price) -> Observation {
        Observation {
            reporter: ReporterId::from(reporter),
            asset: asset.clone(),
            price,
            submitted_at: 1_012,
        }
    }

    #[test]
    fn test_buffer_overwrites_same_reporter_and_asset() {
        let mut buffer = ObservationBuffer::new(1_000);
        assert!(buffer.record(observation("a", &eur(), 10)).is_none());
        let replaced = buffer.record(observation("a", &eur(), 20)).expect("replaced");
        assert_eq!(replaced.price, 10);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.prices().next(), Some((&eur(), 20)));
    }

    #[test]
    fn test_buffer_keeps_distinct_reporters() {
        let mut buffer = ObservationBuffer::new(1_000);
        buffer.record(observation("a", &eur(), 10));
        buffer.record(observation("b", &eur(), 30));
        buffer.record(observation("a", &AssetId::from("GBP-T"), 5));
        assert_eq!(buffer.len(), 3);
        let eur = eur();
        assert_eq!(buffer.prices().filter(|(asset, _)| **asset == eur).count(), 2);
    }

    #[test]
    fn test_buffer_reset() {
        let mut buffer = ObservationBuffer::new(1_000);
        buffer.record(observation("a", &eur(), 10));
        assert_eq!(buffer.reset(1_015), 1);
        assert!(buffer.is_empty());
        assert_eq!(buffer.epoch_start(), 1_015);
    }

    #[test]
    fn test_check_assets() {
        let mut dir = InMemoryAssetDirectory::new();
        dir.register(eur(), 12).expect("register");

        assert_eq!(
            check_assets(&dir, &BTreeMap::new()),
            Err(OracleError::EmptyBatch)
        );
        check_assets(&dir, &BTreeMap::from([(eur(), 1)])).expect("known asset");
        let batch = BTreeMap::from([(eur(), 1), (AssetId::from("XYZ"), 1)]);
        assert_eq!(
            check_assets(&dir, &batch),
            Err(OracleError::UnknownAsset(AssetId::from("XYZ")))
        );
    }

    #[test]
    fn test_check_stake_minimum() {
        let mut ledger = InMemoryStakeLedger::new();
        let a = ReporterId::from("a");
        ledger.deposit_stake(&a, 99);
        let err = check_stake(&ledger, &a, 100, None).expect_err("below minimum");
        assert!(matches!(
            err,
            OracleError::InsufficientStake { stake: 99, minimum: 100, .. }
        ));

        ledger.deposit_stake(&a, 1);
        check_stake(&ledger, &a, 100, None).expect("at minimum");
    }

    #[test]
    fn test_check_stake_operator_cap() {
        let mut ledger = InMemoryStakeLedger::new();
        let a = ReporterId::from("a");
        let b = ReporterId::from("b");
        ledger.deposit_stake(&a, 200);
        ledger.deposit_stake(&b, 100);
        check_stake(&ledger, &a, 100, Some(1)).expect("top staker");
        assert_eq!(
            check_stake(&ledger, &b, 100, Some(1)),
            Err(OracleError::NotOperator(b.clone()))
        );
    }

    #[test]
    fn test_check_window_inside() {
        let scheduler = EpochScheduler::new(1_000, 15, 5, 5);
        let batch = BTreeMap::from([(eur(), 1)]);
        let counts = BTreeMap::from([(eur(), 3)]);
        check_window(&scheduler, 1_010, &batch, &counts, 1).expect("window start");
        check_window(&scheduler, 1_014, &batch, &counts, 1).expect("window end");
    }

    #[test]
    fn test_check_window_premature_after_bootstrap() {
        let scheduler = EpochScheduler::new(1_000, 15, 5, 5);
        let batch = BTreeMap::from([(eur(), 1)]);
        let counts = BTreeMap::from([(eur(), 1)]);
        let err = check_window(&scheduler, 1_009, &batch, &counts, 1).expect_err("premature");
        assert_eq!(
            err,
            OracleError::OutsideUpdateWindow {
                now: 1_009,
                window_start: 1_010,
                window_end: 1_015,
            }
        );
    }

    #[test]
    fn test_check_window_premature_while_bootstrapping() {
        let scheduler = EpochScheduler::new(1_000, 15, 5, 5);
        let batch = BTreeMap::from([(eur(), 1)]);
        check_window(&scheduler, 1_001, &batch, &BTreeMap::new(), 1).expect("bootstrap");
    }

    #[test]
    fn test_check_window_mixed_batch_needs_all_bootstrapping() {
        let scheduler = EpochScheduler::new(1_000, 15, 5, 5);
        let gbp = AssetId::from("GBP-T");
        let batch = BTreeMap::from([(eur(), 1), (gbp.clone(), 1)]);
        let counts = BTreeMap::from([(gbp, 2)]);
        assert!(check_window(&scheduler, 1_001, &batch, &counts, 1).is_err());
    }

    #[test]
    fn test_check_window_after_boundary_always_rejected() {
        let scheduler = EpochScheduler::new(1_000, 15, 5, 5);
        let batch = BTreeMap::from([(eur(), 1)]);
        assert!(check_window(&scheduler, 1_015, &batch, &BTreeMap::new(), 1).is_err());
        assert!(check_window(&scheduler, 1_019, &batch, &BTreeMap::new(), 1).is_err());
    }
}
