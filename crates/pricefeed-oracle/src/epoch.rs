//! Epoch scheduling.
//!
//! An epoch is the half-open interval `[last_epoch_time, next_epoch_time)`
//! with `next_epoch_time = last_epoch_time + interval`. Around each boundary:
//!
//! ```text
//!        update window              intervention delay
//!   |<-- pre_epoch_update_period -->|<-- post_epoch_intervention_delay -->|
//!   next - pre                     next                                next + delay
//!   [ submissions accepted         )[ submissions rejected             )[ finalizable
//! ```
//!
//! The scheduler holds only the last finalized boundary; everything else is a
//! pure function of it and the caller's `now`.

use pricefeed_types::Timestamp;

use crate::FeedConfig;

/// Epoch boundary state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochScheduler {
    interval: u64,
    pre_epoch_update_period: u64,
    post_epoch_intervention_delay: u64,
    /// Start of the current epoch.
    last_epoch_time: Timestamp,
}

impl EpochScheduler {
    /// Create a scheduler whose first epoch starts at `genesis`.
    pub fn new(
        genesis: Timestamp,
        interval: u64,
        pre_epoch_update_period: u64,
        post_epoch_intervention_delay: u64,
    ) -> Self {
        Self {
            interval,
            pre_epoch_update_period,
            post_epoch_intervention_delay,
            last_epoch_time: genesis,
        }
    }

    /// Create a scheduler from validated feed parameters.
    pub fn from_config(config: &FeedConfig, genesis: Timestamp) -> Self {
        Self::new(
            genesis,
            config.interval,
            config.pre_epoch_update_period,
            config.post_epoch_intervention_delay,
        )
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Start of the most recently started epoch.
    pub fn last_epoch_time(&self) -> Timestamp {
        self.last_epoch_time
    }

    /// End of the current epoch.
    pub fn next_epoch_time(&self) -> Timestamp {
        self.last_epoch_time.saturating_add(self.interval)
    }

    /// First second at which submissions for the current epoch are accepted.
    pub fn update_window_start(&self) -> Timestamp {
        self.next_epoch_time()
            .saturating_sub(self.pre_epoch_update_period)
    }

    /// Earliest time at which the current epoch may be finalized.
    pub fn finalization_time(&self) -> Timestamp {
        self.next_epoch_time()
            .saturating_add(self.post_epoch_intervention_delay)
    }

    /// `now ∈ [next - pre_epoch_update_period, next)`.
    pub fn is_in_update_window(&self, now: Timestamp) -> bool {
        now >= self.update_window_start() && now < self.next_epoch_time()
    }

    /// `now` is before the update window of the current epoch opens.
    pub fn is_before_update_window(&self, now: Timestamp) -> bool {
        now < self.update_window_start()
    }

    /// `now ∈ [next, next + post_epoch_intervention_delay)`.
    pub fn is_in_intervention_delay(&self, now: Timestamp) -> bool {
        now >= self.next_epoch_time() && now < self.finalization_time()
    }

    /// The current epoch's boundary and intervention delay have both passed.
    ///
    /// The current epoch is never already finalized: finalization always
    /// advances the scheduler past it.
    pub fn is_finalizable(&self, now: Timestamp) -> bool {
        now >= self.finalization_time()
    }

    /// Move to the epoch containing `now`.
    ///
    /// A no-op returning `false` if `now < next_epoch_time`. Normally sets
    /// `last_epoch_time = next_epoch_time`; if whole epochs elapsed without
    /// any call, skips straight to the boundary of the epoch containing `now`.
    pub fn advance_epoch(&mut self, now: Timestamp) -> bool {
        let next = self.next_epoch_time();
        if now < next {
            return false;
        }
        let elapsed_epochs = (now - next) / self.interval;
        self.last_epoch_time = next.saturating_add(elapsed_epochs.saturating_mul(self.interval));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS: Timestamp = 1_000;

    fn scheduler() -> EpochScheduler {
        // interval = 15, pre = 5, delay = 5
        EpochScheduler::new(GENESIS, 15, 5, 5)
    }

    #[test]
    fn test_epoch_bounds() {
        let s = scheduler();
        assert_eq!(s.last_epoch_time(), 1_000);
        assert_eq!(s.next_epoch_time(), 1_015);
        assert_eq!(s.update_window_start(), 1_010);
        assert_eq!(s.finalization_time(), 1_020);
    }

    #[test]
    fn test_update_window_closed_lower_open_upper() {
        let s = scheduler();
        assert!(!s.is_in_update_window(1_009));
        assert!(s.is_in_update_window(1_010));
        assert!(s.is_in_update_window(1_014));
        assert!(!s.is_in_update_window(1_015));
    }

    #[test]
    fn test_before_window_and_delay_spans() {
        let s = scheduler();
        assert!(s.is_before_update_window(1_000));
        assert!(s.is_before_update_window(1_009));
        assert!(!s.is_before_update_window(1_010));

        assert!(!s.is_in_intervention_delay(1_014));
        assert!(s.is_in_intervention_delay(1_015));
        assert!(s.is_in_intervention_delay(1_019));
        assert!(!s.is_in_intervention_delay(1_020));
    }

    #[test]
    fn test_finalizable_after_delay() {
        let s = scheduler();
        assert!(!s.is_finalizable(1_015));
        assert!(!s.is_finalizable(1_019));
        assert!(s.is_finalizable(1_020));
    }

    #[test]
    fn test_advance_before_boundary_is_noop() {
        let mut s = scheduler();
        assert!(!s.advance_epoch(1_014));
        assert_eq!(s.last_epoch_time(), 1_000);
    }

    #[test]
    fn test_advance_moves_one_epoch() {
        let mut s = scheduler();
        assert!(s.advance_epoch(1_021));
        assert_eq!(s.last_epoch_time(), 1_015);
        assert_eq!(s.next_epoch_time(), 1_030);
        assert!(!s.is_finalizable(1_021));
    }

    #[test]
    fn test_advance_skips_idle_epochs() {
        let mut s = scheduler();
        // 1_015 + 3 * 15 = 1_060 <= 1_062 < 1_075
        assert!(s.advance_epoch(1_062));
        assert_eq!(s.last_epoch_time(), 1_060);
        assert_eq!(s.next_epoch_time(), 1_075);
    }

    #[test]
    fn test_from_config() {
        let mut config = FeedConfig::new("gov".into(), "MLN-T".into());
        config.interval = 60;
        config.pre_epoch_update_period = 10;
        config.post_epoch_intervention_delay = 20;
        let s = EpochScheduler::from_config(&config, 0);
        assert_eq!(s.interval(), 60);
        assert_eq!(s.update_window_start(), 50);
        assert_eq!(s.finalization_time(), 80);
    }
}
