//! Reporter stake and operator ranking.
//!
//! Collateral custody lives outside the feed; the feed reads locked amounts
//! to decide whose submissions it honors. When an operator cap is configured,
//! only the highest stakers at or above the minimum are operators:
//!
//! ```text
//! operators = top num_operators of { r : stake(r) >= minimum_stake }
//!             ordered by stake descending, then reporter id ascending
//! ```

use std::collections::BTreeMap;

use pricefeed_types::{ReporterId, Stake};

use crate::{OracleError, Result};

/// Read-only view of locked reporter collateral.
pub trait StakeLedger {
    /// Stake currently locked by `reporter` (zero if unknown).
    fn stake_of(&self, reporter: &ReporterId) -> Stake;

    /// Every reporter with a non-zero stake.
    fn stakers(&self) -> Vec<(ReporterId, Stake)>;
}

/// Stake ledger held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStakeLedger {
    stakes: BTreeMap<ReporterId, Stake>,
}

impl InMemoryStakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `amount` more collateral for `reporter`. Returns the new stake.
    pub fn deposit_stake(&mut self, reporter: &ReporterId, amount: Stake) -> Stake {
        let entry = self.stakes.entry(reporter.clone()).or_default();
        *entry = entry.saturating_add(amount);
        tracing::debug!(%reporter, amount, stake = *entry, "stake deposited");
        *entry
    }

    /// Release `amount` of `reporter`'s collateral. Returns the remaining stake.
    ///
    /// # Errors
    ///
    /// - [`OracleError::WithdrawExceedsStake`] if `amount` exceeds the locked stake
    pub fn withdraw_stake(&mut self, reporter: &ReporterId, amount: Stake) -> Result<Stake> {
        let stake = self.stake_of(reporter);
        let remaining = stake
            .checked_sub(amount)
            .ok_or_else(|| OracleError::WithdrawExceedsStake {
                reporter: reporter.clone(),
                stake,
                requested: amount,
            })?;

        if remaining == 0 {
            self.stakes.remove(reporter);
        } else {
            self.stakes.insert(reporter.clone(), remaining);
        }
        tracing::debug!(%reporter, amount, stake = remaining, "stake withdrawn");
        Ok(remaining)
    }
}

impl StakeLedger for InMemoryStakeLedger {
    fn stake_of(&self, reporter: &ReporterId) -> Stake {
        self.stakes.get(reporter).copied().unwrap_or(0)
    }

    fn stakers(&self) -> Vec<(ReporterId, Stake)> {
        self.stakes
            .iter()
            .filter(|(_, stake)| **stake > 0)
            .map(|(reporter, stake)| (reporter.clone(), *stake))
            .collect()
    }
}

/// The `num_operators` highest stakers holding at least `minimum_stake`.
pub fn operators<S: StakeLedger + ?Sized>(
    ledger: &S,
    minimum_stake: Stake,
    num_operators: usize,
) -> Vec<ReporterId> {
    let mut eligible: Vec<(ReporterId, Stake)> = ledger
        .stakers()
        .into_iter()
        .filter(|(_, stake)| *stake >= minimum_stake)
        .collect();
    eligible.sort_by(|(a_id, a_stake), (b_id, b_stake)| {
        b_stake.cmp(a_stake).then_with(|| a_id.cmp(b_id))
    });
    eligible
        .into_iter()
        .take(num_operators)
        .map(|(reporter, _)| reporter)
        .collect()
}

/// Whether `reporter` is among the current operators.
pub fn is_operator<S: StakeLedger + ?Sized>(
    ledger: &S,
    reporter: &ReporterId,
    minimum_stake: Stake,
    num_operators: usize,
) -> bool {
    operators(ledger, minimum_stake, num_operators).contains(reporter)
}
