//! Feed parameters.
//!
//! Supplied once at construction and immutable for the lifetime of a feed.
//! All durations are in seconds.

use pricefeed_types::{AssetId, AuthorityId, Stake};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::{OracleError, Result};

/// Default epoch length (1 hour).
pub const DEFAULT_INTERVAL: u64 = 3600;

/// Default length of the submission window before each boundary (10 minutes).
pub const DEFAULT_PRE_EPOCH_UPDATE_PERIOD: u64 = 600;

/// Default grace period after each boundary before finalization (5 minutes).
pub const DEFAULT_POST_EPOCH_INTERVENTION_DELAY: u64 = 300;

/// Default number of retained history records.
pub const DEFAULT_HISTORY_CAPACITY: usize = 256;

/// Immutable feed configuration.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Epoch length.
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Length of the submission window ending at each epoch boundary.
    #[serde(default = "default_pre_epoch_update_period")]
    pub pre_epoch_update_period: u64,
    /// Grace period after the boundary during which the authority may
    /// intervene before the epoch finalizes.
    #[serde(default = "default_post_epoch_intervention_delay")]
    pub post_epoch_intervention_delay: u64,
    /// Number of finalized updates an asset needs before submissions outside
    /// the update window are refused.
    #[serde(default = "default_minimum_updates")]
    pub minimum_updates: u32,
    /// Stake a reporter must lock to have its submissions honored.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "default_minimum_stake")]
    pub minimum_stake: Stake,
    /// The only identity allowed to halt and resume publication.
    pub authority: AuthorityId,
    /// How long a published price counts as recent.
    #[serde(default = "default_interval")]
    pub validity: u64,
    /// Valid observations an asset needs in an epoch to be repriced.
    #[serde(default = "default_minimum_price_count")]
    pub minimum_price_count: usize,
    /// When set, only the top `num_operators` stakers may submit.
    #[serde(default)]
    pub num_operators: Option<usize>,
    /// Asset all canonical prices are denominated in.
    pub quote_asset: AssetId,
    /// Number of finalized epochs kept in the in-memory history.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL
}

fn default_pre_epoch_update_period() -> u64 {
    DEFAULT_PRE_EPOCH_UPDATE_PERIOD
}

fn default_post_epoch_intervention_delay() -> u64 {
    DEFAULT_POST_EPOCH_INTERVENTION_DELAY
}

fn default_minimum_updates() -> u32 {
    1
}

fn default_minimum_stake() -> Stake {
    1
}

fn default_minimum_price_count() -> usize {
    1
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

impl FeedConfig {
    /// Configuration with default timings for the given authority and quote asset.
    pub fn new(authority: AuthorityId, quote_asset: AssetId) -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            pre_epoch_update_period: DEFAULT_PRE_EPOCH_UPDATE_PERIOD,
            post_epoch_intervention_delay: DEFAULT_POST_EPOCH_INTERVENTION_DELAY,
            minimum_updates: default_minimum_updates(),
            minimum_stake: default_minimum_stake(),
            authority,
            validity: DEFAULT_INTERVAL,
            minimum_price_count: default_minimum_price_count(),
            num_operators: None,
            quote_asset,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    /// Check that the timings describe a usable epoch schedule.
    ///
    /// # Errors
    ///
    /// - [`OracleError::InvalidConfig`] if `interval` is zero
    /// - [`OracleError::InvalidConfig`] if the update window is longer than an epoch
    /// - [`OracleError::InvalidConfig`] if the intervention delay reaches the next epoch
    /// - [`OracleError::InvalidConfig`] if `minimum_price_count` or `num_operators` is zero
    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            return Err(OracleError::InvalidConfig(
                "interval must be non-zero".to_string(),
            ));
        }
        if self.pre_epoch_update_period > self.interval {
            return Err(OracleError::InvalidConfig(format!(
                "pre-epoch update period {} exceeds interval {}",
                self.pre_epoch_update_period, self.interval
            )));
        }
        if self.post_epoch_intervention_delay >= self.interval {
            return Err(OracleError::InvalidConfig(format!(
                "post-epoch intervention delay {} must be shorter than interval {}",
                self.post_epoch_intervention_delay, self.interval
            )));
        }
        if self.minimum_price_count == 0 {
            return Err(OracleError::InvalidConfig(
                "minimum price count must be non-zero".to_string(),
            ));
        }
        if self.num_operators == Some(0) {
            return Err(OracleError::InvalidConfig(
                "operator count must be non-zero when set".to_string(),
            ));
        }
        Ok(())
    }
}
