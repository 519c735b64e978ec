//! # pricefeed-oracle
//!
//! Epoch-scheduled, stake-gated canonical price feed.
//!
//! Stake-backed reporters submit batches of asset prices during a short
//! window before each epoch boundary. Once the boundary plus an intervention
//! delay has passed, the buffered observations are combined into one canonical
//! price per asset by taking their median. A governance authority can halt
//! publication at any time, freezing the canonical prices until it resumes.
//!
//! ## Modules
//!
//! - [`config`]: Immutable feed parameters
//! - [`clock`]: Host-supplied time source
//! - [`directory`]: Registered assets and their precision
//! - [`stake`]: Reporter collateral and operator ranking
//! - [`epoch`]: Epoch boundaries, update window, intervention delay
//! - [`median`]: Median aggregation of observations
//! - [`admission`]: Submission checks and the per-epoch observation buffer
//! - [`intervention`]: Authority-gated halt / resume switch
//! - [`feed`]: The [`CanonicalPriceFeed`] orchestrator
//! - [`pricing`]: Recency, inverted and cross-asset price queries

pub mod admission;
pub mod clock;
pub mod config;
pub mod directory;
pub mod epoch;
pub mod feed;
pub mod intervention;
pub mod median;
pub mod pricing;
pub mod stake;

pub use config::FeedConfig;
pub use feed::{
    CanonicalPriceFeed, EpochOutcome, FeedSnapshot, FeedStats, InterventionReceipt, SubmitReceipt,
};

use pricefeed_types::{AccountId, AssetId, InterventionState, ReporterId, Stake, Timestamp};

/// Error types for price feed operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// The asset is not present in the asset directory.
    #[error("unknown asset: {0}")]
    UnknownAsset(AssetId),

    /// The asset is registered but no canonical price has been published yet.
    #[error("no price published for asset: {0}")]
    NoPrice(AssetId),

    /// The reporter's locked stake is below the configured minimum.
    #[error("insufficient stake for {reporter}: have {stake}, need {minimum}")]
    InsufficientStake {
        /// Reporter whose submission was rejected.
        reporter: ReporterId,
        /// Stake currently locked by the reporter.
        stake: Stake,
        /// Configured minimum stake.
        minimum: Stake,
    },

    /// The reporter is staked but not among the active operators.
    #[error("reporter is not an active operator: {0}")]
    NotOperator(ReporterId),

    /// The submission arrived outside the pre-epoch update window.
    #[error("outside update window: now {now}, window [{window_start}, {window_end})")]
    OutsideUpdateWindow {
        /// Time of the rejected submission.
        now: Timestamp,
        /// First second of the update window.
        window_start: Timestamp,
        /// End of the update window (exclusive), the epoch boundary.
        window_end: Timestamp,
    },

    /// Publication is halted by the authority.
    #[error("updates are halted")]
    UpdatesHalted,

    /// The caller is not the intervention authority.
    #[error("unauthorized caller: {0}")]
    Unauthorized(AccountId),

    /// The intervention switch is already in the requested state.
    #[error("intervention state is already {0}")]
    NoOpTransition(InterventionState),

    /// The submitted batch contains no prices.
    #[error("empty price batch")]
    EmptyBatch,

    /// A derived price could not be represented.
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    /// An asset declared more decimals than a price can represent.
    #[error("invalid decimals for {asset}: {decimals}")]
    InvalidDecimals {
        /// Asset being registered.
        asset: AssetId,
        /// Declared decimal precision.
        decimals: u8,
    },

    /// A stake withdrawal exceeded the reporter's locked stake.
    #[error("withdrawal of {requested} exceeds stake {stake} for {reporter}")]
    WithdrawExceedsStake {
        /// Reporter withdrawing stake.
        reporter: ReporterId,
        /// Stake currently locked.
        stake: Stake,
        /// Amount requested.
        requested: Stake,
    },

    /// The feed configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience result type for price feed operations.
pub type Result<T> = std::result::Result<T, OracleError>;
