//! Configuration file management.
//!
//! Read from `$PRICEFEED_DATA_DIR/config.toml` when present. Every section is
//! optional; a missing file yields a development feed with defaults.

use std::collections::BTreeMap;
use std::path::PathBuf;

use pricefeed_oracle::directory::InMemoryAssetDirectory;
use pricefeed_oracle::stake::InMemoryStakeLedger;
use pricefeed_oracle::FeedConfig;
use pricefeed_types::{AccountId, AssetId, ReporterId, Stake};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "PRICEFEED_DATA_DIR";

/// Complete daemon configuration.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Feed parameters. `authority` and `quote_asset` are required when the
    /// section is present.
    #[serde(default = "default_feed")]
    pub feed: FeedConfig,
    /// Registered assets and their decimal precision.
    #[serde(default = "default_assets")]
    pub assets: BTreeMap<AssetId, u8>,
    /// Stake locked per reporter, as decimal strings.
    #[serde_as(as = "BTreeMap<_, DisplayFromStr>")]
    #[serde(default)]
    pub stakes: BTreeMap<ReporterId, Stake>,
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seconds between finalization checks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// Buffered events per subscriber before it starts lagging.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

// Default value functions

fn default_feed() -> FeedConfig {
    FeedConfig::new(AccountId::from("governance"), AssetId::from("MLN-T"))
}

fn default_assets() -> BTreeMap<AssetId, u8> {
    BTreeMap::from([(AssetId::from("MLN-T"), 18)])
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tick_interval() -> u64 {
    1
}

fn default_event_capacity() -> usize {
    1000
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            feed: default_feed(),
            assets: default_assets(),
            stakes: BTreeMap::new(),
            storage: StorageConfig::default(),
            advanced: AdvancedConfig::default(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            tick_interval_secs: default_tick_interval(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::parse(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: DaemonConfig = toml::from_str(content)?;
        config.feed.validate()?;
        if !config.assets.contains_key(&config.feed.quote_asset) {
            anyhow::bail!(
                "quote asset {} missing from [assets]",
                config.feed.quote_asset
            );
        }
        Ok(config)
    }

    /// Build the asset directory described by `[assets]`.
    pub fn asset_directory(&self) -> anyhow::Result<InMemoryAssetDirectory> {
        let mut directory = InMemoryAssetDirectory::new();
        for (asset, decimals) in &self.assets {
            directory.register(asset.clone(), *decimals)?;
        }
        Ok(directory)
    }

    /// Build the stake ledger described by `[stakes]`.
    pub fn stake_ledger(&self) -> InMemoryStakeLedger {
        let mut ledger = InMemoryStakeLedger::new();
        for (reporter, stake) in &self.stakes {
            ledger.deposit_stake(reporter, *stake);
        }
        ledger
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/PriceFeed")
        }
        #[cfg(not(target_os = "macos"))]
        {
            dirs_fallback(".pricefeed")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/pricefeed"))
}
