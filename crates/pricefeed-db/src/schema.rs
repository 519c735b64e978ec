//! SQL schema definitions.

/// Complete schema for the v1 feed database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Canonical prices
-- ============================================================

CREATE TABLE IF NOT EXISTS canonical_prices (
    asset TEXT PRIMARY KEY,
    price TEXT NOT NULL,
    published_at INTEGER NOT NULL,
    update_count INTEGER NOT NULL DEFAULT 0
);

-- ============================================================
-- Finalized epochs
-- ============================================================

CREATE TABLE IF NOT EXISTS price_history (
    epoch_start INTEGER NOT NULL,
    finalized_at INTEGER NOT NULL,
    asset TEXT NOT NULL,
    price TEXT NOT NULL,
    PRIMARY KEY (epoch_start, asset)
);

CREATE INDEX IF NOT EXISTS idx_price_history_asset
    ON price_history (asset, epoch_start);

-- ============================================================
-- Feed settings (last epoch time, intervention state)
-- ============================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
