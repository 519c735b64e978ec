//! Integration test crate for the price feed.
//!
//! This crate has no library code; it only contains integration tests
//! that drive the feed through whole epochs across the workspace crates.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p pricefeed-integration-tests
//! ```
