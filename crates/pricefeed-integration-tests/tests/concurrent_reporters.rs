//! Integration test: many reporters submitting at once.
//!
//! The feed sits behind a `tokio::sync::Mutex`, the way the daemon hosts it.
//! Ten staked reporters race to submit in the same update window while only
//! the five largest stakers are operators. Every submission is admitted or
//! rejected atomically, and the published price is the median of exactly
//! the operators' observations.

use std::collections::BTreeMap;
use std::sync::Arc;

use pricefeed_oracle::directory::InMemoryAssetDirectory;
use pricefeed_oracle::stake::InMemoryStakeLedger;
use pricefeed_oracle::{CanonicalPriceFeed, FeedConfig, OracleError};
use pricefeed_types::{AccountId, AssetId, Price, ReporterId};
use tokio::sync::Mutex;

const GENESIS: u64 = 5_000;
const REPORTERS: u128 = 10;
const OPERATORS: usize = 5;
const UNIT: Price = 10_000_000_000;

type Feed = CanonicalPriceFeed<InMemoryAssetDirectory, InMemoryStakeLedger>;

fn reporter(i: u128) -> ReporterId {
    ReporterId::from(format!("reporter-{i}").as_str())
}

fn setup() -> Feed {
    let mut config = FeedConfig::new(AccountId::from("governance"), AssetId::from("MLN-T"));
    config.interval = 60;
    config.pre_epoch_update_period = 10;
    config.post_epoch_intervention_delay = 10;
    config.minimum_stake = 100;
    config.num_operators = Some(OPERATORS);

    let mut directory = InMemoryAssetDirectory::new();
    directory.register(AssetId::from("MLN-T"), 18).expect("register MLN");
    directory.register(AssetId::from("EUR-T"), 12).expect("register EUR");

    // reporter-i stakes 100 + i, so reporter-5..reporter-9 are operators.
    let mut ledger = InMemoryStakeLedger::new();
    for i in 0..REPORTERS {
        ledger.deposit_stake(&reporter(i), 100 + i);
    }

    Feed::new(config, directory, ledger, GENESIS).expect("feed")
}

#[tokio::test]
async fn concurrent_submissions_publish_operator_median() {
    let feed = Arc::new(Mutex::new(setup()));
    let now = {
        let feed = feed.lock().await;
        assert_eq!(feed.operators().len(), OPERATORS);
        feed.get_next_epoch_time() - 1
    };

    let mut handles = Vec::new();
    for i in 0..REPORTERS {
        let feed = feed.clone();
        handles.push(tokio::spawn(async move {
            let batch = BTreeMap::from([(AssetId::from("EUR-T"), (i + 1) * UNIT)]);
            let mut feed = feed.lock().await;
            (i, feed.submit(&reporter(i), &batch, now))
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        let (i, result) = handle.await.expect("task");
        if i >= REPORTERS - OPERATORS as u128 {
            result.expect("operator accepted");
            accepted += 1;
        } else {
            assert_eq!(
                result.expect_err("non-operator rejected"),
                OracleError::NotOperator(reporter(i))
            );
        }
    }
    assert_eq!(accepted, OPERATORS);

    let mut feed = feed.lock().await;
    assert_eq!(feed.pending_observations().count(), OPERATORS);

    let finalize_at = feed.scheduler().finalization_time();
    feed.tick(finalize_at).expect("finalized");

    // Operators submitted 6..=10 units; the median is 8.
    assert_eq!(
        feed.get_price(&AssetId::from("EUR-T")).expect("price"),
        8 * UNIT
    );

    // Repeated ticks after the threshold change nothing.
    let snapshot = feed.snapshot();
    assert!(feed.tick(finalize_at).is_none());
    assert!(feed.tick(finalize_at + 1).is_none());
    assert_eq!(feed.snapshot(), snapshot);

    let stats = feed.stats();
    assert_eq!(stats.accepted_submissions, OPERATORS as u64);
    assert_eq!(
        stats.rejected_submissions.values().sum::<u64>(),
        (REPORTERS as u64) - OPERATORS as u64
    );
}
