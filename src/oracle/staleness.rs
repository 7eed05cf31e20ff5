//! Staleness-checked oracle adapter.
//!
//! Wraps a [`RoundDataSource`] and turns its latest round into a
//! [`PriceQuote`]. A round is fresh only if it completed, its answer was
//! computed in the round itself, and it is no older than the timeout.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::oracle::price_feed::{PriceOracle, PriceQuote, RoundData, RoundDataSource};
use crate::utils::constants::{FEED_DECIMALS, ORACLE_TIMEOUT_SECS};

// ═══════════════════════════════════════════════════════════════════════════════
// CLOCK
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of the current unix time
pub trait Clock: Send + Sync {
    /// Current unix timestamp in seconds
    fn now(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        Utc::now().timestamp().max(0) as u64
    }
}

/// Clock moved by hand, for tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    /// Create at `timestamp`
    pub fn new(timestamp: u64) -> Self {
        Self(AtomicU64::new(timestamp))
    }

    /// Jump to `timestamp`
    pub fn set(&self, timestamp: u64) {
        self.0.store(timestamp, Ordering::SeqCst);
    }

    /// Move forward by `secs`
    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STALE-CHECKED ORACLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Oracle adapter flagging stale rounds
pub struct StaleCheckedOracle {
    source: Arc<dyn RoundDataSource>,
    clock: Arc<dyn Clock>,
    timeout_secs: u64,
}

impl StaleCheckedOracle {
    /// Wrap `source` with the default three hour timeout
    pub fn new(source: Arc<dyn RoundDataSource>, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::with_timeout(source, clock, ORACLE_TIMEOUT_SECS)
    }

    /// Wrap `source` with a custom timeout
    pub fn with_timeout(
        source: Arc<dyn RoundDataSource>,
        clock: Arc<dyn Clock>,
        timeout_secs: u64,
    ) -> Result<Self> {
        if source.decimals() != FEED_DECIMALS {
            return Err(Error::InvalidParameter {
                name: "decimals".into(),
                reason: format!(
                    "{} reports {} decimals, expected {}",
                    source.description(),
                    source.decimals(),
                    FEED_DECIMALS
                ),
            });
        }
        if timeout_secs == 0 {
            return Err(Error::InvalidParameter {
                name: "timeout_secs".into(),
                reason: "cannot be zero".into(),
            });
        }

        Ok(Self {
            source,
            clock,
            timeout_secs,
        })
    }

    /// Timeout in seconds
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Freshness verdict for a round at time `now`
    pub fn is_fresh(round: &RoundData, now: u64, timeout_secs: u64) -> bool {
        round.updated_at != 0
            && round.answered_in_round >= round.round_id
            && now.saturating_sub(round.updated_at) <= timeout_secs
    }
}

impl PriceOracle for StaleCheckedOracle {
    fn latest_price(&self) -> Result<PriceQuote> {
        let round = self.source.latest_round_data()?;
        let is_fresh = Self::is_fresh(&round, self.clock.now(), self.timeout_secs);

        if !is_fresh {
            tracing::warn!(
                feed = %self.source.description(),
                round_id = round.round_id,
                updated_at = round.updated_at,
                "stale price round"
            );
        }

        Ok(PriceQuote {
            price: round.answer,
            is_fresh,
        })
    }

    fn description(&self) -> String {
        self.source.description()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::price_feed::ManualAggregator;

    fn setup() -> (Arc<ManualAggregator>, Arc<ManualClock>, StaleCheckedOracle) {
        let feed = Arc::new(ManualAggregator::new("ETH / USD", 2_000_0000_0000, 1_000));
        let clock = Arc::new(ManualClock::new(1_000));
        let oracle = StaleCheckedOracle::new(feed.clone(), clock.clone()).unwrap();
        (feed, clock, oracle)
    }

    #[test]
    fn test_fresh_quote() {
        let (_, _, oracle) = setup();
        let quote = oracle.latest_price().unwrap();
        assert!(quote.is_fresh);
        assert_eq!(quote.price, 2_000_0000_0000);
    }

    #[test]
    fn test_timeout_boundary() {
        let (_, clock, oracle) = setup();

        clock.advance(ORACLE_TIMEOUT_SECS);
        assert!(oracle.latest_price().unwrap().is_fresh);

        clock.advance(1);
        assert!(!oracle.latest_price().unwrap().is_fresh);
    }

    #[test]
    fn test_incomplete_round_is_stale() {
        let (feed, _, oracle) = setup();
        feed.set_round_data(RoundData {
            round_id: 2,
            answer: 2_000_0000_0000,
            started_at: 1_000,
            updated_at: 0,
            answered_in_round: 2,
        })
        .unwrap();
        assert!(!oracle.latest_price().unwrap().is_fresh);
    }

    #[test]
    fn test_carried_over_answer_is_stale() {
        let (feed, _, oracle) = setup();
        feed.set_round_data(RoundData {
            round_id: 3,
            answer: 2_000_0000_0000,
            started_at: 1_000,
            updated_at: 1_000,
            answered_in_round: 2,
        })
        .unwrap();
        assert!(!oracle.latest_price().unwrap().is_fresh);
    }

    #[test]
    fn test_rejects_wrong_decimals() {
        let feed = Arc::new(ManualAggregator::with_decimals("X / USD", 18, 1, 1));
        let clock = Arc::new(ManualClock::new(1));
        assert!(StaleCheckedOracle::new(feed, clock).is_err());
    }
}
