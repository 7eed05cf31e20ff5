//! Price feed interfaces and an in-memory round-based feed.
//!
//! A feed reports rounds the way an aggregator contract does: each update
//! opens a new round carrying the answer (8 decimals) and its timestamps.
//! The engine never reads rounds directly; it consumes [`PriceQuote`]s from a
//! [`PriceOracle`], which is where freshness is decided.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::utils::constants::FEED_DECIMALS;

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE QUOTE
// ═══════════════════════════════════════════════════════════════════════════════

/// A USD quote for one unit of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Price with feed precision (8 decimals)
    pub price: i128,
    /// Whether the quote passed the staleness checks
    pub is_fresh: bool,
}

/// Supplies the current USD price of a collateral asset.
///
/// Implementations must not substitute an old value for a missing one; a
/// quote that cannot be vouched for is reported with `is_fresh == false`.
pub trait PriceOracle: Send + Sync {
    /// Latest quote
    fn latest_price(&self) -> Result<PriceQuote>;

    /// Human readable feed description, e.g. `"ETH / USD"`
    fn description(&self) -> String;
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROUND DATA
// ═══════════════════════════════════════════════════════════════════════════════

/// One aggregator round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoundData {
    /// Round identifier
    pub round_id: u64,
    /// Answer with `decimals` precision
    pub answer: i128,
    /// Unix timestamp the round started
    pub started_at: u64,
    /// Unix timestamp of the last update, zero if the round never completed
    pub updated_at: u64,
    /// Round in which the answer was computed
    pub answered_in_round: u64,
}

/// Source of aggregator rounds
pub trait RoundDataSource: Send + Sync {
    /// Decimals of the answer
    fn decimals(&self) -> u8;

    /// Latest round
    fn latest_round_data(&self) -> Result<RoundData>;

    /// Human readable feed description
    fn description(&self) -> String;
}

// ═══════════════════════════════════════════════════════════════════════════════
// MANUAL AGGREGATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory aggregator whose answer is pushed by hand
#[derive(Debug)]
pub struct ManualAggregator {
    description: String,
    decimals: u8,
    latest: RwLock<RoundData>,
}

impl ManualAggregator {
    /// Create a feed with 8 decimals and an initial answer
    pub fn new(description: impl Into<String>, initial_answer: i128, timestamp: u64) -> Self {
        Self::with_decimals(description, FEED_DECIMALS, initial_answer, timestamp)
    }

    /// Create a feed with custom decimals
    pub fn with_decimals(
        description: impl Into<String>,
        decimals: u8,
        initial_answer: i128,
        timestamp: u64,
    ) -> Self {
        Self {
            description: description.into(),
            decimals,
            latest: RwLock::new(RoundData {
                round_id: 1,
                answer: initial_answer,
                started_at: timestamp,
                updated_at: timestamp,
                answered_in_round: 1,
            }),
        }
    }

    /// Open a new round with `answer`
    pub fn update_answer(&self, answer: i128, timestamp: u64) -> Result<()> {
        let mut latest = self.latest.write().map_err(|_| Error::Lock)?;
        let round_id = latest.round_id + 1;
        *latest = RoundData {
            round_id,
            answer,
            started_at: timestamp,
            updated_at: timestamp,
            answered_in_round: round_id,
        };
        Ok(())
    }

    /// Overwrite the latest round verbatim (incomplete or carried-over rounds)
    pub fn set_round_data(&self, round: RoundData) -> Result<()> {
        *self.latest.write().map_err(|_| Error::Lock)? = round;
        Ok(())
    }
}

impl RoundDataSource for ManualAggregator {
    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn latest_round_data(&self) -> Result<RoundData> {
        Ok(*self.latest.read().map_err(|_| Error::Lock)?)
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_answer_opens_round() {
        let feed = ManualAggregator::new("ETH / USD", 2_000_0000_0000, 100);
        assert_eq!(feed.decimals(), 8);

        let first = feed.latest_round_data().unwrap();
        assert_eq!(first.round_id, 1);
        assert_eq!(first.answer, 2_000_0000_0000);

        feed.update_answer(18_0000_0000, 200).unwrap();
        let second = feed.latest_round_data().unwrap();
        assert_eq!(second.round_id, 2);
        assert_eq!(second.answered_in_round, 2);
        assert_eq!(second.answer, 18_0000_0000);
        assert_eq!(second.updated_at, 200);
    }

    #[test]
    fn test_set_round_data() {
        let feed = ManualAggregator::new("BTC / USD", 1_000_0000_0000, 100);
        let round = RoundData {
            round_id: 7,
            answer: 5,
            started_at: 10,
            updated_at: 0,
            answered_in_round: 6,
        };
        feed.set_round_data(round).unwrap();
        assert_eq!(feed.latest_round_data().unwrap(), round);
    }
}
