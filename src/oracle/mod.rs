//! Oracle module for collateral price quotes.
//!
//! This module provides:
//! - The `PriceOracle` interface consumed by the engine
//! - A round-based in-memory aggregator
//! - A staleness-checking adapter over any round source
//!
//! ## Usage
//!
//! ```rust,ignore
//! let feed = Arc::new(ManualAggregator::new("ETH / USD", 2_000_0000_0000, now));
//! let oracle = StaleCheckedOracle::new(feed.clone(), Arc::new(SystemClock))?;
//!
//! let quote = oracle.latest_price()?;
//! ```

pub mod price_feed;
pub mod staleness;

pub use price_feed::*;
pub use staleness::*;
