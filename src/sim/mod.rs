//! Scenario simulator.
//!
//! Replays scripted sequences of deposits, mints, price moves and
//! liquidations against an engine wired to in-memory collaborators:
//! - `scenario`: the JSON scenario format and amount parsing
//! - `runner`: execution and the final report
//!
//! ## Usage
//!
//! ```rust,ignore
//! let scenario = Scenario::load(Path::new("liquidation.json"))?;
//! let report = run(&scenario, ProtocolParams::default())?;
//! assert!(report.passed());
//! ```

pub mod runner;
pub mod scenario;

pub use runner::*;
pub use scenario::*;
