//! Engine events.
//!
//! Two events are published, both only after an operation commits:
//! - `CollateralDeposited` for every collateral credit
//! - `CollateralRedeemed` for every collateral debit; a redemption whose
//!   source and destination differ is the public record of a liquidation

pub mod history;
pub mod types;

pub use history::*;
pub use types::*;
