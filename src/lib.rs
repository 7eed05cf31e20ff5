//! # DSC Engine
//!
//! An overcollateralized synthetic dollar. Users lock whitelisted collateral
//! and mint DSC against it; every mutation is checked against a minimum
//! health factor, and undercollateralized accounts can be liquidated by any
//! third party for a bonus.
//!
//! ## Architecture
//!
//! - **Core**: ledger, health factor calculation, settlement and the engine
//! - **Oracle**: price feed interfaces and staleness checks
//! - **Liquidation**: quoting and executing liquidations
//! - **Events**: the deposit and redemption event log
//! - **Sim**: scenario replay for the `dsc` binary
//!
//! ## Example
//!
//! ```rust,ignore
//! use dsc::prelude::*;
//!
//! let engine = DscEngine::from_lists(address, tokens, oracles, dsc, ProtocolParams::default())?;
//! engine.deposit_collateral_and_mint_dsc(user, weth, 10 * PRECISION, 100 * PRECISION)?;
//! assert!(engine.health_factor(&user)? >= Wad::ONE);
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod core;
pub mod error;
pub mod events;
pub mod liquidation;
pub mod oracle;
pub mod sim;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        collateral::{AssetId, CollateralToken, InMemoryCollateral},
        config::ProtocolParams,
        engine::{DscEngine, EngineSnapshot},
        health::AccountInformation,
        registry::CollateralRegistry,
        shared::SharedEngine,
        token::{DscToken, StableToken},
    };
    pub use crate::error::{Error, Result};
    pub use crate::events::{EngineEvent, EventLog};
    pub use crate::liquidation::{LiquidationOutcome, LiquidationQuote};
    pub use crate::oracle::{
        price_feed::{ManualAggregator, PriceOracle, PriceQuote},
        staleness::{ManualClock, StaleCheckedOracle, SystemClock},
    };
    pub use crate::utils::{
        address::Address,
        constants::PRECISION,
        math::Wad,
    };
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol name
pub const PROTOCOL_NAME: &str = "DSC";
