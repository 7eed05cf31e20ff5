//! Core modules of the DSC engine.
//!
//! This module contains the fundamental building blocks:
//! - Protocol parameters and the collateral registry
//! - The collateral and debt ledger with its staging overlay
//! - Health factor calculation
//! - External settlement with compensation
//! - The engine and its shared, reentrancy-guarded handle
//! - The DSC token and collateral token interfaces

pub mod collateral;
pub mod config;
pub mod engine;
pub mod health;
pub mod ledger;
pub mod registry;
pub mod settlement;
pub mod shared;
pub mod token;

pub use collateral::*;
pub use config::*;
pub use engine::*;
pub use health::*;
pub use ledger::*;
pub use registry::*;
pub use settlement::*;
pub use shared::*;
pub use token::*;
