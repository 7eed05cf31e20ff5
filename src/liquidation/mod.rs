//! Liquidation module for the DSC engine.
//!
//! This module handles liquidations of undercollateralized accounts:
//! - Quoting the collateral owed for a given debt repayment
//! - Executing liquidations with their post-condition checks
//! - Aggregate statistics over recorded seizures

pub mod engine;

pub use engine::*;
