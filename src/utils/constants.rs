//! Protocol constants and precision scales.
//!
//! All protocol-wide constants are defined here for easy auditing.

// ═══════════════════════════════════════════════════════════════════════════════
// PRECISION SCALES
// ═══════════════════════════════════════════════════════════════════════════════

/// Internal fixed-point precision (18 decimals)
pub const PRECISION: u128 = 1_000_000_000_000_000_000;

/// Decimals reported by price feeds
pub const FEED_DECIMALS: u8 = 8;

/// Price feed precision (8 decimals)
pub const FEED_PRECISION: u128 = 100_000_000;

/// Factor lifting a feed answer to internal precision
pub const ADDITIONAL_FEED_PRECISION: u128 = PRECISION / FEED_PRECISION;

/// Decimals of collateral assets and of the stablecoin
pub const TOKEN_DECIMALS: u8 = 18;

// ═══════════════════════════════════════════════════════════════════════════════
// RISK PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Share of collateral value counted toward solvency, in liquidation precision
/// units. 50 means positions must be 200% overcollateralized.
pub const LIQUIDATION_THRESHOLD: u128 = 50;

/// Extra collateral awarded to liquidators, in liquidation precision units (10%)
pub const LIQUIDATION_BONUS: u128 = 10;

/// Denominator for threshold and bonus
pub const LIQUIDATION_PRECISION: u128 = 100;

/// Health factor below which a position is liquidatable (1.0)
pub const MIN_HEALTH_FACTOR: u128 = PRECISION;

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum age of a price answer before it is considered stale (3 hours)
pub const ORACLE_TIMEOUT_SECS: u64 = 3 * 60 * 60;

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTITY & BOOKKEEPING
// ═══════════════════════════════════════════════════════════════════════════════

/// Length of an account address in bytes
pub const ADDRESS_LENGTH: usize = 20;

/// Maximum events kept in memory by the engine
pub const MAX_EVENTS: usize = 1000;

/// Stablecoin name
pub const DSC_NAME: &str = "Decentralized Stable Coin";

/// Stablecoin symbol
pub const DSC_SYMBOL: &str = "DSC";
