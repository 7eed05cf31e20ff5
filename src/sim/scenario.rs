//! Scenario files.
//!
//! A scenario lists the collateral assets with their opening prices and a
//! sequence of steps. Accounts are referred to by name and assets by symbol;
//! amounts and prices are human decimals (`"10"`, `"0.05"`, `"1999.5"`).
//!
//! ```json
//! {
//!   "name": "liquidation payout",
//!   "assets": [{ "symbol": "WETH", "price": "2000" }],
//!   "steps": [
//!     { "action": "fund", "account": "alice", "asset": "WETH", "amount": "10" },
//!     { "action": "deposit_and_mint", "account": "alice", "asset": "WETH",
//!       "collateral": "10", "dsc": "100" },
//!     { "action": "mint", "account": "alice", "amount": "10000",
//!       "expect_error": "health factor" }
//!   ]
//! }
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::utils::constants::FEED_PRECISION;
use crate::utils::math::Wad;

/// Default start time for scenario clocks (2024-01-01T00:00:00Z)
pub const DEFAULT_START_TIME: u64 = 1_704_067_200;

fn default_start_time() -> u64 {
    DEFAULT_START_TIME
}

/// A collateral asset and its opening price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSpec {
    /// Ticker
    pub symbol: String,
    /// USD price of one unit
    pub price: String,
}

/// One scenario action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Credit collateral tokens to a wallet
    Fund { account: String, asset: String, amount: String },
    /// Publish a new oracle answer
    SetPrice { asset: String, price: String },
    /// Move the oracle clock forward
    AdvanceTime { secs: u64 },
    /// Approve and deposit collateral
    Deposit { account: String, asset: String, amount: String },
    /// Mint DSC
    Mint { account: String, amount: String },
    /// Approve, deposit and mint in one operation
    DepositAndMint { account: String, asset: String, collateral: String, dsc: String },
    /// Withdraw collateral
    Redeem { account: String, asset: String, amount: String },
    /// Repay debt
    Burn { account: String, amount: String },
    /// Repay debt and withdraw collateral in one operation
    RedeemForDsc { account: String, asset: String, collateral: String, dsc: String },
    /// Cover another account's debt
    Liquidate { liquidator: String, asset: String, user: String, debt_to_cover: String },
    /// Let the engine pull DSC from a wallet
    ApproveDsc { account: String, amount: String },
    /// Move DSC between wallets
    TransferDsc { from: String, to: String, amount: String },
}

impl Action {
    /// Short description for reports
    pub fn label(&self) -> String {
        match self {
            Action::Fund { account, asset, amount } => format!("fund {} with {} {}", account, amount, asset),
            Action::SetPrice { asset, price } => format!("set {} price to ${}", asset, price),
            Action::AdvanceTime { secs } => format!("advance clock {}s", secs),
            Action::Deposit { account, asset, amount } => format!("{} deposits {} {}", account, amount, asset),
            Action::Mint { account, amount } => format!("{} mints {} DSC", account, amount),
            Action::DepositAndMint { account, asset, collateral, dsc } => {
                format!("{} deposits {} {} and mints {} DSC", account, collateral, asset, dsc)
            }
            Action::Redeem { account, asset, amount } => format!("{} redeems {} {}", account, amount, asset),
            Action::Burn { account, amount } => format!("{} burns {} DSC", account, amount),
            Action::RedeemForDsc { account, asset, collateral, dsc } => {
                format!("{} burns {} DSC and redeems {} {}", account, dsc, collateral, asset)
            }
            Action::Liquidate { liquidator, asset, user, debt_to_cover } => {
                format!("{} liquidates {} covering {} DSC in {}", liquidator, user, debt_to_cover, asset)
            }
            Action::ApproveDsc { account, amount } => format!("{} approves {} DSC", account, amount),
            Action::TransferDsc { from, to, amount } => format!("{} sends {} DSC to {}", from, amount, to),
        }
    }
}

/// An action with an optional expected failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// What to do
    #[serde(flatten)]
    pub action: Action,

    /// The step must fail; a non-empty value must also appear in the error
    /// message (case-insensitive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_error: Option<String>,
}

/// A replayable sequence of engine operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name
    pub name: String,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Oracle clock at the first step
    #[serde(default = "default_start_time")]
    pub start_time: u64,

    /// Collateral assets in registration order
    pub assets: Vec<AssetSpec>,

    /// Steps in order
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Parse from JSON and validate
    pub fn from_json(json: &str) -> Result<Self> {
        let scenario: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(format!("scenario: {}", e)))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load from a JSON file and validate
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Check assets are present, unique and priced
    pub fn validate(&self) -> Result<()> {
        if self.assets.is_empty() {
            return Err(Error::Config("scenario declares no assets".into()));
        }
        for (i, asset) in self.assets.iter().enumerate() {
            if self.assets[..i].iter().any(|a| a.symbol == asset.symbol) {
                return Err(Error::DuplicateAsset(asset.symbol.clone()));
            }
            parse_price(&asset.price)?;
        }
        Ok(())
    }
}

/// Parse a token amount into 18-decimal units
pub fn parse_amount(s: &str) -> Result<u128> {
    Wad::from_decimal_str(s).map(|w| w.raw())
}

/// Parse a USD price into feed units (8 decimals), truncating extra digits.
/// Negative prices are accepted so faulty feeds can be simulated.
pub fn parse_price(s: &str) -> Result<i128> {
    let invalid = |reason: String| Error::InvalidParameter {
        name: "price".into(),
        reason,
    };

    let decimal = Decimal::from_str(s.trim()).map_err(|e| invalid(e.to_string()))?;
    let feed_precision = Decimal::from(FEED_PRECISION as u64);
    decimal
        .checked_mul(feed_precision)
        .and_then(|scaled| scaled.trunc().to_i128())
        .ok_or_else(|| invalid(format!("{} is out of range", s)))
}
