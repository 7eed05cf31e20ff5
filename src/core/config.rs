//! Protocol parameters.
//!
//! Parameters are fixed for the lifetime of an engine. They can be loaded
//! from and saved to JSON so simulations and deployments share one format.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::constants::*;

/// Immutable risk parameters of an engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolParams {
    /// Share of collateral value counted toward solvency, in
    /// `liquidation_precision` units
    pub liquidation_threshold: u128,

    /// Extra collateral awarded to a liquidator, in `liquidation_precision`
    /// units of the covered amount
    pub liquidation_bonus: u128,

    /// Denominator of threshold and bonus
    pub liquidation_precision: u128,

    /// Health factor below which a position is liquidatable (18 decimals)
    pub min_health_factor: u128,

    /// Maximum price age accepted by the staleness adapter
    pub oracle_timeout_secs: u64,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            liquidation_threshold: LIQUIDATION_THRESHOLD,
            liquidation_bonus: LIQUIDATION_BONUS,
            liquidation_precision: LIQUIDATION_PRECISION,
            min_health_factor: MIN_HEALTH_FACTOR,
            oracle_timeout_secs: ORACLE_TIMEOUT_SECS,
        }
    }
}

impl ProtocolParams {
    /// Override the liquidation threshold
    pub fn with_threshold(mut self, threshold: u128) -> Self {
        self.liquidation_threshold = threshold;
        self
    }

    /// Override the liquidation bonus
    pub fn with_bonus(mut self, bonus: u128) -> Self {
        self.liquidation_bonus = bonus;
        self
    }

    /// Check parameters are consistent
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, reason: &str| Error::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        };

        if self.liquidation_precision == 0 {
            return Err(invalid("liquidation_precision", "cannot be zero"));
        }
        if self.liquidation_threshold == 0 || self.liquidation_threshold > self.liquidation_precision {
            return Err(invalid("liquidation_threshold", "must be in (0, precision]"));
        }
        if self.liquidation_bonus == 0 || self.liquidation_bonus > self.liquidation_precision {
            return Err(invalid("liquidation_bonus", "must be in (0, precision]"));
        }
        if self.min_health_factor == 0 {
            return Err(invalid("min_health_factor", "cannot be zero"));
        }
        if self.oracle_timeout_secs == 0 {
            return Err(invalid("oracle_timeout_secs", "cannot be zero"));
        }
        Ok(())
    }

    /// Collateralization implied by the threshold, as a percentage (50 → 200%)
    pub fn required_collateral_ratio_pct(&self) -> u128 {
        self.liquidation_precision * 100 / self.liquidation_threshold.max(1)
    }

    /// Load from a JSON file and validate
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let params: Self =
            serde_json::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Save as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Config(e.to_string()))?;
        }

        std::fs::write(path, content).map_err(|e| Error::Config(e.to_string()))
    }
}
