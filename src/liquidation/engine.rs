//! Liquidation of undercollateralized accounts.
//!
//! Any caller may repay part or all of another account's debt once that
//! account's health factor is below the minimum. In return the liquidator
//! receives collateral worth the repaid debt plus a bonus:
//!
//! ```text
//! seized = token_amount_from_usd(asset, debt_to_cover)
//! bonus  = seized * liquidation_bonus / liquidation_precision
//! ```
//!
//! The liquidation is rejected unless the account's health factor strictly
//! improves and the liquidator's own position stays healthy. When the
//! protocol as a whole is at or below 100% collateralization the bonus cannot
//! be paid without making the account worse off, and liquidation fails.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::collateral::AssetId;
use crate::core::engine::DscEngine;
use crate::core::ledger::LedgerView;
use crate::error::{Error, Result};
use crate::events::EngineEvent;
use crate::utils::address::Address;
use crate::utils::math::{mul_div, safe_add, Wad};

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION QUOTE
// ═══════════════════════════════════════════════════════════════════════════════

/// Collateral owed for covering a given amount of debt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationQuote {
    /// Collateral asset paid out
    pub asset: AssetId,
    /// Debt repaid (18 decimals)
    pub debt_to_cover: u128,
    /// Collateral equal in value to the debt
    pub token_amount: u128,
    /// Extra collateral awarded
    pub bonus: u128,
    /// Total collateral moved to the liquidator
    pub total_collateral: u128,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION OUTCOME
// ═══════════════════════════════════════════════════════════════════════════════

/// Record of a committed liquidation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationOutcome {
    /// Account liquidated
    pub user: Address,
    /// Caller who repaid the debt
    pub liquidator: Address,
    /// Amounts settled
    pub quote: LiquidationQuote,
    /// Health factor of `user` before
    pub starting_health_factor: Wad,
    /// Health factor of `user` after
    pub ending_health_factor: Wad,
}

/// Aggregates over the retained event log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LiquidationStats {
    /// Seizures recorded
    pub liquidations: u64,
    /// Collateral units seized, summed across assets
    pub collateral_seized: u128,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION
// ═══════════════════════════════════════════════════════════════════════════════

impl DscEngine {
    /// Collateral a liquidator would receive for covering `debt_to_cover`
    pub fn quote_liquidation(&self, asset: &AssetId, debt_to_cover: u128) -> Result<LiquidationQuote> {
        if debt_to_cover == 0 {
            return Err(Error::ZeroAmount);
        }
        let params = self.params();
        let token_amount = self.token_amount_from_usd(asset, Wad::from_raw(debt_to_cover))?;
        let bonus = mul_div(
            token_amount,
            params.liquidation_bonus,
            params.liquidation_precision,
            "liquidation bonus",
        )?;

        Ok(LiquidationQuote {
            asset: *asset,
            debt_to_cover,
            token_amount,
            bonus,
            total_collateral: safe_add(token_amount, bonus, "liquidation payout")?,
        })
    }

    /// Repay `debt_to_cover` of `user`'s debt with the liquidator's DSC and
    /// seize the matching `asset` collateral plus bonus.
    ///
    /// The liquidator must have approved the engine to pull `debt_to_cover`
    /// DSC.
    pub fn liquidate(
        &mut self,
        liquidator: Address,
        asset: AssetId,
        user: Address,
        debt_to_cover: u128,
    ) -> Result<LiquidationOutcome> {
        if debt_to_cover == 0 {
            return Err(Error::ZeroAmount);
        }
        if !self.registry().is_allowed(&asset) {
            return Err(Error::AssetNotAllowed(asset.to_hex()));
        }

        let health = self.health();
        let minimum = self.params().min_health_factor;

        let starting = health.health_factor(self.ledger(), &user)?;
        if starting.raw() >= minimum {
            warn!("refusing to liquidate {}: health factor {}", user.short(), starting);
            return Err(Error::HealthFactorOk(user.to_hex()));
        }

        let outstanding = self.ledger().debt_of(&user);
        if debt_to_cover > outstanding {
            return Err(Error::InsufficientDebt {
                requested: debt_to_cover,
                outstanding,
            });
        }

        let quote = self.quote_liquidation(&asset, debt_to_cover)?;

        let mut pending = self.begin();
        pending.burn(user, liquidator, debt_to_cover)?;
        pending.redeem(user, asset, quote.total_collateral, liquidator)?;

        let ending = health.health_factor(pending.view(), &user)?;
        if ending <= starting {
            warn!(
                "liquidation of {} rejected: health factor {} -> {}",
                user.short(),
                starting,
                ending
            );
            return Err(Error::HealthFactorNotImproved {
                starting: starting.raw(),
                ending: ending.raw(),
            });
        }
        health.ensure_healthy(pending.view(), &liquidator)?;

        let (changes, settlement) = pending.into_parts();
        self.commit("liquidate", changes, settlement)?;

        info!(
            "{} liquidated {}: covered {} DSC for {} + {} bonus of {}, health {} -> {}",
            liquidator.short(),
            user.short(),
            Wad::from_raw(debt_to_cover),
            Wad::from_raw(quote.token_amount),
            Wad::from_raw(quote.bonus),
            self.registry().symbol(&asset),
            starting,
            ending
        );

        Ok(LiquidationOutcome {
            user,
            liquidator,
            quote,
            starting_health_factor: starting,
            ending_health_factor: ending,
        })
    }

    /// Liquidation totals from the retained event log
    pub fn liquidation_statistics(&self) -> LiquidationStats {
        self.events()
            .liquidations()
            .into_iter()
            .fold(LiquidationStats::default(), |mut stats, event| {
                stats.liquidations += 1;
                if let EngineEvent::CollateralRedeemed { amount, .. } = event {
                    stats.collateral_seized = stats.collateral_seized.saturating_add(*amount);
                }
                stats
            })
    }
}
