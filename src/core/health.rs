//! Health factor calculation.
//!
//! The health factor of an account is its risk-adjusted collateral value over
//! its debt, in 18-decimal fixed point:
//!
//! ```text
//! adjusted = collateral_value * liquidation_threshold / liquidation_precision
//! health   = adjusted * 1e18 / debt            (debt > 0)
//! health   = Wad::MAX                          (debt == 0)
//! ```
//!
//! USD values use the oracle price lifted to 18 decimals, and
//! `token_amount_from_usd` is the inverse of `usd_value` with the same
//! constants, so a round trip only loses truncation.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::collateral::AssetId;
use crate::core::config::ProtocolParams;
use crate::core::ledger::LedgerView;
use crate::core::registry::CollateralRegistry;
use crate::error::{Error, Result};
use crate::utils::address::Address;
use crate::utils::constants::PRECISION;
use crate::utils::math::{mul_div, Wad};

/// Health factor from total debt and collateral value (both 18 decimals)
pub fn calculate_health_factor(
    total_debt: u128,
    collateral_value_usd: Wad,
    params: &ProtocolParams,
) -> Result<Wad> {
    if total_debt == 0 {
        return Ok(Wad::MAX);
    }

    let adjusted = mul_div(
        collateral_value_usd.raw(),
        params.liquidation_threshold,
        params.liquidation_precision,
        "adjust collateral for threshold",
    )?;

    match mul_div(adjusted, PRECISION, total_debt, "health factor") {
        Ok(raw) => Ok(Wad::from_raw(raw)),
        // Anything past u128 is as healthy as no debt at all
        Err(Error::Overflow { .. }) => Ok(Wad::MAX),
        Err(e) => Err(e),
    }
}

/// Debt and collateral value of one account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInformation {
    /// Outstanding debt (18 decimals)
    pub total_debt: u128,
    /// USD value of all collateral (18 decimals)
    pub collateral_value_usd: Wad,
}

/// Prices balances and evaluates solvency against any [`LedgerView`]
#[derive(Debug, Clone, Copy)]
pub struct HealthCalculator<'a> {
    registry: &'a CollateralRegistry,
    params: &'a ProtocolParams,
}

impl<'a> HealthCalculator<'a> {
    /// Create a calculator over a registry and parameter set
    pub fn new(registry: &'a CollateralRegistry, params: &'a ProtocolParams) -> Self {
        Self { registry, params }
    }

    /// USD value of `amount` units of `asset`
    pub fn usd_value(&self, asset: &AssetId, amount: u128) -> Result<Wad> {
        let price = self.registry.price(asset)?;
        mul_div(price.raw(), amount, PRECISION, "usd value").map(Wad::from_raw)
    }

    /// Units of `asset` worth `usd_amount`
    pub fn token_amount_from_usd(&self, asset: &AssetId, usd_amount: Wad) -> Result<u128> {
        let price = self.registry.price(asset)?;
        mul_div(usd_amount.raw(), PRECISION, price.raw(), "token amount from usd")
    }

    /// Total USD value of `user`'s collateral.
    ///
    /// Assets the user holds none of are not priced.
    pub fn collateral_value<V: LedgerView + ?Sized>(&self, view: &V, user: &Address) -> Result<Wad> {
        let mut total = Wad::ZERO;
        for asset in self.registry.assets() {
            let amount = view.collateral_of(user, &asset);
            if amount == 0 {
                continue;
            }
            total = total.checked_add(self.usd_value(&asset, amount)?)?;
        }
        Ok(total)
    }

    /// Debt and collateral value of `user`
    pub fn account_information<V: LedgerView + ?Sized>(
        &self,
        view: &V,
        user: &Address,
    ) -> Result<AccountInformation> {
        Ok(AccountInformation {
            total_debt: view.debt_of(user),
            collateral_value_usd: self.collateral_value(view, user)?,
        })
    }

    /// Health factor of `user`
    pub fn health_factor<V: LedgerView + ?Sized>(&self, view: &V, user: &Address) -> Result<Wad> {
        let debt = view.debt_of(user);
        if debt == 0 {
            return Ok(Wad::MAX);
        }

        let value = self.collateral_value(view, user)?;
        let health = calculate_health_factor(debt, value, self.params)?;
        debug!(
            "health factor of {}: {} (debt {}, collateral ${})",
            user.short(),
            health,
            Wad::from_raw(debt),
            value
        );
        Ok(health)
    }

    /// Fail unless `user` is at or above the minimum health factor
    pub fn ensure_healthy<V: LedgerView + ?Sized>(&self, view: &V, user: &Address) -> Result<Wad> {
        let health = self.health_factor(view, user)?;
        if health.raw() < self.params.min_health_factor {
            warn!(
                "rejecting operation: health factor of {} would be {}",
                user.short(),
                health
            );
            return Err(Error::BreaksHealthFactor {
                health_factor: health.raw(),
                minimum: self.params.min_health_factor,
            });
        }
        Ok(health)
    }

    /// Whether `user` is below the minimum health factor
    pub fn is_liquidatable<V: LedgerView + ?Sized>(&self, view: &V, user: &Address) -> Result<bool> {
        Ok(self.health_factor(view, user)?.raw() < self.params.min_health_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collateral::{CollateralToken, InMemoryCollateral};
    use crate::core::ledger::{Ledger, LedgerOverlay};
    use crate::oracle::price_feed::{PriceOracle, PriceQuote};
    use std::sync::Arc;

    struct FixedOracle(i128);

    impl PriceOracle for FixedOracle {
        fn latest_price(&self) -> Result<PriceQuote> {
            Ok(PriceQuote { price: self.0, is_fresh: true })
        }

        fn description(&self) -> String {
            "FIXED".into()
        }
    }

    const ETH_2000: i128 = 2_000_0000_0000;

    fn setup(price: i128) -> (CollateralRegistry, AssetId) {
        let weth: Arc<dyn CollateralToken> = Arc::new(InMemoryCollateral::new("WETH"));
        let asset = weth.asset_id();
        let registry = CollateralRegistry::new(vec![weth], vec![Arc::new(FixedOracle(price))]).unwrap();
        (registry, asset)
    }

    fn ether(n: u128) -> u128 {
        n * PRECISION
    }

    #[test]
    fn test_zero_debt_is_max() {
        let params = ProtocolParams::default();
        assert_eq!(calculate_health_factor(0, Wad::ZERO, &params).unwrap(), Wad::MAX);
        assert_eq!(
            calculate_health_factor(0, Wad::from_raw(ether(1)), &params).unwrap(),
            Wad::MAX
        );
    }

    #[test]
    fn test_health_factor_formula() {
        let params = ProtocolParams::default();
        // $20,000 collateral, $10,000 debt, 50% threshold
        let value = Wad::from_raw(ether(20_000));
        assert_eq!(calculate_health_factor(ether(10_000), value, &params).unwrap(), Wad::ONE);
        assert!(calculate_health_factor(ether(10_000) + 1, value, &params).unwrap() < Wad::ONE);
        // $150 collateral, $100 debt → 0.75
        assert_eq!(
            calculate_health_factor(ether(100), Wad::from_raw(ether(150)), &params)
                .unwrap()
                .raw(),
            750_000_000_000_000_000
        );
    }

    #[test]
    fn test_health_factor_saturates() {
        let params = ProtocolParams::default();
        assert_eq!(calculate_health_factor(1, Wad::from_raw(u128::MAX), &params).unwrap(), Wad::MAX);
    }

    #[test]
    fn test_usd_value_and_inverse() {
        let (registry, weth) = setup(ETH_2000);
        let params = ProtocolParams::default();
        let calc = HealthCalculator::new(&registry, &params);

        // 15 ETH * $2000 = $30,000
        assert_eq!(calc.usd_value(&weth, ether(15)).unwrap(), Wad::from_raw(ether(30_000)));
        // $100 / $2000 = 0.05 ETH
        assert_eq!(
            calc.token_amount_from_usd(&weth, Wad::from_raw(ether(100))).unwrap(),
            50_000_000_000_000_000
        );
    }

    #[test]
    fn test_overlay_health() {
        let (registry, weth) = setup(ETH_2000);
        let params = ProtocolParams::default();
        let calc = HealthCalculator::new(&registry, &params);
        let user = Address::from_label("user");

        let ledger = Ledger::new();
        let mut overlay = LedgerOverlay::new(&ledger, &registry);
        overlay.increase_collateral(user, weth, ether(10)).unwrap();
        overlay.increase_debt(user, ether(10_000)).unwrap();

        assert_eq!(calc.health_factor(&overlay, &user).unwrap(), Wad::ONE);
        assert!(calc.ensure_healthy(&overlay, &user).is_ok());
        assert!(!calc.is_liquidatable(&overlay, &user).unwrap());

        overlay.increase_debt(user, 1).unwrap();
        assert!(matches!(
            calc.ensure_healthy(&overlay, &user),
            Err(Error::BreaksHealthFactor { .. })
        ));

        let info = calc.account_information(&overlay, &user).unwrap();
        assert_eq!(info.total_debt, ether(10_000) + 1);
        assert_eq!(info.collateral_value_usd, Wad::from_raw(ether(20_000)));
    }

    #[test]
    fn test_debt_free_account_skips_pricing() {
        let (registry, weth) = setup(-1);
        let params = ProtocolParams::default();
        let calc = HealthCalculator::new(&registry, &params);
        let user = Address::from_label("user");

        let ledger = Ledger::new();
        let mut overlay = LedgerOverlay::new(&ledger, &registry);
        overlay.increase_collateral(user, weth, ether(1)).unwrap();

        assert_eq!(calc.health_factor(&overlay, &user).unwrap(), Wad::MAX);
        assert!(matches!(
            calc.collateral_value(&overlay, &user),
            Err(Error::InvalidPrice { .. })
        ));
    }
}
