//! Collateral and debt ledger.
//!
//! The [`Ledger`] is the committed record of every account's collateral and
//! debt. Operations never write to it directly: they stage changes in a
//! [`LedgerOverlay`], run their checks against the overlay, and hand the
//! resulting [`StagedChanges`] back to the engine, which applies them only
//! once external settlement succeeded. Dropping an overlay discards it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::collateral::AssetId;
use crate::core::registry::CollateralRegistry;
use crate::error::{Error, Result};
use crate::events::EngineEvent;
use crate::utils::address::Address;
use crate::utils::math::{safe_add, safe_sub};

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER VIEW
// ═══════════════════════════════════════════════════════════════════════════════

/// Read access to balances, committed or staged
pub trait LedgerView {
    /// Collateral of `user` in `asset`
    fn collateral_of(&self, user: &Address, asset: &AssetId) -> u128;

    /// Debt of `user`
    fn debt_of(&self, user: &Address) -> u128;
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Committed balances of every account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    collateral: HashMap<Address, HashMap<AssetId, u128>>,
    debt: HashMap<Address, u128>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts that ever held collateral or debt
    pub fn accounts(&self) -> Vec<Address> {
        let mut accounts: Vec<Address> = self
            .collateral
            .keys()
            .chain(self.debt.keys())
            .copied()
            .collect();
        accounts.sort();
        accounts.dedup();
        accounts
    }

    /// Sum of all recorded debt
    pub fn total_debt(&self) -> Result<u128> {
        self.debt
            .values()
            .try_fold(0u128, |acc, d| safe_add(acc, *d, "total debt"))
    }

    /// Sum of all recorded collateral of one asset
    pub fn total_collateral(&self, asset: &AssetId) -> Result<u128> {
        self.collateral
            .values()
            .filter_map(|assets| assets.get(asset))
            .try_fold(0u128, |acc, a| safe_add(acc, *a, "total collateral"))
    }

    /// Apply staged balances. Entries are absolute values, not deltas.
    pub fn apply(&mut self, changes: &StagedChanges) {
        for ((user, asset), amount) in &changes.collateral {
            self.collateral.entry(*user).or_default().insert(*asset, *amount);
        }
        for (user, amount) in &changes.debt {
            self.debt.insert(*user, *amount);
        }
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

impl LedgerView for Ledger {
    fn collateral_of(&self, user: &Address, asset: &AssetId) -> u128 {
        self.collateral
            .get(user)
            .and_then(|assets| assets.get(asset))
            .copied()
            .unwrap_or(0)
    }

    fn debt_of(&self, user: &Address) -> u128 {
        self.debt.get(user).copied().unwrap_or(0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STAGED CHANGES
// ═══════════════════════════════════════════════════════════════════════════════

/// Collateral leaving the engine as a result of a decrease
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollateralOutflow {
    /// Asset moved
    pub asset: AssetId,
    /// Account whose balance was decreased
    pub from: Address,
    /// Recipient of the transfer
    pub to: Address,
    /// Amount moved
    pub amount: u128,
}

/// Everything an overlay recorded, detached from the ledger it borrowed
#[derive(Debug, Clone, Default)]
pub struct StagedChanges {
    /// New absolute collateral balances
    pub collateral: HashMap<(Address, AssetId), u128>,
    /// New absolute debt balances
    pub debt: HashMap<Address, u128>,
    /// Collateral to push out, in staging order
    pub outflows: Vec<CollateralOutflow>,
    /// Events to publish on commit
    pub events: Vec<EngineEvent>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER OVERLAY
// ═══════════════════════════════════════════════════════════════════════════════

/// Transient copy-on-write view over a [`Ledger`]
#[derive(Debug)]
pub struct LedgerOverlay<'a> {
    base: &'a Ledger,
    registry: &'a CollateralRegistry,
    staged: StagedChanges,
}

impl<'a> LedgerOverlay<'a> {
    /// Start staging on top of `base`
    pub fn new(base: &'a Ledger, registry: &'a CollateralRegistry) -> Self {
        Self {
            base,
            registry,
            staged: StagedChanges::default(),
        }
    }

    /// Credit collateral deposited by `user`
    pub fn increase_collateral(&mut self, user: Address, asset: AssetId, amount: u128) -> Result<()> {
        self.admit(&asset, amount)?;

        let balance = safe_add(self.collateral_of(&user, &asset), amount, "increase collateral")?;
        self.staged.collateral.insert((user, asset), balance);
        self.staged
            .events
            .push(EngineEvent::CollateralDeposited { user, asset, amount });
        Ok(())
    }

    /// Debit collateral of `from` and route it to `to`.
    ///
    /// `from` and `to` differ when a liquidator seizes a position.
    pub fn decrease_collateral(
        &mut self,
        from: Address,
        asset: AssetId,
        amount: u128,
        to: Address,
    ) -> Result<()> {
        self.admit(&asset, amount)?;

        let available = self.collateral_of(&from, &asset);
        if available < amount {
            return Err(Error::InsufficientCollateral {
                requested: amount,
                available,
            });
        }

        self.staged.collateral.insert((from, asset), available - amount);
        self.staged.outflows.push(CollateralOutflow {
            asset,
            from,
            to,
            amount,
        });
        self.staged.events.push(EngineEvent::CollateralRedeemed {
            from,
            to,
            asset,
            amount,
        });
        Ok(())
    }

    /// Record newly minted debt
    pub fn increase_debt(&mut self, user: Address, amount: u128) -> Result<()> {
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }
        let debt = safe_add(self.debt_of(&user), amount, "increase debt")?;
        self.staged.debt.insert(user, debt);
        Ok(())
    }

    /// Record repaid debt
    pub fn decrease_debt(&mut self, user: Address, amount: u128) -> Result<()> {
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }
        let outstanding = self.debt_of(&user);
        if outstanding < amount {
            return Err(Error::InsufficientDebt {
                requested: amount,
                outstanding,
            });
        }
        let debt = safe_sub(outstanding, amount, "decrease debt")?;
        self.staged.debt.insert(user, debt);
        Ok(())
    }

    /// Detach the staged changes
    pub fn into_changes(self) -> StagedChanges {
        self.staged
    }

    fn admit(&self, asset: &AssetId, amount: u128) -> Result<()> {
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }
        if !self.registry.is_allowed(asset) {
            return Err(Error::AssetNotAllowed(asset.to_hex()));
        }
        Ok(())
    }
}

impl LedgerView for LedgerOverlay<'_> {
    fn collateral_of(&self, user: &Address, asset: &AssetId) -> u128 {
        self.staged
            .collateral
            .get(&(*user, *asset))
            .copied()
            .unwrap_or_else(|| self.base.collateral_of(user, asset))
    }

    fn debt_of(&self, user: &Address) -> u128 {
        self.staged
            .debt
            .get(user)
            .copied()
            .unwrap_or_else(|| self.base.debt_of(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collateral::{CollateralToken, InMemoryCollateral};
    use crate::oracle::price_feed::{PriceOracle, PriceQuote};
    use std::sync::Arc;

    struct NoOracle;

    impl PriceOracle for NoOracle {
        fn latest_price(&self) -> Result<PriceQuote> {
            Ok(PriceQuote { price: 1, is_fresh: true })
        }

        fn description(&self) -> String {
            "NONE".into()
        }
    }

    fn registry() -> (CollateralRegistry, AssetId) {
        let weth: Arc<dyn CollateralToken> = Arc::new(InMemoryCollateral::new("WETH"));
        let asset = weth.asset_id();
        let registry = CollateralRegistry::new(vec![weth], vec![Arc::new(NoOracle)]).unwrap();
        (registry, asset)
    }

    fn user() -> Address {
        Address::from_label("user")
    }

    #[test]
    fn test_overlay_reads_through_and_commits() {
        let (registry, weth) = registry();
        let mut ledger = Ledger::new();

        let changes = {
            let mut overlay = LedgerOverlay::new(&ledger, &registry);
            overlay.increase_collateral(user(), weth, 10).unwrap();
            overlay.increase_debt(user(), 4).unwrap();
            assert_eq!(overlay.collateral_of(&user(), &weth), 10);
            assert_eq!(overlay.debt_of(&user()), 4);
            overlay.into_changes()
        };

        // Nothing visible until applied
        assert_eq!(ledger.collateral_of(&user(), &weth), 0);

        ledger.apply(&changes);
        assert_eq!(ledger.collateral_of(&user(), &weth), 10);
        assert_eq!(ledger.debt_of(&user()), 4);
        assert_eq!(changes.events.len(), 1);
    }

    #[test]
    fn test_dropped_overlay_leaves_ledger_untouched() {
        let (registry, weth) = registry();
        let ledger = Ledger::new();
        {
            let mut overlay = LedgerOverlay::new(&ledger, &registry);
            overlay.increase_collateral(user(), weth, 10).unwrap();
        }
        assert_eq!(ledger, Ledger::new());
    }

    #[test]
    fn test_admissibility() {
        let (registry, weth) = registry();
        let ledger = Ledger::new();
        let mut overlay = LedgerOverlay::new(&ledger, &registry);

        assert_eq!(overlay.increase_collateral(user(), weth, 0), Err(Error::ZeroAmount));
        assert!(matches!(
            overlay.increase_collateral(user(), Address::from_label("junk"), 1),
            Err(Error::AssetNotAllowed(_))
        ));
        assert_eq!(overlay.increase_debt(user(), 0), Err(Error::ZeroAmount));
        assert!(overlay.into_changes().collateral.is_empty());
    }

    #[test]
    fn test_no_negative_balances() {
        let (registry, weth) = registry();
        let ledger = Ledger::new();
        let mut overlay = LedgerOverlay::new(&ledger, &registry);
        overlay.increase_collateral(user(), weth, 5).unwrap();
        overlay.increase_debt(user(), 3).unwrap();

        assert_eq!(
            overlay.decrease_collateral(user(), weth, 6, user()),
            Err(Error::InsufficientCollateral { requested: 6, available: 5 })
        );
        assert_eq!(
            overlay.decrease_debt(user(), 4),
            Err(Error::InsufficientDebt { requested: 4, outstanding: 3 })
        );
        assert_eq!(overlay.collateral_of(&user(), &weth), 5);
        assert_eq!(overlay.debt_of(&user()), 3);
    }

    #[test]
    fn test_decrease_records_outflow() {
        let (registry, weth) = registry();
        let mut ledger = Ledger::new();
        let liquidator = Address::from_label("liquidator");

        let deposit = {
            let mut overlay = LedgerOverlay::new(&ledger, &registry);
            overlay.increase_collateral(user(), weth, 5).unwrap();
            overlay.into_changes()
        };
        ledger.apply(&deposit);

        let mut overlay = LedgerOverlay::new(&ledger, &registry);
        overlay.decrease_collateral(user(), weth, 2, liquidator).unwrap();
        let changes = overlay.into_changes();

        assert_eq!(
            changes.outflows,
            vec![CollateralOutflow { asset: weth, from: user(), to: liquidator, amount: 2 }]
        );
        assert!(changes.events[0].is_liquidation());
    }

    #[test]
    fn test_totals_and_bytes() {
        let (registry, weth) = registry();
        let mut ledger = Ledger::new();
        let other = Address::from_label("other");

        let changes = {
            let mut overlay = LedgerOverlay::new(&ledger, &registry);
            overlay.increase_collateral(user(), weth, 5).unwrap();
            overlay.increase_collateral(other, weth, 7).unwrap();
            overlay.increase_debt(user(), 2).unwrap();
            overlay.increase_debt(other, 3).unwrap();
            overlay.into_changes()
        };
        ledger.apply(&changes);

        assert_eq!(ledger.total_collateral(&weth).unwrap(), 12);
        assert_eq!(ledger.total_debt().unwrap(), 5);
        assert_eq!(ledger.accounts().len(), 2);

        let restored = Ledger::from_bytes(&ledger.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, ledger);
    }
}
