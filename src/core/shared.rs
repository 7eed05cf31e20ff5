//! Shared handle to an engine.
//!
//! Collaborators that need to call back into the engine (a collateral token
//! with transfer hooks, for instance) hold a [`SharedEngine`]. Entry never
//! blocks: while an operation is in flight, any other entry fails with
//! [`Error::ReentrantCall`] and the in-flight operation is unaffected. The
//! host is expected to serialize independent callers.

use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use tracing::warn;

use crate::core::collateral::AssetId;
use crate::core::engine::{DscEngine, EngineSnapshot};
use crate::core::health::AccountInformation;
use crate::error::{Error, Result};
use crate::liquidation::LiquidationOutcome;
use crate::utils::address::Address;
use crate::utils::math::Wad;

/// Reentrancy-guarded engine handle
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<DscEngine>>,
}

impl SharedEngine {
    /// Wrap an engine
    pub fn new(engine: DscEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run `f` with exclusive access, failing instead of waiting
    pub fn with<R>(&self, f: impl FnOnce(&mut DscEngine) -> Result<R>) -> Result<R> {
        let mut engine = self.enter()?;
        f(&mut engine)
    }

    fn enter(&self) -> Result<MutexGuard<'_, DscEngine>> {
        match self.inner.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => {
                warn!("rejected reentrant call into the engine");
                Err(Error::ReentrantCall)
            }
            Err(TryLockError::Poisoned(_)) => Err(Error::Lock),
        }
    }

    /// See [`DscEngine::deposit_collateral`]
    pub fn deposit_collateral(&self, user: Address, asset: AssetId, amount: u128) -> Result<()> {
        self.with(|engine| engine.deposit_collateral(user, asset, amount))
    }

    /// See [`DscEngine::mint_dsc`]
    pub fn mint_dsc(&self, user: Address, amount: u128) -> Result<()> {
        self.with(|engine| engine.mint_dsc(user, amount))
    }

    /// See [`DscEngine::deposit_collateral_and_mint_dsc`]
    pub fn deposit_collateral_and_mint_dsc(
        &self,
        user: Address,
        asset: AssetId,
        collateral_amount: u128,
        dsc_amount: u128,
    ) -> Result<()> {
        self.with(|engine| {
            engine.deposit_collateral_and_mint_dsc(user, asset, collateral_amount, dsc_amount)
        })
    }

    /// See [`DscEngine::redeem_collateral`]
    pub fn redeem_collateral(&self, user: Address, asset: AssetId, amount: u128) -> Result<()> {
        self.with(|engine| engine.redeem_collateral(user, asset, amount))
    }

    /// See [`DscEngine::burn_dsc`]
    pub fn burn_dsc(&self, user: Address, amount: u128) -> Result<()> {
        self.with(|engine| engine.burn_dsc(user, amount))
    }

    /// See [`DscEngine::redeem_collateral_for_dsc`]
    pub fn redeem_collateral_for_dsc(
        &self,
        user: Address,
        asset: AssetId,
        collateral_amount: u128,
        dsc_amount: u128,
    ) -> Result<()> {
        self.with(|engine| engine.redeem_collateral_for_dsc(user, asset, collateral_amount, dsc_amount))
    }

    /// See [`DscEngine::liquidate`]
    pub fn liquidate(
        &self,
        liquidator: Address,
        asset: AssetId,
        user: Address,
        debt_to_cover: u128,
    ) -> Result<LiquidationOutcome> {
        self.with(|engine| engine.liquidate(liquidator, asset, user, debt_to_cover))
    }

    /// See [`DscEngine::health_factor`]
    pub fn health_factor(&self, user: &Address) -> Result<Wad> {
        self.with(|engine| engine.health_factor(user))
    }

    /// See [`DscEngine::account_information`]
    pub fn account_information(&self, user: &Address) -> Result<AccountInformation> {
        self.with(|engine| engine.account_information(user))
    }

    /// See [`DscEngine::snapshot`]
    pub fn snapshot(&self) -> Result<EngineSnapshot> {
        self.with(|engine| Ok(engine.snapshot()))
    }
}
