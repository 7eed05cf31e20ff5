//! The DSC engine.
//!
//! Owns the collateral and debt ledger and is the only party allowed to mint
//! and burn DSC. Every state-changing operation follows the same path:
//!
//! 1. admissibility checks (amount > 0, asset whitelisted)
//! 2. ledger changes staged on a [`LedgerOverlay`]
//! 3. health factor post-conditions evaluated against the overlay
//! 4. external transfers run as a [`Settlement`]
//! 5. staged changes committed and events published
//!
//! A failure at any step drops the overlay, so the committed ledger only ever
//! reflects operations that passed every check and settled.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::collateral::{AssetId, CollateralToken};
use crate::core::config::ProtocolParams;
use crate::core::health::{calculate_health_factor, AccountInformation, HealthCalculator};
use crate::core::ledger::{Ledger, LedgerOverlay, LedgerView, StagedChanges};
use crate::core::registry::CollateralRegistry;
use crate::core::settlement::{Settlement, SettlementContext, TransferStep};
use crate::core::token::StableToken;
use crate::error::{Error, Result};
use crate::events::EventLog;
use crate::oracle::price_feed::PriceOracle;
use crate::utils::address::Address;
use crate::utils::math::Wad;

// ═══════════════════════════════════════════════════════════════════════════════
// PENDING OPERATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Staged ledger changes plus the transfers that settle them
pub struct PendingOperation<'a> {
    overlay: LedgerOverlay<'a>,
    settlement: Settlement,
}

impl<'a> PendingOperation<'a> {
    /// Credit collateral and pull it from `user`
    pub fn deposit(&mut self, user: Address, asset: AssetId, amount: u128) -> Result<()> {
        self.overlay.increase_collateral(user, asset, amount)?;
        self.settlement.push(TransferStep::PullCollateral {
            asset,
            from: user,
            amount,
        });
        Ok(())
    }

    /// Record debt and mint it to `user`
    pub fn mint(&mut self, user: Address, amount: u128) -> Result<()> {
        self.overlay.increase_debt(user, amount)?;
        self.settlement.push(TransferStep::MintDsc { to: user, amount });
        Ok(())
    }

    /// Debit collateral of `from` and send it to `to`
    pub fn redeem(&mut self, from: Address, asset: AssetId, amount: u128, to: Address) -> Result<()> {
        // The push is queued from the overlay's outflows at commit
        self.overlay.decrease_collateral(from, asset, amount, to)
    }

    /// Reduce `on_behalf_of`'s debt, paid with DSC pulled from `payer`
    pub fn burn(&mut self, on_behalf_of: Address, payer: Address, amount: u128) -> Result<()> {
        self.overlay.decrease_debt(on_behalf_of, amount)?;
        self.settlement.push(TransferStep::BurnDsc { from: payer, amount });
        Ok(())
    }

    /// Staged balances
    pub fn view(&self) -> &LedgerOverlay<'a> {
        &self.overlay
    }

    /// Detach from the ledger
    pub fn into_parts(self) -> (StagedChanges, Settlement) {
        (self.overlay.into_changes(), self.settlement)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DSC ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Collateralized issuance engine
pub struct DscEngine {
    /// Address the engine holds collateral and DSC under
    address: Address,
    /// Whitelisted collateral
    registry: Arc<CollateralRegistry>,
    /// Stablecoin handle; the engine must own it
    dsc: Arc<dyn StableToken>,
    /// Risk parameters
    params: ProtocolParams,
    /// Committed balances
    ledger: Ledger,
    /// Published events
    events: EventLog,
}

impl fmt::Debug for DscEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DscEngine")
            .field("address", &self.address)
            .field("registry", &self.registry)
            .field("params", &self.params)
            .field("ledger", &self.ledger)
            .field("events", &self.events.len())
            .finish()
    }
}

impl DscEngine {
    /// Create an engine over an existing registry
    pub fn new(
        address: Address,
        registry: Arc<CollateralRegistry>,
        dsc: Arc<dyn StableToken>,
        params: ProtocolParams,
    ) -> Result<Self> {
        if address.is_zero() {
            return Err(Error::ZeroAddress);
        }
        params.validate()?;

        info!(
            "DSC engine {} created with {} collateral assets",
            address.short(),
            registry.assets().len()
        );

        Ok(Self {
            address,
            registry,
            dsc,
            params,
            ledger: Ledger::new(),
            events: EventLog::new(),
        })
    }

    /// Create an engine from parallel asset and oracle lists
    pub fn from_lists(
        address: Address,
        tokens: Vec<Arc<dyn CollateralToken>>,
        oracles: Vec<Arc<dyn PriceOracle>>,
        dsc: Arc<dyn StableToken>,
        params: ProtocolParams,
    ) -> Result<Self> {
        let registry = CollateralRegistry::new(tokens, oracles)?;
        Self::new(address, Arc::new(registry), dsc, params)
    }

    /// Rebuild an engine from a snapshot and live collaborators
    pub fn restore(
        snapshot: EngineSnapshot,
        registry: Arc<CollateralRegistry>,
        dsc: Arc<dyn StableToken>,
    ) -> Result<Self> {
        if snapshot.assets != registry.assets() {
            return Err(Error::InvalidParameter {
                name: "snapshot".into(),
                reason: "collateral assets do not match the registry".into(),
            });
        }
        let mut engine = Self::new(snapshot.address, registry, dsc, snapshot.params)?;
        engine.ledger = snapshot.ledger;
        engine.events = snapshot.events;
        Ok(engine)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposit collateral. Cannot lower any health factor, so no check runs.
    pub fn deposit_collateral(&mut self, user: Address, asset: AssetId, amount: u128) -> Result<()> {
        let mut pending = self.begin();
        pending.deposit(user, asset, amount)?;

        let (changes, settlement) = pending.into_parts();
        self.commit("deposit_collateral", changes, settlement)
    }

    /// Mint DSC against deposited collateral
    pub fn mint_dsc(&mut self, user: Address, amount: u128) -> Result<()> {
        let mut pending = self.begin();
        pending.mint(user, amount)?;
        self.health().ensure_healthy(pending.view(), &user)?;

        let (changes, settlement) = pending.into_parts();
        self.commit("mint_dsc", changes, settlement)
    }

    /// Deposit collateral and mint DSC with a single trailing check
    pub fn deposit_collateral_and_mint_dsc(
        &mut self,
        user: Address,
        asset: AssetId,
        collateral_amount: u128,
        dsc_amount: u128,
    ) -> Result<()> {
        let mut pending = self.begin();
        pending.deposit(user, asset, collateral_amount)?;
        pending.mint(user, dsc_amount)?;
        self.health().ensure_healthy(pending.view(), &user)?;

        let (changes, settlement) = pending.into_parts();
        self.commit("deposit_collateral_and_mint_dsc", changes, settlement)
    }

    /// Withdraw collateral back to `user`
    pub fn redeem_collateral(&mut self, user: Address, asset: AssetId, amount: u128) -> Result<()> {
        let mut pending = self.begin();
        pending.redeem(user, asset, amount, user)?;
        self.health().ensure_healthy(pending.view(), &user)?;

        let (changes, settlement) = pending.into_parts();
        self.commit("redeem_collateral", changes, settlement)
    }

    /// Repay debt with DSC held by `user`
    pub fn burn_dsc(&mut self, user: Address, amount: u128) -> Result<()> {
        let mut pending = self.begin();
        pending.burn(user, user, amount)?;
        self.health().ensure_healthy(pending.view(), &user)?;

        let (changes, settlement) = pending.into_parts();
        self.commit("burn_dsc", changes, settlement)
    }

    /// Repay debt and withdraw collateral with a single trailing check
    pub fn redeem_collateral_for_dsc(
        &mut self,
        user: Address,
        asset: AssetId,
        collateral_amount: u128,
        dsc_amount: u128,
    ) -> Result<()> {
        let mut pending = self.begin();
        pending.burn(user, user, dsc_amount)?;
        pending.redeem(user, asset, collateral_amount, user)?;
        self.health().ensure_healthy(pending.view(), &user)?;

        let (changes, settlement) = pending.into_parts();
        self.commit("redeem_collateral_for_dsc", changes, settlement)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STAGING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Start staging an operation against the committed ledger
    pub(crate) fn begin(&self) -> PendingOperation<'_> {
        PendingOperation {
            overlay: LedgerOverlay::new(&self.ledger, &self.registry),
            settlement: Settlement::new(),
        }
    }

    /// Settle externally, then apply staged changes
    pub(crate) fn commit(
        &mut self,
        operation: &str,
        changes: StagedChanges,
        mut settlement: Settlement,
    ) -> Result<()> {
        settlement.push_outflows(&changes.outflows);

        let ctx = SettlementContext {
            engine: self.address,
            registry: &self.registry,
            dsc: self.dsc.as_ref(),
        };
        if let Err(e) = settlement.execute(&ctx) {
            warn!("{} aborted during settlement: {}", operation, e);
            return Err(e);
        }

        self.ledger.apply(&changes);
        self.events.extend(changes.events.iter().copied());

        info!(
            "{} committed ({} transfers, {} events)",
            operation,
            settlement.len(),
            changes.events.len()
        );
        Ok(())
    }

    pub(crate) fn health(&self) -> HealthCalculator<'_> {
        HealthCalculator::new(&self.registry, &self.params)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACCOUNT VIEWS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Current health factor of `user`
    pub fn health_factor(&self, user: &Address) -> Result<Wad> {
        self.health().health_factor(&self.ledger, user)
    }

    /// Health factor for arbitrary debt and collateral value
    pub fn calculate_health_factor(&self, total_debt: u128, collateral_value_usd: Wad) -> Result<Wad> {
        calculate_health_factor(total_debt, collateral_value_usd, &self.params)
    }

    /// Debt and collateral value of `user`
    pub fn account_information(&self, user: &Address) -> Result<AccountInformation> {
        self.health().account_information(&self.ledger, user)
    }

    /// USD value of all of `user`'s collateral
    pub fn account_collateral_value(&self, user: &Address) -> Result<Wad> {
        self.health().collateral_value(&self.ledger, user)
    }

    /// USD value of `amount` units of `asset`
    pub fn usd_value(&self, asset: &AssetId, amount: u128) -> Result<Wad> {
        self.health().usd_value(asset, amount)
    }

    /// Units of `asset` worth `usd_amount`
    pub fn token_amount_from_usd(&self, asset: &AssetId, usd_amount: Wad) -> Result<u128> {
        self.health().token_amount_from_usd(asset, usd_amount)
    }

    /// Collateral of `user` in `asset`
    pub fn collateral_balance_of(&self, user: &Address, asset: &AssetId) -> u128 {
        self.ledger.collateral_of(user, asset)
    }

    /// Debt of `user`
    pub fn debt_of(&self, user: &Address) -> u128 {
        self.ledger.debt_of(user)
    }

    /// Accounts below the minimum health factor, worst first.
    ///
    /// Accounts holding an asset whose price cannot be read are skipped with a
    /// warning; they cannot be liquidated until the feed recovers anyway.
    pub fn liquidatable_accounts(&self) -> Result<Vec<(Address, Wad)>> {
        let health = self.health();
        let mut accounts = Vec::new();
        for user in self.ledger.accounts() {
            let factor = match health.health_factor(&self.ledger, &user) {
                Ok(factor) => factor,
                Err(e @ (Error::StalePrice(_) | Error::InvalidPrice { .. })) => {
                    warn!("skipping {} in liquidation scan: {}", user.short(), e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if factor.raw() < self.params.min_health_factor {
                accounts.push((user, factor));
            }
        }
        accounts.sort_by_key(|(_, factor)| *factor);
        Ok(accounts)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PROTOCOL VIEWS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Engine address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Whitelisted assets in registration order
    pub fn collateral_assets(&self) -> Vec<AssetId> {
        self.registry.assets()
    }

    /// Price oracle of `asset`
    pub fn price_oracle(&self, asset: &AssetId) -> Result<Arc<dyn PriceOracle>> {
        self.registry.oracle(asset)
    }

    /// Collateral registry
    pub fn registry(&self) -> &Arc<CollateralRegistry> {
        &self.registry
    }

    /// Stablecoin handle
    pub fn dsc(&self) -> &Arc<dyn StableToken> {
        &self.dsc
    }

    /// Risk parameters
    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    /// Committed ledger
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Published events
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Sum of all debt
    pub fn total_debt(&self) -> Result<u128> {
        self.ledger.total_debt()
    }

    /// USD value of all collateral held by the engine
    pub fn protocol_collateral_value(&self) -> Result<Wad> {
        let health = self.health();
        let mut total = Wad::ZERO;
        for asset in self.registry.assets() {
            let amount = self.ledger.total_collateral(&asset)?;
            if amount == 0 {
                continue;
            }
            total = total.checked_add(health.usd_value(&asset, amount)?)?;
        }
        Ok(total)
    }

    /// DSC supply equals recorded debt
    pub fn verify_conservation(&self) -> Result<bool> {
        Ok(self.dsc.total_supply()? == self.ledger.total_debt()?)
    }

    /// Collateral value covers DSC supply
    pub fn is_protocol_solvent(&self) -> Result<bool> {
        Ok(self.protocol_collateral_value()?.raw() >= self.dsc.total_supply()?)
    }

    /// Capture committed state
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            address: self.address,
            params: self.params.clone(),
            assets: self.registry.assets(),
            ledger: self.ledger.clone(),
            events: self.events.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SNAPSHOT
// ═══════════════════════════════════════════════════════════════════════════════

/// Serializable copy of an engine's committed state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Engine address
    pub address: Address,
    /// Risk parameters
    pub params: ProtocolParams,
    /// Whitelisted assets in registration order
    pub assets: Vec<AssetId>,
    /// Balances
    pub ledger: Ledger,
    /// Retained events
    pub events: EventLog,
}

impl EngineSnapshot {
    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}
