//! External value transfers of an operation.
//!
//! A [`Settlement`] is the ordered list of token movements an operation needs
//! once its ledger changes have been staged and checked. Steps run in two
//! groups: inbound steps (pulling collateral in, pulling and burning DSC)
//! before outbound steps (pushing collateral out, minting DSC). Each completed
//! step is journaled; when a later step fails, the journal is unwound in
//! reverse so the collaborators end where they started, allowances included.
//!
//! Only inbound steps can be compensated, so a settlement holds at most one
//! outbound step and it runs last.

use tracing::{error, warn};

use crate::core::collateral::AssetId;
use crate::core::ledger::CollateralOutflow;
use crate::core::registry::CollateralRegistry;
use crate::core::token::StableToken;
use crate::error::{Error, Result};
use crate::utils::address::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFER STEP
// ═══════════════════════════════════════════════════════════════════════════════

/// One external token movement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStep {
    /// Pull collateral from `from` into the engine
    PullCollateral {
        /// Asset pulled
        asset: AssetId,
        /// Owner of the tokens
        from: Address,
        /// Amount pulled
        amount: u128,
    },

    /// Push collateral held by the engine to `to`
    PushCollateral {
        /// Asset pushed
        asset: AssetId,
        /// Recipient
        to: Address,
        /// Amount pushed
        amount: u128,
    },

    /// Pull DSC from `from` and destroy it
    BurnDsc {
        /// Payer
        from: Address,
        /// Amount burned
        amount: u128,
    },

    /// Issue new DSC to `to`
    MintDsc {
        /// Recipient
        to: Address,
        /// Amount minted
        amount: u128,
    },
}

impl TransferStep {
    /// Steps that move value into the engine
    pub fn is_inbound(&self) -> bool {
        matches!(self, TransferStep::PullCollateral { .. } | TransferStep::BurnDsc { .. })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SETTLEMENT CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Collaborators a settlement runs against
#[derive(Clone, Copy)]
pub struct SettlementContext<'a> {
    /// Address the engine acts as
    pub engine: Address,
    /// Collateral transfer handles
    pub registry: &'a CollateralRegistry,
    /// Stablecoin handle
    pub dsc: &'a dyn StableToken,
}

impl<'a> SettlementContext<'a> {
    /// Perform one step
    pub fn apply(&self, step: &TransferStep) -> Result<()> {
        match *step {
            TransferStep::PullCollateral { asset, from, amount } => {
                let token = self.registry.token(&asset)?;
                if !token.transfer_from(self.engine, from, self.engine, amount)? {
                    return Err(Error::TransferFailed(format!(
                        "pull {} {} from {}",
                        amount,
                        token.symbol(),
                        from.short()
                    )));
                }
            }
            TransferStep::PushCollateral { asset, to, amount } => {
                let token = self.registry.token(&asset)?;
                if !token.transfer(self.engine, to, amount)? {
                    return Err(Error::TransferFailed(format!(
                        "push {} {} to {}",
                        amount,
                        token.symbol(),
                        to.short()
                    )));
                }
            }
            TransferStep::BurnDsc { from, amount } => {
                if !self.dsc.transfer_from(self.engine, from, self.engine, amount)? {
                    return Err(Error::TransferFailed(format!(
                        "pull {} DSC from {}",
                        amount,
                        from.short()
                    )));
                }
                if let Err(e) = self.dsc.burn(self.engine, amount) {
                    // The pull succeeded; hand the tokens back before failing
                    if !matches!(self.dsc.refund(self.engine, from, amount), Ok(true)) {
                        error!("could not return {} DSC to {} after failed burn", amount, from.short());
                        return Err(Error::InvariantViolation(format!(
                            "DSC pulled from {} stranded after failed burn",
                            from.short()
                        )));
                    }
                    return Err(e);
                }
            }
            TransferStep::MintDsc { to, amount } => {
                if !self.dsc.mint(self.engine, to, amount)? {
                    return Err(Error::MintFailed(format!("{} DSC to {}", amount, to.short())));
                }
            }
        }
        Ok(())
    }

    /// Undo a completed inbound step, restoring the allowance it spent
    pub fn compensate(&self, step: &TransferStep) -> Result<()> {
        match *step {
            TransferStep::PullCollateral { asset, from, amount } => {
                let token = self.registry.token(&asset)?;
                if !token.refund(self.engine, from, amount)? {
                    return Err(Error::TransferFailed(format!(
                        "refund {} {} to {}",
                        amount,
                        token.symbol(),
                        from.short()
                    )));
                }
            }
            TransferStep::BurnDsc { from, amount } => {
                if !self.dsc.mint(self.engine, self.engine, amount)? {
                    return Err(Error::MintFailed(format!("{} DSC to re-issue", amount)));
                }
                if !self.dsc.refund(self.engine, from, amount)? {
                    return Err(Error::TransferFailed(format!(
                        "refund {} DSC to {}",
                        amount,
                        from.short()
                    )));
                }
            }
            TransferStep::PushCollateral { .. } | TransferStep::MintDsc { .. } => {
                return Err(Error::InvariantViolation(format!(
                    "no compensation for {:?}",
                    step
                )));
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SETTLEMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordered external transfers with compensation on failure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settlement {
    steps: Vec<TransferStep>,
}

impl Settlement {
    /// Create an empty settlement
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a step
    pub fn push(&mut self, step: TransferStep) {
        self.steps.push(step);
    }

    /// Queue a push for every staged collateral outflow
    pub fn push_outflows(&mut self, outflows: &[CollateralOutflow]) {
        for outflow in outflows {
            self.push(TransferStep::PushCollateral {
                asset: outflow.asset,
                to: outflow.to,
                amount: outflow.amount,
            });
        }
    }

    /// Steps in execution order: inbound first, otherwise as queued
    pub fn ordered_steps(&self) -> Vec<TransferStep> {
        let mut steps = self.steps.clone();
        steps.sort_by_key(|step| !step.is_inbound());
        steps
    }

    /// Number of queued steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step, unwinding completed ones if any step fails
    pub fn execute(&self, ctx: &SettlementContext<'_>) -> Result<()> {
        let outbound = self.steps.iter().filter(|step| !step.is_inbound()).count();
        if outbound > 1 {
            return Err(Error::InvariantViolation(format!(
                "{} outbound steps in one settlement",
                outbound
            )));
        }

        let mut journal: Vec<TransferStep> = Vec::with_capacity(self.steps.len());

        for step in self.ordered_steps() {
            if let Err(e) = ctx.apply(&step) {
                warn!("settlement step {:?} failed: {}", step, e);
                Self::unwind(ctx, &journal)?;
                return Err(e);
            }
            journal.push(step);
        }

        Ok(())
    }

    fn unwind(ctx: &SettlementContext<'_>, journal: &[TransferStep]) -> Result<()> {
        for step in journal.iter().rev() {
            if let Err(e) = ctx.compensate(step) {
                error!("compensation of {:?} failed: {}", step, e);
                return Err(Error::InvariantViolation(format!(
                    "compensation of {:?} failed: {}",
                    step, e
                )));
            }
        }
        Ok(())
    }
}
