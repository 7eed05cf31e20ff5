//! Scenario execution.
//!
//! Builds an engine over in-memory collateral tokens, manual price feeds and a
//! manual clock, replays every step, and summarizes the final state.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::collateral::{AssetId, CollateralToken, InMemoryCollateral};
use crate::core::config::ProtocolParams;
use crate::core::engine::DscEngine;
use crate::core::token::{DscToken, StableToken};
use crate::error::{Error, Result};
use crate::oracle::price_feed::{ManualAggregator, PriceOracle};
use crate::oracle::staleness::{Clock, ManualClock, StaleCheckedOracle};
use crate::sim::scenario::{parse_amount, parse_price, Action, Scenario};
use crate::utils::address::Address;
use crate::utils::math::Wad;

/// Label the simulated engine's address is derived from
pub const ENGINE_LABEL: &str = "dsc-engine";

// ═══════════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepResult {
    /// The step committed
    Ok,
    /// The step was rejected
    Err {
        /// Error code
        code: u32,
        /// Error message
        message: String,
    },
}

/// Outcome of one step against its expectation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Position in the scenario, from 1
    pub index: usize,
    /// Human readable action
    pub label: String,
    /// What happened
    pub result: StepResult,
    /// Whether the result matched `expect_error`
    pub expectation_met: bool,
}

/// Final position of one named account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountReport {
    /// Scenario name of the account
    pub name: String,
    /// Derived address
    pub address: Address,
    /// Collateral per asset symbol
    pub collateral: BTreeMap<String, String>,
    /// Debt
    pub debt: String,
    /// USD value of the collateral, or the pricing error
    pub collateral_value: String,
    /// Health factor, or the pricing error
    pub health_factor: String,
    /// DSC wallet balance
    pub dsc_balance: String,
}

/// Summary of a replayed scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Scenario name
    pub scenario: String,
    /// Per-step outcomes
    pub steps: Vec<StepOutcome>,
    /// Named accounts, sorted by name
    pub accounts: Vec<AccountReport>,
    /// Sum of recorded debt
    pub total_debt: String,
    /// DSC supply
    pub dsc_supply: String,
    /// DSC supply equals recorded debt
    pub conservation_holds: bool,
    /// Collateral value covers DSC supply; `None` if a price was unavailable
    pub solvent: Option<bool>,
    /// Liquidation seizures recorded
    pub liquidations: u64,
}

impl SimulationReport {
    /// Every expectation met and supply matches debt
    pub fn passed(&self) -> bool {
        self.conservation_holds && self.steps.iter().all(|s| s.expectation_met)
    }

    /// Steps whose result contradicted the scenario
    pub fn failures(&self) -> Vec<&StepOutcome> {
        self.steps.iter().filter(|s| !s.expectation_met).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIMULATION
// ═══════════════════════════════════════════════════════════════════════════════

struct SimAsset {
    token: Arc<InMemoryCollateral>,
    feed: Arc<ManualAggregator>,
}

/// An engine wired to in-memory collaborators
pub struct Simulation {
    engine: DscEngine,
    dsc: Arc<DscToken>,
    clock: Arc<ManualClock>,
    assets: HashMap<String, SimAsset>,
    symbols: Vec<String>,
    accounts: BTreeMap<String, Address>,
}

impl Simulation {
    /// Build the engine and feeds declared by `scenario`
    pub fn new(scenario: &Scenario, params: ProtocolParams) -> Result<Self> {
        scenario.validate()?;

        let address = Address::from_label(ENGINE_LABEL);
        let clock = Arc::new(ManualClock::new(scenario.start_time));
        let dsc = Arc::new(DscToken::new(address));

        let mut assets = HashMap::new();
        let mut symbols = Vec::new();
        let mut tokens: Vec<Arc<dyn CollateralToken>> = Vec::new();
        let mut oracles: Vec<Arc<dyn PriceOracle>> = Vec::new();

        for spec in &scenario.assets {
            let token = Arc::new(InMemoryCollateral::new(spec.symbol.as_str()));
            let feed = Arc::new(ManualAggregator::new(
                format!("{} / USD", spec.symbol),
                parse_price(&spec.price)?,
                scenario.start_time,
            ));
            let oracle = StaleCheckedOracle::with_timeout(
                feed.clone(),
                clock.clone(),
                params.oracle_timeout_secs,
            )?;

            tokens.push(token.clone());
            oracles.push(Arc::new(oracle));
            symbols.push(spec.symbol.clone());
            assets.insert(spec.symbol.clone(), SimAsset { token, feed });
        }

        let engine = DscEngine::from_lists(address, tokens, oracles, dsc.clone(), params)?;

        Ok(Self {
            engine,
            dsc,
            clock,
            assets,
            symbols,
            accounts: BTreeMap::new(),
        })
    }

    /// The engine under simulation
    pub fn engine(&self) -> &DscEngine {
        &self.engine
    }

    /// Address of a named account, registering it on first use
    pub fn account(&mut self, name: &str) -> Address {
        *self
            .accounts
            .entry(name.to_string())
            .or_insert_with(|| Address::from_label(name))
    }

    /// Asset id of a symbol
    pub fn asset_id(&self, symbol: &str) -> Result<AssetId> {
        Ok(self.asset(symbol)?.token.asset_id())
    }

    fn asset(&self, symbol: &str) -> Result<&SimAsset> {
        self.assets
            .get(symbol)
            .ok_or_else(|| Error::AssetNotAllowed(symbol.to_string()))
    }

    /// Perform one action
    pub fn apply(&mut self, action: &Action) -> Result<()> {
        let engine_address = self.engine.address();

        match action {
            Action::Fund { account, asset, amount } => {
                let to = self.account(account);
                self.asset(asset)?.token.mint_to(to, parse_amount(amount)?)
            }
            Action::SetPrice { asset, price } => {
                let now = self.clock.now();
                self.asset(asset)?.feed.update_answer(parse_price(price)?, now)
            }
            Action::AdvanceTime { secs } => {
                self.clock.advance(*secs);
                Ok(())
            }
            Action::Deposit { account, asset, amount } => {
                let user = self.account(account);
                let amount = parse_amount(amount)?;
                let sim_asset = self.asset(asset)?;
                sim_asset.token.approve(user, engine_address, amount)?;
                let id = sim_asset.token.asset_id();
                self.engine.deposit_collateral(user, id, amount)
            }
            Action::Mint { account, amount } => {
                let user = self.account(account);
                self.engine.mint_dsc(user, parse_amount(amount)?)
            }
            Action::DepositAndMint { account, asset, collateral, dsc } => {
                let user = self.account(account);
                let collateral = parse_amount(collateral)?;
                let sim_asset = self.asset(asset)?;
                sim_asset.token.approve(user, engine_address, collateral)?;
                let id = sim_asset.token.asset_id();
                self.engine
                    .deposit_collateral_and_mint_dsc(user, id, collateral, parse_amount(dsc)?)
            }
            Action::Redeem { account, asset, amount } => {
                let user = self.account(account);
                let id = self.asset_id(asset)?;
                self.engine.redeem_collateral(user, id, parse_amount(amount)?)
            }
            Action::Burn { account, amount } => {
                let user = self.account(account);
                self.engine.burn_dsc(user, parse_amount(amount)?)
            }
            Action::RedeemForDsc { account, asset, collateral, dsc } => {
                let user = self.account(account);
                let id = self.asset_id(asset)?;
                self.engine.redeem_collateral_for_dsc(
                    user,
                    id,
                    parse_amount(collateral)?,
                    parse_amount(dsc)?,
                )
            }
            Action::Liquidate { liquidator, asset, user, debt_to_cover } => {
                let liquidator = self.account(liquidator);
                let user = self.account(user);
                let id = self.asset_id(asset)?;
                self.engine
                    .liquidate(liquidator, id, user, parse_amount(debt_to_cover)?)
                    .map(|_| ())
            }
            Action::ApproveDsc { account, amount } => {
                let owner = self.account(account);
                self.dsc.approve(owner, engine_address, parse_amount(amount)?).map(|_| ())
            }
            Action::TransferDsc { from, to, amount } => {
                let from = self.account(from);
                let to = self.account(to);
                self.dsc.transfer(from, to, parse_amount(amount)?).map(|_| ())
            }
        }
    }

    /// Summarize the current state
    pub fn report(&self, scenario: &str, steps: Vec<StepOutcome>) -> Result<SimulationReport> {
        let mut accounts = Vec::with_capacity(self.accounts.len());
        for (name, address) in &self.accounts {
            let mut collateral = BTreeMap::new();
            for symbol in &self.symbols {
                let id = self.asset_id(symbol)?;
                let amount = self.engine.collateral_balance_of(address, &id);
                if amount > 0 {
                    collateral.insert(symbol.clone(), Wad::from_raw(amount).to_string());
                }
            }

            accounts.push(AccountReport {
                name: name.clone(),
                address: *address,
                collateral,
                debt: Wad::from_raw(self.engine.debt_of(address)).to_string(),
                collateral_value: render(self.engine.account_collateral_value(address)),
                health_factor: render(self.engine.health_factor(address)),
                dsc_balance: Wad::from_raw(self.dsc.balance_of(address)?).to_string(),
            });
        }

        Ok(SimulationReport {
            scenario: scenario.to_string(),
            steps,
            accounts,
            total_debt: Wad::from_raw(self.engine.total_debt()?).to_string(),
            dsc_supply: Wad::from_raw(self.dsc.total_supply()?).to_string(),
            conservation_holds: self.engine.verify_conservation()?,
            solvent: self.engine.is_protocol_solvent().ok(),
            liquidations: self.engine.liquidation_statistics().liquidations,
        })
    }
}

fn render(value: Result<Wad>) -> String {
    match value {
        Ok(v) => v.to_string(),
        Err(e) => format!("error: {}", e),
    }
}

fn expectation_met(expect_error: Option<&str>, result: &Result<()>) -> bool {
    match (expect_error, result) {
        (None, Ok(())) => true,
        (None, Err(_)) | (Some(_), Ok(())) => false,
        (Some(pattern), Err(e)) => {
            pattern.is_empty() || e.to_string().to_lowercase().contains(&pattern.to_lowercase())
        }
    }
}

/// Replay `scenario` against a fresh engine
pub fn run(scenario: &Scenario, params: ProtocolParams) -> Result<SimulationReport> {
    let mut sim = Simulation::new(scenario, params)?;
    let mut outcomes = Vec::with_capacity(scenario.steps.len());

    for (i, step) in scenario.steps.iter().enumerate() {
        let result = sim.apply(&step.action);
        let met = expectation_met(step.expect_error.as_deref(), &result);
        debug!("step {} ({}): {:?}", i + 1, step.action.label(), result);

        outcomes.push(StepOutcome {
            index: i + 1,
            label: step.action.label(),
            result: match result {
                Ok(()) => StepResult::Ok,
                Err(e) => StepResult::Err {
                    code: e.code(),
                    message: e.to_string(),
                },
            },
            expectation_met: met,
        });
    }

    let report = sim.report(&scenario.name, outcomes)?;
    info!(
        "scenario '{}' replayed: {} steps, {} unexpected",
        scenario.name,
        report.steps.len(),
        report.failures().len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::scenario::Step;

    fn step(action: Action) -> Step {
        Step { action, expect_error: None }
    }

    fn failing(action: Action, pattern: &str) -> Step {
        Step { action, expect_error: Some(pattern.into()) }
    }

    fn scenario(steps: Vec<Step>) -> Scenario {
        Scenario::from_json(
            r#"{ "name": "unit", "assets": [{ "symbol": "WETH", "price": "2000" }], "steps": [] }"#,
        )
        .map(|s| Scenario { steps, ..s })
        .unwrap()
    }

    fn fund(amount: &str) -> Action {
        Action::Fund { account: "alice".into(), asset: "WETH".into(), amount: amount.into() }
    }

    #[test]
    fn test_mint_gate() {
        let report = run(
            &scenario(vec![
                step(fund("10")),
                step(Action::Deposit { account: "alice".into(), asset: "WETH".into(), amount: "10".into() }),
                failing(
                    Action::Mint { account: "alice".into(), amount: "10000.000000000000000001".into() },
                    "health factor",
                ),
                step(Action::Mint { account: "alice".into(), amount: "10000".into() }),
            ]),
            ProtocolParams::default(),
        )
        .unwrap();

        assert!(report.passed(), "{:?}", report.failures());
        assert_eq!(report.accounts[0].health_factor, "1");
        assert_eq!(report.accounts[0].debt, "10000");
        assert_eq!(report.dsc_supply, "10000");
        assert_eq!(report.solvent, Some(true));
    }

    #[test]
    fn test_unexpected_outcomes_are_reported() {
        let report = run(
            &scenario(vec![
                step(Action::Mint { account: "bob".into(), amount: "1".into() }),
                failing(fund("1"), ""),
            ]),
            ProtocolParams::default(),
        )
        .unwrap();

        assert!(!report.passed());
        assert_eq!(report.failures().len(), 2);
        assert!(matches!(report.steps[0].result, StepResult::Err { code: 2001, .. }));
    }

    #[test]
    fn test_stale_price_blocks_minting() {
        let report = run(
            &scenario(vec![
                step(fund("1")),
                step(Action::Deposit { account: "alice".into(), asset: "WETH".into(), amount: "1".into() }),
                step(Action::AdvanceTime { secs: 3 * 60 * 60 + 1 }),
                failing(Action::Mint { account: "alice".into(), amount: "1".into() }, "stale"),
                step(Action::SetPrice { asset: "WETH".into(), price: "2000".into() }),
                step(Action::Mint { account: "alice".into(), amount: "1".into() }),
            ]),
            ProtocolParams::default(),
        )
        .unwrap();

        assert!(report.passed(), "{:?}", report.failures());
    }

    #[test]
    fn test_unknown_asset() {
        let mut sim = Simulation::new(&scenario(vec![]), ProtocolParams::default()).unwrap();
        let result = sim.apply(&Action::Redeem {
            account: "alice".into(),
            asset: "WBTC".into(),
            amount: "1".into(),
        });
        assert!(matches!(result, Err(Error::AssetNotAllowed(_))));
    }
}
