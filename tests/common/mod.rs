//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use dsc::prelude::*;

pub const NOW: u64 = 1_700_000_000;

/// $2000 with 8 decimals
pub const ETH_USD: i128 = 2_000_0000_0000;

/// $1000 with 8 decimals
pub const BTC_USD: i128 = 1_000_0000_0000;

pub fn ether(n: u128) -> u128 {
    n * PRECISION
}

pub fn price(dollars: i128) -> i128 {
    dollars * 1_0000_0000
}

pub struct Harness {
    pub engine: DscEngine,
    pub dsc: Arc<DscToken>,
    pub weth: Arc<InMemoryCollateral>,
    pub wbtc: Arc<InMemoryCollateral>,
    pub eth_feed: Arc<ManualAggregator>,
    pub btc_feed: Arc<ManualAggregator>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_params(ProtocolParams::default())
    }

    pub fn with_params(params: ProtocolParams) -> Self {
        let address = Address::from_label("dsc-engine");
        let clock = Arc::new(ManualClock::new(NOW));
        let dsc = Arc::new(DscToken::new(address));
        let weth = Arc::new(InMemoryCollateral::new("WETH"));
        let wbtc = Arc::new(InMemoryCollateral::new("WBTC"));
        let eth_feed = Arc::new(ManualAggregator::new("ETH / USD", ETH_USD, NOW));
        let btc_feed = Arc::new(ManualAggregator::new("BTC / USD", BTC_USD, NOW));

        let tokens: Vec<Arc<dyn CollateralToken>> = vec![weth.clone(), wbtc.clone()];
        let oracles: Vec<Arc<dyn PriceOracle>> = vec![
            Arc::new(StaleCheckedOracle::new(eth_feed.clone(), clock.clone()).unwrap()),
            Arc::new(StaleCheckedOracle::new(btc_feed.clone(), clock.clone()).unwrap()),
        ];
        let engine = DscEngine::from_lists(address, tokens, oracles, dsc.clone(), params).unwrap();

        Self { engine, dsc, weth, wbtc, eth_feed, btc_feed, clock }
    }

    pub fn eth(&self) -> AssetId {
        self.weth.asset_id()
    }

    pub fn btc(&self) -> AssetId {
        self.wbtc.asset_id()
    }

    /// Mint collateral to `user` and approve the engine for all of it
    pub fn fund(&self, user: Address, token: &InMemoryCollateral, amount: u128) {
        token.mint_to(user, amount).unwrap();
        let approved = token.allowance(&user, &self.engine.address()).unwrap();
        token.approve(user, self.engine.address(), approved + amount).unwrap();
    }

    pub fn approve_dsc(&self, user: Address, amount: u128) {
        self.dsc.approve(user, self.engine.address(), amount).unwrap();
    }

    /// Fund, deposit and mint in one go
    pub fn open(&mut self, user: Address, eth_amount: u128, dsc_amount: u128) {
        let weth = self.weth.clone();
        self.fund(user, &weth, eth_amount);
        let eth = self.eth();
        self.engine
            .deposit_collateral_and_mint_dsc(user, eth, eth_amount, dsc_amount)
            .unwrap();
    }

    pub fn set_eth_price(&self, dollars: i128) {
        self.eth_feed.update_answer(price(dollars), self.clock_now()).unwrap();
    }

    pub fn clock_now(&self) -> u64 {
        use dsc::oracle::Clock;
        self.clock.now()
    }
}

pub fn user(name: &str) -> Address {
    Address::from_label(name)
}
