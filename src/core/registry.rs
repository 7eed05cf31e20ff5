//! Collateral asset registry.
//!
//! Built once from two parallel lists (assets and their price oracles) and
//! never mutated afterwards. Every operation that takes an asset resolves it
//! here first; unknown assets are rejected before anything is staged.

use std::fmt;
use std::sync::Arc;

use crate::core::collateral::{AssetId, CollateralToken};
use crate::error::{Error, Result};
use crate::oracle::price_feed::PriceOracle;
use crate::utils::constants::ADDITIONAL_FEED_PRECISION;
use crate::utils::math::Wad;

/// A whitelisted asset and its price source
#[derive(Clone)]
pub struct CollateralBinding {
    /// Asset identifier
    pub asset: AssetId,
    /// Transfer handle
    pub token: Arc<dyn CollateralToken>,
    /// Price handle
    pub oracle: Arc<dyn PriceOracle>,
}

impl fmt::Debug for CollateralBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollateralBinding")
            .field("asset", &self.asset)
            .field("symbol", &self.token.symbol())
            .field("oracle", &self.oracle.description())
            .finish()
    }
}

/// Ordered set of whitelisted collateral assets
#[derive(Debug, Clone)]
pub struct CollateralRegistry {
    bindings: Vec<CollateralBinding>,
}

impl CollateralRegistry {
    /// Pair `tokens[i]` with `oracles[i]`
    pub fn new(
        tokens: Vec<Arc<dyn CollateralToken>>,
        oracles: Vec<Arc<dyn PriceOracle>>,
    ) -> Result<Self> {
        if tokens.len() != oracles.len() {
            return Err(Error::ConfigLengthMismatch {
                assets: tokens.len(),
                oracles: oracles.len(),
            });
        }
        if tokens.is_empty() {
            return Err(Error::InvalidParameter {
                name: "collateral".into(),
                reason: "at least one collateral asset is required".into(),
            });
        }

        let mut bindings: Vec<CollateralBinding> = Vec::with_capacity(tokens.len());
        for (token, oracle) in tokens.into_iter().zip(oracles) {
            let asset = token.asset_id();
            if bindings.iter().any(|b| b.asset == asset) {
                return Err(Error::DuplicateAsset(asset.to_hex()));
            }
            bindings.push(CollateralBinding {
                asset,
                token,
                oracle,
            });
        }

        Ok(Self { bindings })
    }

    /// Whitelisted assets in registration order
    pub fn assets(&self) -> Vec<AssetId> {
        self.bindings.iter().map(|b| b.asset).collect()
    }

    /// All bindings in registration order
    pub fn bindings(&self) -> &[CollateralBinding] {
        &self.bindings
    }

    /// Check whether `asset` is whitelisted
    pub fn is_allowed(&self, asset: &AssetId) -> bool {
        self.bindings.iter().any(|b| b.asset == *asset)
    }

    /// Resolve `asset` or reject it
    pub fn binding(&self, asset: &AssetId) -> Result<&CollateralBinding> {
        self.bindings
            .iter()
            .find(|b| b.asset == *asset)
            .ok_or_else(|| Error::AssetNotAllowed(asset.to_hex()))
    }

    /// Price oracle of `asset`
    pub fn oracle(&self, asset: &AssetId) -> Result<Arc<dyn PriceOracle>> {
        Ok(self.binding(asset)?.oracle.clone())
    }

    /// Transfer handle of `asset`
    pub fn token(&self, asset: &AssetId) -> Result<Arc<dyn CollateralToken>> {
        Ok(self.binding(asset)?.token.clone())
    }

    /// Symbol of `asset`, or its hex id if unknown
    pub fn symbol(&self, asset: &AssetId) -> String {
        self.binding(asset)
            .map(|b| b.token.symbol())
            .unwrap_or_else(|_| asset.to_hex())
    }

    /// Current price of one unit of `asset`, lifted to 18 decimals.
    ///
    /// Stale and non-positive quotes are hard failures.
    pub fn price(&self, asset: &AssetId) -> Result<Wad> {
        let binding = self.binding(asset)?;
        let quote = binding.oracle.latest_price()?;

        if !quote.is_fresh {
            return Err(Error::StalePrice(binding.token.symbol()));
        }
        if quote.price <= 0 {
            return Err(Error::InvalidPrice {
                asset: binding.token.symbol(),
                price: quote.price,
            });
        }

        (quote.price as u128)
            .checked_mul(ADDITIONAL_FEED_PRECISION)
            .map(Wad::from_raw)
            .ok_or_else(|| Error::Overflow {
                operation: "normalize price".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collateral::InMemoryCollateral;
    use crate::oracle::price_feed::PriceQuote;
    use crate::utils::address::Address;

    struct FixedOracle(PriceQuote);

    impl PriceOracle for FixedOracle {
        fn latest_price(&self) -> Result<PriceQuote> {
            Ok(self.0)
        }

        fn description(&self) -> String {
            "FIXED".into()
        }
    }

    fn oracle(price: i128, is_fresh: bool) -> Arc<dyn PriceOracle> {
        Arc::new(FixedOracle(PriceQuote { price, is_fresh }))
    }

    fn token(symbol: &str) -> Arc<dyn CollateralToken> {
        Arc::new(InMemoryCollateral::new(symbol))
    }

    #[test]
    fn test_length_mismatch() {
        let result = CollateralRegistry::new(vec![token("WETH"), token("WBTC")], vec![oracle(1, true)]);
        assert_eq!(
            result.unwrap_err(),
            Error::ConfigLengthMismatch { assets: 2, oracles: 1 }
        );
    }

    #[test]
    fn test_duplicate_asset() {
        let result = CollateralRegistry::new(
            vec![token("WETH"), token("WETH")],
            vec![oracle(1, true), oracle(1, true)],
        );
        assert!(matches!(result, Err(Error::DuplicateAsset(_))));
    }

    #[test]
    fn test_lookup_and_order() {
        let weth = token("WETH");
        let wbtc = token("WBTC");
        let registry = CollateralRegistry::new(
            vec![weth.clone(), wbtc.clone()],
            vec![oracle(2_000_0000_0000, true), oracle(1_000_0000_0000, true)],
        )
        .unwrap();

        assert_eq!(registry.assets(), vec![weth.asset_id(), wbtc.asset_id()]);
        assert!(registry.is_allowed(&weth.asset_id()));

        let unknown = Address::from_label("unknown");
        assert!(!registry.is_allowed(&unknown));
        assert!(matches!(registry.price(&unknown), Err(Error::AssetNotAllowed(_))));
    }

    #[test]
    fn test_price_normalization() {
        let weth = token("WETH");
        let registry =
            CollateralRegistry::new(vec![weth.clone()], vec![oracle(2_000_0000_0000, true)]).unwrap();
        assert_eq!(
            registry.price(&weth.asset_id()).unwrap(),
            Wad::from_integer(2_000).unwrap()
        );
    }

    #[test]
    fn test_price_faults() {
        let stale = token("STALE");
        let negative = token("NEG");
        let zero = token("ZERO");
        let registry = CollateralRegistry::new(
            vec![stale.clone(), negative.clone(), zero.clone()],
            vec![oracle(100, false), oracle(-5, true), oracle(0, true)],
        )
        .unwrap();

        assert!(matches!(registry.price(&stale.asset_id()), Err(Error::StalePrice(_))));
        assert!(matches!(
            registry.price(&negative.asset_id()),
            Err(Error::InvalidPrice { price: -5, .. })
        ));
        assert!(matches!(registry.price(&zero.asset_id()), Err(Error::InvalidPrice { .. })));
    }
}
