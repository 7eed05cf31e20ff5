//! Collateral asset interface and an in-memory implementation.

use std::sync::RwLock;

use crate::core::token::TokenBook;
use crate::error::{Error, Result};
use crate::utils::address::Address;

/// Collateral assets are identified by their token address
pub type AssetId = Address;

/// Transfer semantics the engine needs from a collateral asset.
///
/// `Ok(false)` means the asset declined the transfer; the engine aborts the
/// operation in that case just as it does on `Err`.
pub trait CollateralToken: Send + Sync {
    /// Asset identifier
    fn asset_id(&self) -> AssetId;

    /// Ticker, for logs and reports
    fn symbol(&self) -> String;

    /// Balance of `account`
    fn balance_of(&self, account: &Address) -> Result<u128>;

    /// Move `amount` from the caller to `to`
    fn transfer(&self, caller: Address, to: Address, amount: u128) -> Result<bool>;

    /// Move `amount` from `from` to `to`, spending the caller's allowance
    fn transfer_from(&self, caller: Address, from: Address, to: Address, amount: u128) -> Result<bool>;

    /// Undo an earlier `transfer_from` by the caller: move `amount` back to
    /// `to` and restore the allowance the pull consumed
    fn refund(&self, caller: Address, to: Address, amount: u128) -> Result<bool>;
}

/// ERC-20 style collateral held in memory
#[derive(Debug)]
pub struct InMemoryCollateral {
    id: AssetId,
    symbol: String,
    book: RwLock<TokenBook>,
}

impl InMemoryCollateral {
    /// Create an asset whose id is derived from its symbol
    pub fn new(symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        Self {
            id: Address::from_label(&format!("asset:{}", symbol)),
            symbol,
            book: RwLock::new(TokenBook::new()),
        }
    }

    /// Credit `amount` to `to` out of thin air
    pub fn mint_to(&self, to: Address, amount: u128) -> Result<()> {
        self.book.write().map_err(|_| Error::Lock)?.mint(to, amount)
    }

    /// Approve `spender` to move `amount` of `owner`'s balance
    pub fn approve(&self, owner: Address, spender: Address, amount: u128) -> Result<()> {
        self.book.write().map_err(|_| Error::Lock)?.approve(owner, spender, amount)
    }

    /// Remaining allowance
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Result<u128> {
        Ok(self.book.read().map_err(|_| Error::Lock)?.allowance(owner, spender))
    }

    /// Total units in existence
    pub fn total_supply(&self) -> Result<u128> {
        Ok(self.book.read().map_err(|_| Error::Lock)?.total_supply())
    }
}

impl CollateralToken for InMemoryCollateral {
    fn asset_id(&self) -> AssetId {
        self.id
    }

    fn symbol(&self) -> String {
        self.symbol.clone()
    }

    fn balance_of(&self, account: &Address) -> Result<u128> {
        Ok(self.book.read().map_err(|_| Error::Lock)?.balance_of(account))
    }

    fn transfer(&self, caller: Address, to: Address, amount: u128) -> Result<bool> {
        self.book.write().map_err(|_| Error::Lock)?.transfer(caller, to, amount)?;
        Ok(true)
    }

    fn transfer_from(&self, caller: Address, from: Address, to: Address, amount: u128) -> Result<bool> {
        let mut book = self.book.write().map_err(|_| Error::Lock)?;
        let available = book.balance_of(&from);
        if available < amount {
            return Err(Error::InsufficientBalance {
                required: amount,
                available,
            });
        }
        book.spend_allowance(from, caller, amount)?;
        book.transfer(from, to, amount)?;
        Ok(true)
    }

    fn refund(&self, caller: Address, to: Address, amount: u128) -> Result<bool> {
        self.book.write().map_err(|_| Error::Lock)?.refund(caller, to, amount)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_id_from_symbol() {
        let weth = InMemoryCollateral::new("WETH");
        let wbtc = InMemoryCollateral::new("WBTC");
        assert_ne!(weth.asset_id(), wbtc.asset_id());
        assert_eq!(weth.asset_id(), InMemoryCollateral::new("WETH").asset_id());
        assert_eq!(weth.symbol(), "WETH");
    }

    #[test]
    fn test_pull_requires_allowance() {
        let weth = InMemoryCollateral::new("WETH");
        let user = Address::from_label("user");
        let engine = Address::from_label("engine");
        weth.mint_to(user, 10).unwrap();

        assert!(weth.transfer_from(engine, user, engine, 5).is_err());

        weth.approve(user, engine, 5).unwrap();
        assert!(weth.transfer_from(engine, user, engine, 5).unwrap());
        assert_eq!(weth.balance_of(&user).unwrap(), 5);
        assert_eq!(weth.balance_of(&engine).unwrap(), 5);
        assert_eq!(weth.allowance(&user, &engine).unwrap(), 0);
    }

    #[test]
    fn test_refund_undoes_pull() {
        let weth = InMemoryCollateral::new("WETH");
        let user = Address::from_label("user");
        let engine = Address::from_label("engine");
        weth.mint_to(user, 10).unwrap();
        weth.approve(user, engine, 8).unwrap();
        weth.transfer_from(engine, user, engine, 5).unwrap();

        assert!(weth.refund(engine, user, 5).unwrap());
        assert_eq!(weth.balance_of(&user).unwrap(), 10);
        assert_eq!(weth.balance_of(&engine).unwrap(), 0);
        assert_eq!(weth.allowance(&user, &engine).unwrap(), 8);
    }

    #[test]
    fn test_push_from_own_balance() {
        let weth = InMemoryCollateral::new("WETH");
        let engine = Address::from_label("engine");
        let user = Address::from_label("user");
        weth.mint_to(engine, 3).unwrap();

        assert!(weth.transfer(engine, user, 3).unwrap());
        assert!(weth.transfer(engine, user, 1).is_err());
        assert_eq!(weth.total_supply().unwrap(), 3);
    }
}
