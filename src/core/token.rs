//! DSC stablecoin token.
//!
//! This module implements the issuance token the engine mints against
//! collateral:
//! - Balance and allowance tracking
//! - Owner-gated minting and burning
//! - Transfer operations
//! - Supply invariant checking

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::utils::address::Address;
use crate::utils::constants::*;
use crate::utils::math::{safe_add, safe_sub};

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN BOOK
// ═══════════════════════════════════════════════════════════════════════════════

/// Fungible balance sheet shared by the stablecoin and in-memory collateral
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenBook {
    total_supply: u128,
    balances: HashMap<Address, u128>,
    allowances: HashMap<(Address, Address), u128>,
}

impl TokenBook {
    /// Create an empty book
    pub fn new() -> Self {
        Self::default()
    }

    /// Total supply
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Balance of an account
    pub fn balance_of(&self, owner: &Address) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    /// Remaining allowance of `spender` over `owner`'s balance
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    /// Set the allowance of `spender`
    pub fn approve(&mut self, owner: Address, spender: Address, amount: u128) -> Result<()> {
        if spender.is_zero() {
            return Err(Error::ZeroAddress);
        }
        if amount == 0 {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
        Ok(())
    }

    /// Consume allowance before a delegated transfer
    pub fn spend_allowance(&mut self, owner: Address, spender: Address, amount: u128) -> Result<()> {
        let approved = self.allowance(&owner, &spender);
        if approved < amount {
            return Err(Error::InsufficientAllowance {
                required: amount,
                approved,
            });
        }
        self.approve(owner, spender, approved - amount)
    }

    /// Return `amount` that `spender` pulled from `owner`, restoring the
    /// allowance the pull consumed
    pub fn refund(&mut self, spender: Address, owner: Address, amount: u128) -> Result<()> {
        let restored = safe_add(self.allowance(&owner, &spender), amount, "refund allowance")?;
        self.transfer(spender, owner, amount)?;
        self.approve(owner, spender, restored)
    }

    /// Move balance between accounts
    pub fn transfer(&mut self, from: Address, to: Address, amount: u128) -> Result<()> {
        if to.is_zero() {
            return Err(Error::ZeroAddress);
        }

        let from_balance = self.balance_of(&from);
        if from_balance < amount {
            return Err(Error::InsufficientBalance {
                required: amount,
                available: from_balance,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }

        let to_balance = safe_add(self.balance_of(&to), amount, "transfer balance")?;
        self.set_balance(from, from_balance - amount);
        self.set_balance(to, to_balance);
        Ok(())
    }

    /// Create new units
    pub fn mint(&mut self, to: Address, amount: u128) -> Result<()> {
        if to.is_zero() {
            return Err(Error::ZeroAddress);
        }
        let new_supply = safe_add(self.total_supply, amount, "mint total supply")?;
        let new_balance = safe_add(self.balance_of(&to), amount, "mint balance")?;

        self.set_balance(to, new_balance);
        self.total_supply = new_supply;
        Ok(())
    }

    /// Destroy units held by `from`
    pub fn burn(&mut self, from: Address, amount: u128) -> Result<()> {
        let balance = self.balance_of(&from);
        if balance < amount {
            return Err(Error::InsufficientBalance {
                required: amount,
                available: balance,
            });
        }
        self.set_balance(from, balance - amount);
        self.total_supply = safe_sub(self.total_supply, amount, "burn total supply")?;
        Ok(())
    }

    /// Number of accounts with a non-zero balance
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Verify supply invariant (total_supply == sum of all balances)
    pub fn verify_supply_invariant(&self) -> bool {
        let mut sum: u128 = 0;
        for balance in self.balances.values() {
            match sum.checked_add(*balance) {
                Some(next) => sum = next,
                None => return false,
            }
        }
        sum == self.total_supply
    }

    fn set_balance(&mut self, owner: Address, balance: u128) {
        if balance == 0 {
            self.balances.remove(&owner);
        } else {
            self.balances.insert(owner, balance);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STABLE TOKEN INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Issuance token as seen by the engine.
///
/// Transfer-style calls return `Ok(false)` when the token declines without
/// reverting; the engine treats that exactly like an error.
pub trait StableToken: Send + Sync {
    /// Account allowed to mint and burn
    fn owner(&self) -> Result<Address>;

    /// Outstanding supply
    fn total_supply(&self) -> Result<u128>;

    /// Balance of `account`
    fn balance_of(&self, account: &Address) -> Result<u128>;

    /// Allowance of `spender` over `owner`
    fn allowance(&self, owner: &Address, spender: &Address) -> Result<u128>;

    /// Approve `spender` to move `amount` of the caller's balance
    fn approve(&self, caller: Address, spender: Address, amount: u128) -> Result<bool>;

    /// Move `amount` from the caller to `to`
    fn transfer(&self, caller: Address, to: Address, amount: u128) -> Result<bool>;

    /// Move `amount` from `from` to `to`, spending the caller's allowance
    fn transfer_from(&self, caller: Address, from: Address, to: Address, amount: u128) -> Result<bool>;

    /// Give back `amount` the caller pulled from `to` with `transfer_from`,
    /// re-crediting the allowance that pull spent
    fn refund(&self, caller: Address, to: Address, amount: u128) -> Result<bool>;

    /// Mint to `to`. Owner only; rejects the zero address and zero amounts.
    fn mint(&self, caller: Address, to: Address, amount: u128) -> Result<bool>;

    /// Burn from the caller's own balance. Owner only.
    fn burn(&self, caller: Address, amount: u128) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// DSC TOKEN
// ═══════════════════════════════════════════════════════════════════════════════

/// The DSC stablecoin
#[derive(Debug)]
pub struct DscToken {
    /// Token name
    pub name: String,
    /// Token symbol
    pub symbol: String,
    /// Decimal places
    pub decimals: u8,
    owner: RwLock<Address>,
    book: RwLock<TokenBook>,
}

impl DscToken {
    /// Create a token owned by `owner`
    pub fn new(owner: Address) -> Self {
        Self {
            name: DSC_NAME.to_string(),
            symbol: DSC_SYMBOL.to_string(),
            decimals: TOKEN_DECIMALS,
            owner: RwLock::new(owner),
            book: RwLock::new(TokenBook::new()),
        }
    }

    /// Hand mint and burn authority to `new_owner`
    pub fn transfer_ownership(&self, caller: Address, new_owner: Address) -> Result<()> {
        if new_owner.is_zero() {
            return Err(Error::ZeroAddress);
        }
        let mut owner = self.owner.write().map_err(|_| Error::Lock)?;
        if *owner != caller {
            return Err(Error::NotOwner(caller.to_hex()));
        }
        *owner = new_owner;
        Ok(())
    }

    /// Verify supply invariant
    pub fn verify_supply_invariant(&self) -> Result<bool> {
        Ok(self.book.read().map_err(|_| Error::Lock)?.verify_supply_invariant())
    }

    /// Number of holders
    pub fn holder_count(&self) -> Result<usize> {
        Ok(self.book.read().map_err(|_| Error::Lock)?.holder_count())
    }

    fn only_owner(&self, caller: &Address) -> Result<()> {
        let owner = *self.owner.read().map_err(|_| Error::Lock)?;
        if owner != *caller {
            return Err(Error::NotOwner(caller.to_hex()));
        }
        Ok(())
    }
}

impl StableToken for DscToken {
    fn owner(&self) -> Result<Address> {
        Ok(*self.owner.read().map_err(|_| Error::Lock)?)
    }

    fn total_supply(&self) -> Result<u128> {
        Ok(self.book.read().map_err(|_| Error::Lock)?.total_supply())
    }

    fn balance_of(&self, account: &Address) -> Result<u128> {
        Ok(self.book.read().map_err(|_| Error::Lock)?.balance_of(account))
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Result<u128> {
        Ok(self.book.read().map_err(|_| Error::Lock)?.allowance(owner, spender))
    }

    fn approve(&self, caller: Address, spender: Address, amount: u128) -> Result<bool> {
        self.book.write().map_err(|_| Error::Lock)?.approve(caller, spender, amount)?;
        Ok(true)
    }

    fn transfer(&self, caller: Address, to: Address, amount: u128) -> Result<bool> {
        self.book.write().map_err(|_| Error::Lock)?.transfer(caller, to, amount)?;
        Ok(true)
    }

    fn transfer_from(&self, caller: Address, from: Address, to: Address, amount: u128) -> Result<bool> {
        let mut book = self.book.write().map_err(|_| Error::Lock)?;
        // Check the balance first so a failed move leaves the allowance intact.
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

    fn mint(&self, caller: Address, to: Address, amount: u128) -> Result<bool> {
        self.only_owner(&caller)?;
        if to.is_zero() {
            return Err(Error::ZeroAddress);
        }
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }
        self.book.write().map_err(|_| Error::Lock)?.mint(to, amount)?;
        Ok(true)
    }

    fn burn(&self, caller: Address, amount: u128) -> Result<()> {
        self.only_owner(&caller)?;
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }
        self.book.write().map_err(|_| Error::Lock)?.burn(caller, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::from_label("owner")
    }

    fn alice() -> Address {
        Address::from_label("alice")
    }

    fn bob() -> Address {
        Address::from_label("bob")
    }

    #[test]
    fn test_mint_owner_only() {
        let token = DscToken::new(owner());

        assert!(token.mint(owner(), alice(), 1_000).unwrap());
        assert_eq!(token.balance_of(&alice()).unwrap(), 1_000);
        assert_eq!(token.total_supply().unwrap(), 1_000);

        assert!(matches!(token.mint(alice(), alice(), 1), Err(Error::NotOwner(_))));
    }

    #[test]
    fn test_mint_rejects_zero_address_and_amount() {
        let token = DscToken::new(owner());
        assert_eq!(token.mint(owner(), Address::ZERO, 1), Err(Error::ZeroAddress));
        assert_eq!(token.mint(owner(), alice(), 0), Err(Error::ZeroAmount));
    }

    #[test]
    fn test_burn_own_balance() {
        let token = DscToken::new(owner());
        token.mint(owner(), owner(), 1_000).unwrap();

        token.burn(owner(), 400).unwrap();
        assert_eq!(token.balance_of(&owner()).unwrap(), 600);
        assert_eq!(token.total_supply().unwrap(), 600);

        assert!(matches!(
            token.burn(owner(), 601),
            Err(Error::InsufficientBalance { .. })
        ));
        assert_eq!(token.burn(owner(), 0), Err(Error::ZeroAmount));
    }

    #[test]
    fn test_transfer_from_spends_allowance() {
        let token = DscToken::new(owner());
        token.mint(owner(), alice(), 1_000).unwrap();

        assert!(matches!(
            token.transfer_from(bob(), alice(), bob(), 100),
            Err(Error::InsufficientAllowance { .. })
        ));

        token.approve(alice(), bob(), 300).unwrap();
        token.transfer_from(bob(), alice(), bob(), 100).unwrap();

        assert_eq!(token.balance_of(&alice()).unwrap(), 900);
        assert_eq!(token.balance_of(&bob()).unwrap(), 100);
        assert_eq!(token.allowance(&alice(), &bob()).unwrap(), 200);
    }

    #[test]
    fn test_failed_transfer_from_keeps_allowance() {
        let token = DscToken::new(owner());
        token.mint(owner(), alice(), 10).unwrap();
        token.approve(alice(), bob(), 300).unwrap();

        assert!(token.transfer_from(bob(), alice(), bob(), 100).is_err());
        assert_eq!(token.allowance(&alice(), &bob()).unwrap(), 300);
    }

    #[test]
    fn test_refund_restores_allowance() {
        let token = DscToken::new(owner());
        token.mint(owner(), alice(), 1_000).unwrap();
        token.approve(alice(), bob(), 300).unwrap();
        token.transfer_from(bob(), alice(), bob(), 100).unwrap();

        token.refund(bob(), alice(), 100).unwrap();
        assert_eq!(token.balance_of(&alice()).unwrap(), 1_000);
        assert_eq!(token.balance_of(&bob()).unwrap(), 0);
        assert_eq!(token.allowance(&alice(), &bob()).unwrap(), 300);

        // Nothing left to give back
        assert!(token.refund(bob(), alice(), 1).is_err());
        assert_eq!(token.allowance(&alice(), &bob()).unwrap(), 300);
    }

    #[test]
    fn test_transfer_ownership() {
        let token = DscToken::new(owner());
        let engine = Address::from_label("engine");

        assert!(token.transfer_ownership(alice(), engine).is_err());
        token.transfer_ownership(owner(), engine).unwrap();
        assert_eq!(token.owner().unwrap(), engine);
        assert!(token.mint(owner(), alice(), 1).is_err());
        assert!(token.mint(engine, alice(), 1).is_ok());
    }

    #[test]
    fn test_supply_invariant() {
        let token = DscToken::new(owner());
        token.mint(owner(), alice(), 1_000).unwrap();
        token.mint(owner(), owner(), 500).unwrap();
        token.transfer(alice(), bob(), 200).unwrap();
        token.burn(owner(), 100).unwrap();

        assert!(token.verify_supply_invariant().unwrap());
        assert_eq!(token.holder_count().unwrap(), 3);
    }
}
