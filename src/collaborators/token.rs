//! LEARN token ledger.
//!
//! Plain balance bookkeeping with a hard supply cap. Rewards are paid out of
//! the balance held by the reward ledger's address.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::FungibleToken;
use crate::access::{AccessRegistry, Role};
use crate::error::{ProtocolError, Result};
use crate::events::{Event, TxContext};
use crate::types::{Address, TokenAmount, DECIMALS};

/// Fungible reward token
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LearnToken {
    address: Address,
    name: String,
    symbol: String,
    access: AccessRegistry,
    balances: BTreeMap<Address, TokenAmount>,
    total_supply: TokenAmount,
    max_supply: TokenAmount,
}

impl LearnToken {
    /// One billion tokens
    pub const MAX_SUPPLY: TokenAmount = TokenAmount::from_tokens(1_000_000_000);

    /// Deploy the token, minting `initial_supply` to `deployer`.
    ///
    /// The deployer holds both the administrator and minter roles.
    ///
    /// # Errors
    /// Returns `InvalidInput` if `initial_supply` exceeds `max_supply`
    pub fn new(
        address: Address,
        deployer: Address,
        name: impl Into<String>,
        symbol: impl Into<String>,
        initial_supply: TokenAmount,
        max_supply: TokenAmount,
    ) -> Result<Self> {
        if initial_supply > max_supply {
            return Err(ProtocolError::invalid("exceeds max supply"));
        }

        let mut access = AccessRegistry::with_admin(deployer);
        let mut bootstrap = TxContext::new(deployer, 0);
        access.grant_role(&mut bootstrap, address, Role::Minter, deployer)?;

        let mut balances = BTreeMap::new();
        if !initial_supply.is_zero() {
            balances.insert(deployer, initial_supply);
        }

        Ok(Self {
            address,
            name: name.into(),
            symbol: symbol.into(),
            access,
            balances,
            total_supply: initial_supply,
            max_supply,
        })
    }

    /// Component address
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Token name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token symbol
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Decimal places of the base unit
    #[must_use]
    pub const fn decimals(&self) -> u32 {
        DECIMALS
    }

    /// Tokens in existence
    #[must_use]
    pub const fn total_supply(&self) -> TokenAmount {
        self.total_supply
    }

    /// Supply cap
    #[must_use]
    pub const fn max_supply(&self) -> TokenAmount {
        self.max_supply
    }

    /// Grant a role on the token
    ///
    /// # Errors
    /// Returns `Unauthorized` unless the sender is an administrator
    pub fn grant_role(&mut self, tx: &mut TxContext, role: Role, account: Address) -> Result<()> {
        self.access.grant_role(tx, self.address, role, account)
    }

    /// Create `amount` new tokens for `to`
    ///
    /// # Errors
    /// - `Unauthorized` without the minter role
    /// - `InvalidInput` for the zero address or when the cap would be exceeded
    pub fn mint(&mut self, tx: &mut TxContext, to: Address, amount: TokenAmount) -> Result<()> {
        self.access.require(Role::Minter, &tx.sender())?;
        if to.is_zero() {
            return Err(ProtocolError::invalid("cannot mint to the zero address"));
        }
        let supply = self
            .total_supply
            .checked_add(amount)
            .filter(|s| *s <= self.max_supply)
            .ok_or_else(|| ProtocolError::invalid("exceeds max supply"))?;

        self.total_supply = supply;
        self.credit(to, amount)?;
        info!(to = %to, amount = %amount, "Tokens minted");
        tx.emit(
            self.address,
            Event::Transfer {
                from: Address::ZERO,
                to,
                amount,
            },
        );
        Ok(())
    }

    /// Destroy `amount` of the sender's tokens
    ///
    /// # Errors
    /// Returns `InsufficientFunds` if the sender holds less
    pub fn burn(&mut self, tx: &mut TxContext, amount: TokenAmount) -> Result<()> {
        let from = tx.sender();
        self.debit(from, amount)?;
        self.total_supply = self.total_supply.saturating_sub(amount);
        info!(from = %from, amount = %amount, "Tokens burned");
        tx.emit(
            self.address,
            Event::Transfer {
                from,
                to: Address::ZERO,
                amount,
            },
        );
        Ok(())
    }

    fn debit(&mut self, account: Address, amount: TokenAmount) -> Result<()> {
        let have = self.balance_of(&account);
        let remaining = have
            .checked_sub(amount)
            .ok_or(ProtocolError::InsufficientFunds { have, need: amount })?;
        if remaining.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, remaining);
        }
        Ok(())
    }

    fn credit(&mut self, account: Address, amount: TokenAmount) -> Result<()> {
        let balance = self
            .balance_of(&account)
            .checked_add(amount)
            .ok_or_else(|| ProtocolError::invalid("balance overflow"))?;
        if !balance.is_zero() {
            self.balances.insert(account, balance);
        }
        Ok(())
    }
}

impl FungibleToken for LearnToken {
    fn balance_of(&self, account: &Address) -> TokenAmount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    fn transfer(&mut self, tx: &mut TxContext, to: Address, amount: TokenAmount) -> Result<()> {
        let from = tx.sender();
        if to.is_zero() {
            return Err(ProtocolError::invalid("cannot transfer to the zero address"));
        }

        self.debit(from, amount)?;
        self.credit(to, amount)?;
        debug!(from = %from, to = %to, amount = %amount, "Tokens transferred");
        tx.emit(self.address, Event::Transfer { from, to, amount });
        Ok(())
    }
}
