//! Claim token interface and an in-memory ledger implementing it.

use std::collections::BTreeMap;

use solana_program::{entrypoint::ProgramResult, msg, program_error::ProgramError, pubkey::Pubkey};

use crate::error::LendingPoolError;

pub const NATIVE_CLAIM_NAME: &str = "Wrapped Native";
pub const NATIVE_CLAIM_SYMBOL: &str = "WNATIVE";
pub const STABLE_CLAIM_NAME: &str = "Wrapped USD";
pub const STABLE_CLAIM_SYMBOL: &str = "WUSD";

/// Mintable token whose owner alone may mint and burn.
///
/// Every pool deposit mints a claim of equal amount and every withdrawal burns
/// one, so the pool must hold ownership before it can accept collateral.
pub trait ClaimToken {
    fn owner(&self) -> Result<Pubkey, ProgramError>;

    fn balance_of(&self, holder: &Pubkey) -> Result<u64, ProgramError>;

    fn mint(&mut self, caller: &Pubkey, to: &Pubkey, amount: u64) -> ProgramResult;

    fn burn(&mut self, caller: &Pubkey, from: &Pubkey, amount: u64) -> ProgramResult;

    fn transfer_ownership(&mut self, caller: &Pubkey, new_owner: &Pubkey) -> ProgramResult;
}

/// Balances, allowances and ownership of one fungible token, held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenLedger {
    pub name: String,
    pub symbol: String,
    owner: Pubkey,
    total_supply: u64,
    balances: BTreeMap<Pubkey, u64>,
    allowances: BTreeMap<(Pubkey, Pubkey), u64>,
}

impl TokenLedger {
    pub fn new(name: &str, symbol: &str, owner: Pubkey) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            owner,
            total_supply: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
        }
    }

    pub fn native_claim(owner: Pubkey) -> Self {
        Self::new(NATIVE_CLAIM_NAME, NATIVE_CLAIM_SYMBOL, owner)
    }

    pub fn stable_claim(owner: Pubkey) -> Self {
        Self::new(STABLE_CLAIM_NAME, STABLE_CLAIM_SYMBOL, owner)
    }

    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    pub fn balance(&self, holder: &Pubkey) -> u64 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    pub fn allowance(&self, holder: &Pubkey, spender: &Pubkey) -> u64 {
        self.allowances.get(&(*holder, *spender)).copied().unwrap_or(0)
    }

    pub fn approve(&mut self, holder: &Pubkey, spender: &Pubkey, amount: u64) {
        self.allowances.insert((*holder, *spender), amount);
    }

    pub fn transfer(&mut self, from: &Pubkey, to: &Pubkey, amount: u64) -> ProgramResult {
        let from_balance = self
            .balance(from)
            .checked_sub(amount)
            .ok_or(LendingPoolError::InsufficientBalance)?;

        if from == to {
            return Ok(());
        }

        let to_balance = self
            .balance(to)
            .checked_add(amount)
            .ok_or(LendingPoolError::ArithmeticOverflow)?;

        self.balances.insert(*from, from_balance);
        self.balances.insert(*to, to_balance);
        Ok(())
    }

    /// Spend `spender`'s allowance over `from`.
    pub fn transfer_from(
        &mut self,
        spender: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> ProgramResult {
        let remaining = self.allowance(from, spender).checked_sub(amount).ok_or_else(|| {
            msg!(
                "Allowance {} below transfer amount {}",
                self.allowance(from, spender),
                amount
            );
            LendingPoolError::InsufficientAllowance
        })?;

        self.transfer(from, to, amount)?;
        self.allowances.insert((*from, *spender), remaining);
        Ok(())
    }
}

impl ClaimToken for TokenLedger {
    fn owner(&self) -> Result<Pubkey, ProgramError> {
        Ok(self.owner)
    }

    fn balance_of(&self, holder: &Pubkey) -> Result<u64, ProgramError> {
        Ok(self.balance(holder))
    }

    fn mint(&mut self, caller: &Pubkey, to: &Pubkey, amount: u64) -> ProgramResult {
        if *caller != self.owner {
            return Err(LendingPoolError::ClaimAuthorityMissing.into());
        }

        let total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LendingPoolError::ArithmeticOverflow)?;
        let balance = self
            .balance(to)
            .checked_add(amount)
            .ok_or(LendingPoolError::ArithmeticOverflow)?;

        self.total_supply = total_supply;
        self.balances.insert(*to, balance);
        Ok(())
    }

    fn burn(&mut self, caller: &Pubkey, from: &Pubkey, amount: u64) -> ProgramResult {
        if *caller != self.owner {
            return Err(LendingPoolError::ClaimAuthorityMissing.into());
        }

        let balance = self
            .balance(from)
            .checked_sub(amount)
            .ok_or(LendingPoolError::InsufficientBalance)?;

        self.total_supply -= amount;
        self.balances.insert(*from, balance);
        Ok(())
    }

    fn transfer_ownership(&mut self, caller: &Pubkey, new_owner: &Pubkey) -> ProgramResult {
        if *caller != self.owner {
            return Err(LendingPoolError::InvalidAuthority.into());
        }

        self.owner = *new_owner;
        Ok(())
    }
}
