use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{clock::UnixTimestamp, program_error::ProgramError, pubkey::Pubkey};

use crate::{error::LendingPoolError, state::AssetKind};

/// Collateral deposited and debt owed by one account in one pool.
///
/// Claim tokens are freely transferable, so the LTV check reads collateral
/// from here rather than from claim balances.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// Account discriminator
    pub discriminator: [u8; 8],

    /// Is initialized
    pub is_initialized: bool,

    /// Pool
    pub pool: Pubkey,

    /// Borrower
    pub owner: Pubkey,

    /// Native units deposited as collateral
    pub native_deposited: u64,

    /// Stablecoin units deposited as collateral
    pub stable_deposited: u64,

    /// Native units borrowed
    pub native_borrowed: u64,

    /// Stablecoin units borrowed
    pub stable_borrowed: u64,

    /// Last borrow timestamp
    pub last_borrow_timestamp: i64,

    /// Position PDA bump
    pub bump: u8,
}

impl Position {
    pub const DISCRIMINATOR: [u8; 8] = *b"POSITION";

    pub const SEED: &'static [u8] = b"position";

    pub const LEN: usize = 8 + 1 + 32 + 32 + 8 + 8 + 8 + 8 + 8 + 1;

    pub fn new(pool: Pubkey, owner: Pubkey, bump: u8) -> Self {
        Self {
            discriminator: Self::DISCRIMINATOR,
            is_initialized: true,
            pool,
            owner,
            native_deposited: 0,
            stable_deposited: 0,
            native_borrowed: 0,
            stable_borrowed: 0,
            last_borrow_timestamp: 0,
            bump,
        }
    }

    pub fn find_address(pool: &Pubkey, owner: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[Self::SEED, pool.as_ref(), owner.as_ref()], program_id)
    }

    pub fn validate(&self) -> Result<(), ProgramError> {
        if self.discriminator != Self::DISCRIMINATOR {
            return Err(ProgramError::InvalidAccountData);
        }

        if !self.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }

        Ok(())
    }

    pub fn deposited(&self, kind: AssetKind) -> u64 {
        match kind {
            AssetKind::Native => self.native_deposited,
            AssetKind::Stable => self.stable_deposited,
        }
    }

    fn set_deposited(&mut self, kind: AssetKind, amount: u64) {
        match kind {
            AssetKind::Native => self.native_deposited = amount,
            AssetKind::Stable => self.stable_deposited = amount,
        }
    }

    pub fn record_deposit(&mut self, kind: AssetKind, amount: u64) -> Result<(), ProgramError> {
        let deposited = self
            .deposited(kind)
            .checked_add(amount)
            .ok_or(LendingPoolError::ArithmeticOverflow)?;
        self.set_deposited(kind, deposited);
        Ok(())
    }

    pub fn record_withdrawal(&mut self, kind: AssetKind, amount: u64) -> Result<(), ProgramError> {
        let deposited = self
            .deposited(kind)
            .checked_sub(amount)
            .ok_or(LendingPoolError::NotEnoughCollateral)?;
        self.set_deposited(kind, deposited);
        Ok(())
    }

    pub fn borrowed(&self, kind: AssetKind) -> u64 {
        match kind {
            AssetKind::Native => self.native_borrowed,
            AssetKind::Stable => self.stable_borrowed,
        }
    }

    pub fn record_borrow(
        &mut self,
        kind: AssetKind,
        amount: u64,
        now: UnixTimestamp,
    ) -> Result<(), ProgramError> {
        let borrowed = self
            .borrowed(kind)
            .checked_add(amount)
            .ok_or(LendingPoolError::ArithmeticOverflow)?;

        match kind {
            AssetKind::Native => self.native_borrowed = borrowed,
            AssetKind::Stable => self.stable_borrowed = borrowed,
        }
        self.last_borrow_timestamp = now;
        Ok(())
    }
}
