use borsh::{BorshDeserialize, BorshSerialize};
use ethereum_types::Address;
use solana_program::{
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::{attestation::keccak256, error::LendingPoolError};

/// Which collateral an operation touches.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Native settlement asset (lamports)
    Native,
    /// Reference stablecoin
    Stable,
}

impl AssetKind {
    pub const ALL: [AssetKind; 2] = [AssetKind::Native, AssetKind::Stable];

    /// Decode the wire selector: 0 = native, 1 = stablecoin.
    pub fn from_selector(selector: u8) -> Result<Self, ProgramError> {
        match selector {
            0 => Ok(AssetKind::Native),
            1 => Ok(AssetKind::Stable),
            _ => Err(LendingPoolError::InvalidAssetKind.into()),
        }
    }

    pub fn selector(self) -> u8 {
        match self {
            AssetKind::Native => 0,
            AssetKind::Stable => 1,
        }
    }
}

/// Pool-wide totals for one asset kind.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetTotals {
    /// Net collateral deposited (deposits minus withdrawals)
    pub deposited: u64,

    /// Wrapped claims outstanding
    pub claim_supply: u64,

    /// Outstanding borrows paid out of the pool
    pub borrowed: u64,
}

/// Aggregate collateral held by the pool.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollateralState {
    pub native: AssetTotals,
    pub stable: AssetTotals,
}

impl CollateralState {
    pub const LEN: usize = 2 * (8 + 8 + 8);

    pub fn asset(&self, kind: AssetKind) -> &AssetTotals {
        match kind {
            AssetKind::Native => &self.native,
            AssetKind::Stable => &self.stable,
        }
    }

    fn asset_mut(&mut self, kind: AssetKind) -> &mut AssetTotals {
        match kind {
            AssetKind::Native => &mut self.native,
            AssetKind::Stable => &mut self.stable,
        }
    }

    /// Deposit backs a mint of the same amount.
    pub fn record_deposit(&mut self, kind: AssetKind, amount: u64) -> Result<(), ProgramError> {
        let totals = self.asset_mut(kind);
        let deposited = totals
            .deposited
            .checked_add(amount)
            .ok_or(LendingPoolError::ArithmeticOverflow)?;
        let claim_supply = totals
            .claim_supply
            .checked_add(amount)
            .ok_or(LendingPoolError::ArithmeticOverflow)?;

        totals.deposited = deposited;
        totals.claim_supply = claim_supply;
        Ok(())
    }

    /// Withdrawal burns the same amount of claims.
    pub fn record_withdrawal(&mut self, kind: AssetKind, amount: u64) -> Result<(), ProgramError> {
        let totals = self.asset_mut(kind);
        let deposited = totals
            .deposited
            .checked_sub(amount)
            .ok_or(LendingPoolError::NotEnoughCollateral)?;
        let claim_supply = totals
            .claim_supply
            .checked_sub(amount)
            .ok_or(LendingPoolError::NotEnoughCollateral)?;

        totals.deposited = deposited;
        totals.claim_supply = claim_supply;
        Ok(())
    }

    pub fn record_borrow(&mut self, kind: AssetKind, amount: u64) -> Result<(), ProgramError> {
        let totals = self.asset_mut(kind);
        totals.borrowed = totals
            .borrowed
            .checked_add(amount)
            .ok_or(LendingPoolError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Every claim is backed 1:1 by a deposit.
    pub fn is_fully_backed(&self) -> bool {
        AssetKind::ALL
            .iter()
            .all(|kind| self.asset(*kind).claim_supply <= self.asset(*kind).deposited)
    }
}

/// Pool configuration and collateral aggregates.
///
/// Lives in the pool PDA, which also holds the native collateral. The
/// program is the only writer.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct PoolConfig {
    /// Account discriminator
    pub discriminator: [u8; 8],

    /// Is initialized flag
    pub is_initialized: bool,

    /// Pool owner
    pub authority: Pubkey,

    /// Pool PDA bump
    pub bump: u8,

    /// Address of the only accepted price reporter
    pub authorized_signer: [u8; 20],

    /// Verifying contract bound into every attestation digest
    pub verifying_contract: [u8; 20],

    /// Mint of the wrapped native claim
    pub native_claim_mint: Pubkey,

    /// Mint of the wrapped stablecoin claim
    pub stable_claim_mint: Pubkey,

    /// Reference stablecoin mint
    pub stable_mint: Pubkey,

    /// Stablecoin token account owned by the pool PDA
    pub stable_vault: Pubkey,

    /// Loan-to-value cap in percent (default: 70)
    pub max_ltv_percent: u8,

    /// Collateral aggregates
    pub collateral: CollateralState,

    /// Last update timestamp
    pub last_update: i64,

    /// Stats
    pub total_borrows: u64,
    pub total_revocations: u64,
}

impl PoolConfig {
    pub const DISCRIMINATOR: [u8; 8] = *b"LEND_POL";

    pub const SEED: &'static [u8] = b"pool";

    pub const DEFAULT_MAX_LTV_PERCENT: u8 = 70;

    pub const LEN: usize = 8 + // discriminator
        1 + // is_initialized
        32 + // authority
        1 + // bump
        20 + // authorized_signer
        20 + // verifying_contract
        32 + // native_claim_mint
        32 + // stable_claim_mint
        32 + // stable_mint
        32 + // stable_vault
        1 + // max_ltv_percent
        CollateralState::LEN +
        8 + // last_update
        8 + // total_borrows
        8 + // total_revocations
        64; // padding for growth

    pub fn new(authority: Pubkey, pool: &Pubkey, authorized_signer: Address, bump: u8) -> Self {
        Self {
            discriminator: Self::DISCRIMINATOR,
            is_initialized: true,
            authority,
            bump,
            authorized_signer: authorized_signer.0,
            verifying_contract: verifying_contract_for(pool).0,
            native_claim_mint: Pubkey::default(),
            stable_claim_mint: Pubkey::default(),
            stable_mint: Pubkey::default(),
            stable_vault: Pubkey::default(),
            max_ltv_percent: Self::DEFAULT_MAX_LTV_PERCENT,
            collateral: CollateralState::default(),
            last_update: 0,
            total_borrows: 0,
            total_revocations: 0,
        }
    }

    pub fn find_address(authority: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[Self::SEED, authority.as_ref()], program_id)
    }

    pub fn authorized_signer(&self) -> Address {
        Address::from(self.authorized_signer)
    }

    pub fn verifying_contract(&self) -> Address {
        Address::from(self.verifying_contract)
    }

    pub fn claim_mint(&self, kind: AssetKind) -> &Pubkey {
        match kind {
            AssetKind::Native => &self.native_claim_mint,
            AssetKind::Stable => &self.stable_claim_mint,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ProgramError> {
        if self.discriminator != Self::DISCRIMINATOR {
            return Err(ProgramError::InvalidAccountData);
        }

        if !self.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }

        if self.max_ltv_percent == 0 || self.max_ltv_percent > 100 {
            return Err(LendingPoolError::InvalidConfiguration.into());
        }

        if self.authorized_signer().is_zero() {
            return Err(LendingPoolError::InvalidConfiguration.into());
        }

        if !self.collateral.is_fully_backed() {
            return Err(LendingPoolError::InvalidConfiguration.into());
        }

        Ok(())
    }
}

/// 20-byte identity a pool account signs under: `keccak256(pubkey)[12..]`.
pub fn verifying_contract_for(pool: &Pubkey) -> Address {
    let hash = keccak256(&[pool.as_ref()]);
    Address::from_slice(&hash[12..])
}
