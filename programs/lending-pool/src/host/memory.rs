use solana_program::{entrypoint::ProgramResult, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    host::PoolHost,
    state::AssetKind,
    token::{ClaimToken, TokenLedger},
};

/// Off-chain host: every asset is a [`TokenLedger`].
///
/// Native collateral is carried with the call (`collect` debits the caller
/// directly); stablecoin collateral is pulled through an allowance granted to
/// the pool.
#[derive(Debug, Clone)]
pub struct MemoryHost {
    pub pool: Pubkey,
    pub native: TokenLedger,
    pub stablecoin: TokenLedger,
    pub native_claim: TokenLedger,
    pub stable_claim: TokenLedger,
}

impl MemoryHost {
    /// Claims start out owned by `deployer`, who must hand them to the pool.
    pub fn new(pool: Pubkey, deployer: Pubkey) -> Self {
        Self {
            pool,
            native: TokenLedger::new("Native", "NATIVE", deployer),
            stablecoin: TokenLedger::new("USD Coin", "USDC", deployer),
            native_claim: TokenLedger::native_claim(deployer),
            stable_claim: TokenLedger::stable_claim(deployer),
        }
    }

    pub fn asset(&self, kind: AssetKind) -> &TokenLedger {
        match kind {
            AssetKind::Native => &self.native,
            AssetKind::Stable => &self.stablecoin,
        }
    }

    fn asset_mut(&mut self, kind: AssetKind) -> &mut TokenLedger {
        match kind {
            AssetKind::Native => &mut self.native,
            AssetKind::Stable => &mut self.stablecoin,
        }
    }

    pub fn claim_ledger(&self, kind: AssetKind) -> &TokenLedger {
        match kind {
            AssetKind::Native => &self.native_claim,
            AssetKind::Stable => &self.stable_claim,
        }
    }

    /// Issue `amount` of the underlying `kind` to `holder`.
    pub fn fund(&mut self, kind: AssetKind, holder: &Pubkey, amount: u64) -> ProgramResult {
        let ledger = self.asset_mut(kind);
        let issuer = ledger.owner()?;
        ledger.mint(&issuer, holder, amount)
    }
}

impl PoolHost for MemoryHost {
    fn claim(&mut self, kind: AssetKind) -> &mut dyn ClaimToken {
        match kind {
            AssetKind::Native => &mut self.native_claim,
            AssetKind::Stable => &mut self.stable_claim,
        }
    }

    fn reserves(&self, kind: AssetKind) -> Result<u64, ProgramError> {
        Ok(self.asset(kind).balance(&self.pool))
    }

    fn collect(&mut self, kind: AssetKind, from: &Pubkey, amount: u64) -> ProgramResult {
        let pool = self.pool;
        match kind {
            AssetKind::Native => self.native.transfer(from, &pool, amount),
            AssetKind::Stable => self.stablecoin.transfer_from(&pool, from, &pool, amount),
        }
    }

    fn disburse(&mut self, kind: AssetKind, to: &Pubkey, amount: u64) -> ProgramResult {
        let pool = self.pool;
        self.asset_mut(kind).transfer(&pool, to, amount)
    }
}
