//! Pool operations: deposits, withdrawals, borrows and revocation.
//!
//! Each operation runs every check and host effect before touching
//! [`PoolConfig`], [`RevocationRegistry`] or [`Position`], so a rejected call
//! leaves pool state as it was.

use ethereum_types::{Address, U256};
use solana_program::{
    clock::UnixTimestamp,
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::{
    attestation::{AttestationCodec, Digest, PriceAttestation},
    engine::{AccountBalances, CollateralizationEngine},
    error::LendingPoolError,
    host::PoolHost,
    signature::{Secp256k1Scheme, SignatureAuthority, SignatureScheme},
    state::{AssetKind, PoolConfig, Position, RevocationRegistry},
};

pub struct LendingPool<'a, S: SignatureScheme = Secp256k1Scheme> {
    key: Pubkey,
    config: &'a mut PoolConfig,
    registry: &'a mut RevocationRegistry,
    authority: SignatureAuthority<S>,
}

impl<'a> LendingPool<'a, Secp256k1Scheme> {
    pub fn new(key: Pubkey, config: &'a mut PoolConfig, registry: &'a mut RevocationRegistry) -> Self {
        Self::with_scheme(key, config, registry, Secp256k1Scheme)
    }
}

impl<'a, S: SignatureScheme> LendingPool<'a, S> {
    pub fn with_scheme(
        key: Pubkey,
        config: &'a mut PoolConfig,
        registry: &'a mut RevocationRegistry,
        scheme: S,
    ) -> Self {
        let authority = SignatureAuthority::new(scheme, config.authorized_signer());
        Self {
            key,
            config,
            registry,
            authority,
        }
    }

    pub fn key(&self) -> &Pubkey {
        &self.key
    }

    pub fn config(&self) -> &PoolConfig {
        self.config
    }

    pub fn registry(&self) -> &RevocationRegistry {
        self.registry
    }

    fn codec(&self) -> AttestationCodec {
        AttestationCodec::new(&self.config.verifying_contract())
    }

    fn engine(&self) -> CollateralizationEngine<'_, S> {
        CollateralizationEngine::new(
            self.codec(),
            &self.authority,
            self.registry,
            self.config.max_ltv_percent,
        )
    }

    /// Digest of `attestation` as bound to this pool.
    pub fn digest(&self, attestation: &PriceAttestation) -> Digest {
        self.codec().digest(attestation)
    }

    /// Collateral deposited and debt owed through `position`.
    pub fn account_balances(&self, position: &Position) -> AccountBalances {
        AccountBalances {
            native_collateral: position.native_deposited,
            stable_collateral: position.stable_deposited,
            native_debt: position.native_borrowed,
            stable_debt: position.stable_borrowed,
        }
    }

    fn require_claim_authority<H: PoolHost>(&self, host: &mut H, kind: AssetKind) -> ProgramResult {
        if host.claim(kind).owner()? != self.key {
            msg!("Pool does not own the {:?} claim token", kind);
            return Err(LendingPoolError::ClaimAuthorityMissing.into());
        }
        Ok(())
    }

    fn require_position_owner(&self, position: &Position, owner: &Pubkey) -> ProgramResult {
        if position.pool != self.key || position.owner != *owner {
            msg!("Position does not belong to {} in this pool", owner);
            return Err(LendingPoolError::InvalidAuthority.into());
        }
        Ok(())
    }

    /// Take `amount` of `kind` from `depositor`, credit it to their position
    /// and mint the same amount of claims.
    pub fn deposit_collateral<H: PoolHost>(
        &mut self,
        host: &mut H,
        kind: AssetKind,
        depositor: &Pubkey,
        position: &mut Position,
        amount: u64,
        now: UnixTimestamp,
    ) -> ProgramResult {
        self.require_position_owner(position, depositor)?;
        self.require_claim_authority(host, kind)?;

        let mut collateral = self.config.collateral;
        collateral.record_deposit(kind, amount)?;
        let mut updated = position.clone();
        updated.record_deposit(kind, amount)?;

        host.collect(kind, depositor, amount)?;
        host.claim(kind).mint(&self.key, depositor, amount)?;

        *position = updated;
        self.config.collateral = collateral;
        self.config.last_update = now;

        msg!("Deposited {} {:?} for {}", amount, kind, depositor);
        Ok(())
    }

    pub fn deposit_collateral_native<H: PoolHost>(
        &mut self,
        host: &mut H,
        depositor: &Pubkey,
        position: &mut Position,
        amount: u64,
        now: UnixTimestamp,
    ) -> ProgramResult {
        self.deposit_collateral(host, AssetKind::Native, depositor, position, amount, now)
    }

    /// Requires a prior allowance of at least `amount` to the pool.
    pub fn deposit_collateral_stable<H: PoolHost>(
        &mut self,
        host: &mut H,
        depositor: &Pubkey,
        position: &mut Position,
        amount: u64,
        now: UnixTimestamp,
    ) -> ProgramResult {
        self.deposit_collateral(host, AssetKind::Stable, depositor, position, amount, now)
    }

    /// Return `amount` of `owner`'s deposited collateral and burn the matching
    /// claims, provided what is left still covers their debt.
    #[allow(clippy::too_many_arguments)]
    pub fn withdraw_collateral<H: PoolHost>(
        &mut self,
        host: &mut H,
        kind: AssetKind,
        owner: &Pubkey,
        position: &mut Position,
        amount: u64,
        attestation: &PriceAttestation,
        signature: &[u8],
        now: UnixTimestamp,
    ) -> ProgramResult {
        self.require_position_owner(position, owner)?;

        let balances = self.account_balances(position);
        self.engine()
            .check_withdraw_allowed(amount, kind, attestation, signature, &balances, now)?;

        let mut collateral = self.config.collateral;
        collateral.record_withdrawal(kind, amount)?;
        let mut updated = position.clone();
        updated.record_withdrawal(kind, amount)?;

        let reserves = host.reserves(kind)?;
        if reserves < amount {
            msg!("Pool holds {} {:?}, cannot pay out {}", reserves, kind, amount);
            return Err(LendingPoolError::InsufficientLiquidity.into());
        }

        self.require_claim_authority(host, kind)?;
        host.claim(kind).burn(&self.key, owner, amount)?;
        host.disburse(kind, owner, amount)?;

        *position = updated;
        self.config.collateral = collateral;
        self.config.last_update = now;

        msg!("Withdrew {} {:?} for {}", amount, kind, owner);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn withdraw_collateral_native<H: PoolHost>(
        &mut self,
        host: &mut H,
        owner: &Pubkey,
        position: &mut Position,
        amount: u64,
        attestation: &PriceAttestation,
        signature: &[u8],
        now: UnixTimestamp,
    ) -> ProgramResult {
        self.withdraw_collateral(host, AssetKind::Native, owner, position, amount, attestation, signature, now)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn withdraw_collateral_stable<H: PoolHost>(
        &mut self,
        host: &mut H,
        owner: &Pubkey,
        position: &mut Position,
        amount: u64,
        attestation: &PriceAttestation,
        signature: &[u8],
        now: UnixTimestamp,
    ) -> ProgramResult {
        self.withdraw_collateral(host, AssetKind::Stable, owner, position, amount, attestation, signature, now)
    }

    /// Pay out `amount` of `kind` against the borrower's collateral at the
    /// attested price.
    #[allow(clippy::too_many_arguments)]
    pub fn borrow<H: PoolHost>(
        &mut self,
        host: &mut H,
        borrower: &Pubkey,
        position: &mut Position,
        amount: u64,
        kind: AssetKind,
        attestation: &PriceAttestation,
        signature: &[u8],
        now: UnixTimestamp,
    ) -> ProgramResult {
        self.require_position_owner(position, borrower)?;

        let balances = self.account_balances(position);
        let adjusted = self
            .engine()
            .check_borrow_allowed(amount, kind, attestation, signature, &balances, now)?;

        let reserves = host.reserves(kind)?;
        if reserves < amount {
            msg!("Pool holds {} {:?}, cannot lend {}", reserves, kind, amount);
            return Err(LendingPoolError::InsufficientLiquidity.into());
        }

        let mut collateral = self.config.collateral;
        collateral.record_borrow(kind, amount)?;
        let mut updated = position.clone();
        updated.record_borrow(kind, amount, now)?;
        let total_borrows = self
            .config
            .total_borrows
            .checked_add(1)
            .ok_or(LendingPoolError::ArithmeticOverflow)?;

        host.disburse(kind, borrower, amount)?;

        *position = updated;
        self.config.collateral = collateral;
        self.config.total_borrows = total_borrows;
        self.config.last_update = now;

        msg!(
            "Borrowed {} {:?} for {}, debt now {} native / {} stable",
            amount,
            kind,
            borrower,
            adjusted.native_debt,
            adjusted.stable_debt
        );
        Ok(())
    }

    /// Invalidate `digest` for good. Any valid signature over it proves the
    /// right to revoke.
    pub fn revoke_signature(&mut self, digest: &Digest, signature: &[u8]) -> ProgramResult {
        let total_revocations = self
            .config
            .total_revocations
            .checked_add(1)
            .ok_or(LendingPoolError::ArithmeticOverflow)?;

        self.registry.revoke(&self.authority, digest, signature)?;
        self.config.total_revocations = total_revocations;

        msg!("Revoked digest, {} revocations total", total_revocations);
        Ok(())
    }

    pub fn is_revoked(&self, digest: &Digest) -> bool {
        self.registry.is_revoked(digest)
    }

    /// `(price, nonce)` of a fully validated attestation.
    pub fn check_signature(
        &self,
        attestation: &PriceAttestation,
        signature: &[u8],
        now: UnixTimestamp,
    ) -> Result<(U256, U256), ProgramError> {
        self.engine().authenticate(attestation, signature, now)?;
        Ok((attestation.price, attestation.nonce))
    }

    /// Identity that signed `digest`, whoever it is.
    pub fn verify_signature(&self, digest: &Digest, signature: &[u8]) -> Result<Address, ProgramError> {
        self.authority.verify(digest, signature)
    }
}
