use ethereum_types::U256;
use solana_program::{clock::UnixTimestamp, msg, program_error::ProgramError};

use crate::{
    attestation::{AttestationCodec, PriceAttestation},
    error::LendingPoolError,
    signature::{SignatureAuthority, SignatureScheme},
    state::{AssetKind, RevocationRegistry},
};

/// Attested exchange rate: one native unit is worth `price / scale` stable units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceQuote {
    pub price: U256,
    pub scale: U256,
}

impl PriceQuote {
    pub fn new(price: U256, scale: U256) -> Result<Self, ProgramError> {
        if scale.is_zero() {
            msg!("Attestation scale must be non-zero");
            return Err(LendingPoolError::InvalidAttestation.into());
        }

        Ok(Self { price, scale })
    }

    pub fn from_attestation(attestation: &PriceAttestation) -> Result<Self, ProgramError> {
        Self::new(attestation.price, attestation.scale)
    }

    /// Value of `amount` in stable units, truncated toward zero.
    pub fn value_of(&self, kind: AssetKind, amount: u64) -> Result<U256, ProgramError> {
        match kind {
            AssetKind::Native => Ok(U256::from(amount)
                .checked_mul(self.price)
                .ok_or(LendingPoolError::ArithmeticOverflow)?
                / self.scale),
            AssetKind::Stable => Ok(U256::from(amount)),
        }
    }
}

/// Collateral and debt of a single account, in native units of each asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountBalances {
    pub native_collateral: u64,
    pub stable_collateral: u64,
    pub native_debt: u64,
    pub stable_debt: u64,
}

impl AccountBalances {
    pub fn collateral(&self, kind: AssetKind) -> u64 {
        match kind {
            AssetKind::Native => self.native_collateral,
            AssetKind::Stable => self.stable_collateral,
        }
    }

    pub fn debt(&self, kind: AssetKind) -> u64 {
        match kind {
            AssetKind::Native => self.native_debt,
            AssetKind::Stable => self.stable_debt,
        }
    }

    /// Balances after borrowing `amount` more of `kind`.
    pub fn with_borrow(&self, kind: AssetKind, amount: u64) -> Result<Self, ProgramError> {
        let debt = self
            .debt(kind)
            .checked_add(amount)
            .ok_or(LendingPoolError::ArithmeticOverflow)?;

        let mut next = *self;
        match kind {
            AssetKind::Native => next.native_debt = debt,
            AssetKind::Stable => next.stable_debt = debt,
        }
        Ok(next)
    }

    /// Balances after withdrawing `amount` of `kind` collateral.
    pub fn with_withdrawal(&self, kind: AssetKind, amount: u64) -> Result<Self, ProgramError> {
        let collateral = self.collateral(kind).checked_sub(amount).ok_or_else(|| {
            msg!(
                "Withdrawal of {} exceeds deposited balance {}",
                amount,
                self.collateral(kind)
            );
            LendingPoolError::NotEnoughCollateral
        })?;

        let mut next = *self;
        match kind {
            AssetKind::Native => next.native_collateral = collateral,
            AssetKind::Stable => next.stable_collateral = collateral,
        }
        Ok(next)
    }
}

/// Collateral value in stable units. Each conversion truncates on its own.
pub fn collateral_value(quote: &PriceQuote, balances: &AccountBalances) -> Result<U256, ProgramError> {
    quote
        .value_of(AssetKind::Native, balances.native_collateral)?
        .checked_add(quote.value_of(AssetKind::Stable, balances.stable_collateral)?)
        .ok_or_else(|| LendingPoolError::ArithmeticOverflow.into())
}

pub fn debt_value(quote: &PriceQuote, balances: &AccountBalances) -> Result<U256, ProgramError> {
    quote
        .value_of(AssetKind::Native, balances.native_debt)?
        .checked_add(quote.value_of(AssetKind::Stable, balances.stable_debt)?)
        .ok_or_else(|| LendingPoolError::ArithmeticOverflow.into())
}

/// `debt × 100 ≤ collateral × max_ltv_percent`, inclusive.
pub fn is_within_ltv(collateral: U256, debt: U256, max_ltv_percent: u8) -> Result<bool, ProgramError> {
    let scaled_debt = debt
        .checked_mul(U256::from(100u8))
        .ok_or(LendingPoolError::ArithmeticOverflow)?;
    let scaled_collateral = collateral
        .checked_mul(U256::from(max_ltv_percent))
        .ok_or(LendingPoolError::ArithmeticOverflow)?;

    Ok(scaled_debt <= scaled_collateral)
}

/// Decides whether a borrow or withdrawal keeps an account under the LTV cap,
/// using only an authorized, unexpired, unrevoked price.
pub struct CollateralizationEngine<'a, S: SignatureScheme> {
    codec: AttestationCodec,
    authority: &'a SignatureAuthority<S>,
    registry: &'a RevocationRegistry,
    max_ltv_percent: u8,
}

impl<'a, S: SignatureScheme> CollateralizationEngine<'a, S> {
    pub fn new(
        codec: AttestationCodec,
        authority: &'a SignatureAuthority<S>,
        registry: &'a RevocationRegistry,
        max_ltv_percent: u8,
    ) -> Self {
        Self {
            codec,
            authority,
            registry,
            max_ltv_percent,
        }
    }

    /// Accept `attestation` only if the authorized reporter signed it for
    /// this pool and it is neither expired nor revoked.
    pub fn authenticate(
        &self,
        attestation: &PriceAttestation,
        signature: &[u8],
        now: UnixTimestamp,
    ) -> Result<PriceQuote, ProgramError> {
        let digest = self.codec.digest(attestation);

        if !self.authority.check_authorized(&digest, signature)? {
            msg!("Attestation not signed by the authorized reporter");
            return Err(LendingPoolError::InvalidSignature.into());
        }

        self.registry.validate(attestation, &digest, now)?;

        PriceQuote::from_attestation(attestation)
    }

    pub fn check_borrow_allowed(
        &self,
        amount: u64,
        kind: AssetKind,
        attestation: &PriceAttestation,
        signature: &[u8],
        balances: &AccountBalances,
        now: UnixTimestamp,
    ) -> Result<AccountBalances, ProgramError> {
        let quote = self.authenticate(attestation, signature, now)?;
        let adjusted = balances.with_borrow(kind, amount)?;
        self.ensure_within_ltv(&quote, &adjusted)?;
        Ok(adjusted)
    }

    pub fn check_withdraw_allowed(
        &self,
        amount: u64,
        kind: AssetKind,
        attestation: &PriceAttestation,
        signature: &[u8],
        balances: &AccountBalances,
        now: UnixTimestamp,
    ) -> Result<AccountBalances, ProgramError> {
        let quote = self.authenticate(attestation, signature, now)?;
        let adjusted = balances.with_withdrawal(kind, amount)?;
        self.ensure_within_ltv(&quote, &adjusted)?;
        Ok(adjusted)
    }

    pub fn ensure_within_ltv(
        &self,
        quote: &PriceQuote,
        balances: &AccountBalances,
    ) -> Result<(), ProgramError> {
        let collateral = collateral_value(quote, balances)?;
        let debt = debt_value(quote, balances)?;

        if !is_within_ltv(collateral, debt, self.max_ltv_percent)? {
            msg!(
                "LTV exceeded: debt {} against collateral {} at {}%",
                debt,
                collateral,
                self.max_ltv_percent
            );
            return Err(LendingPoolError::NotEnoughCollateral.into());
        }

        Ok(())
    }
}
