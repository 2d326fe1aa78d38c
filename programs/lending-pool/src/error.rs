use num_derive::FromPrimitive;
use solana_program::{
    decode_error::DecodeError,
    program_error::{PrintProgramError, ProgramError},
};
use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, FromPrimitive, PartialEq, Eq)]
pub enum LendingPoolError {
    #[error("Invalid instruction")]
    InvalidInstruction = 0,

    #[error("Account not initialized")]
    AccountNotInitialized = 1,

    #[error("Account already initialized")]
    AccountAlreadyInitialized = 2,

    #[error("Invalid authority")]
    InvalidAuthority = 3,

    #[error("Invalid PDA")]
    InvalidPDA = 4,

    /// Malformed signature, signer mismatch, or revoked digest.
    #[error("Invalid signature")]
    InvalidSignature = 5,

    #[error("Attestation expired")]
    Expired = 6,

    #[error("Signature already revoked")]
    AlreadyRevoked = 7,

    /// LTV cap or deposited balance check failed.
    #[error("Not enough collateral")]
    NotEnoughCollateral = 8,

    #[error("Invalid attestation")]
    InvalidAttestation = 9,

    #[error("Revocation registry full")]
    RegistryFull = 10,

    #[error("Invalid asset kind")]
    InvalidAssetKind = 11,

    #[error("Pool does not own the claim token")]
    ClaimAuthorityMissing = 12,

    #[error("Insufficient token balance")]
    InsufficientBalance = 13,

    #[error("Insufficient allowance")]
    InsufficientAllowance = 14,

    #[error("Insufficient pool liquidity")]
    InsufficientLiquidity = 15,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow = 16,

    #[error("Invalid pool configuration")]
    InvalidConfiguration = 17,
}

impl PrintProgramError for LendingPoolError {
    fn print<E>(&self) {
        use solana_program::msg;
        msg!("LendingPoolError: {}", self);
    }
}

impl From<LendingPoolError> for ProgramError {
    fn from(e: LendingPoolError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for LendingPoolError {
    fn type_of() -> &'static str {
        "LendingPoolError"
    }
}
