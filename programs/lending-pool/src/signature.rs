//! Signer recovery and the single authorized price reporter.

use arrayref::{array_ref, array_refs};
use ethereum_types::Address;
use solana_program::{
    msg,
    program_error::ProgramError,
    secp256k1_recover::secp256k1_recover,
};

use crate::{
    attestation::{keccak256, Digest},
    error::LendingPoolError,
};

/// `r ‖ s ‖ v`
pub const SIGNATURE_LEN: usize = 65;

/// `n / 2` for the secp256k1 group order; larger `s` values are malleated.
const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

/// Recovers the identity that produced `signature` over `digest`.
///
/// Implementations reject malformed input with
/// [`LendingPoolError::InvalidSignature`].
pub trait SignatureScheme {
    fn recover(&self, digest: &Digest, signature: &[u8]) -> Result<Address, ProgramError>;
}

/// Ethereum-style recoverable ECDSA over secp256k1, using the runtime's
/// `secp256k1_recover` syscall.
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Scheme;

impl SignatureScheme for Secp256k1Scheme {
    fn recover(&self, digest: &Digest, signature: &[u8]) -> Result<Address, ProgramError> {
        if signature.len() != SIGNATURE_LEN {
            msg!("Invalid signature length: {}", signature.len());
            return Err(LendingPoolError::InvalidSignature.into());
        }

        let signature = array_ref![signature, 0, SIGNATURE_LEN];
        let (rs, v) = array_refs![signature, 64, 1];
        let s = array_ref![rs, 32, 32];

        let recovery_id = match v[0] {
            27 | 28 => v[0] - 27,
            other => {
                msg!("Invalid signature recovery byte: {}", other);
                return Err(LendingPoolError::InvalidSignature.into());
            }
        };

        if s > &SECP256K1_HALF_ORDER {
            msg!("Non-canonical signature: s above half order");
            return Err(LendingPoolError::InvalidSignature.into());
        }

        let pubkey = secp256k1_recover(digest.as_bytes(), recovery_id, rs).map_err(|e| {
            msg!("Secp256k1 recovery failed: {:?}", e);
            LendingPoolError::InvalidSignature
        })?;

        Ok(address_from_pubkey(&pubkey.0))
    }
}

/// Ethereum address of an uncompressed public key (`x ‖ y`, no prefix byte).
pub fn address_from_pubkey(pubkey: &[u8; 64]) -> Address {
    let hash = keccak256(&[pubkey]);
    Address::from_slice(&hash[12..])
}

/// Checks signatures against the pool's authorized reporter.
#[derive(Debug, Clone)]
pub struct SignatureAuthority<S: SignatureScheme = Secp256k1Scheme> {
    scheme: S,
    authorized_signer: Address,
}

impl<S: SignatureScheme> SignatureAuthority<S> {
    pub fn new(scheme: S, authorized_signer: Address) -> Self {
        Self {
            scheme,
            authorized_signer,
        }
    }

    pub fn authorized_signer(&self) -> &Address {
        &self.authorized_signer
    }

    /// Recovers the signer, failing closed on malformed signatures or the
    /// zero identity.
    pub fn verify(&self, digest: &Digest, signature: &[u8]) -> Result<Address, ProgramError> {
        let signer = self.scheme.recover(digest, signature)?;

        if signer.is_zero() {
            msg!("Signature recovers to the zero address");
            return Err(LendingPoolError::InvalidSignature.into());
        }

        Ok(signer)
    }

    /// `Ok(false)` when a well-formed signature comes from someone else.
    pub fn check_authorized(&self, digest: &Digest, signature: &[u8]) -> Result<bool, ProgramError> {
        let signer = self.verify(digest, signature)?;
        Ok(signer == self.authorized_signer)
    }
}
