use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    clock::UnixTimestamp,
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::{
    attestation::{Digest, PriceAttestation},
    error::LendingPoolError,
    signature::{SignatureAuthority, SignatureScheme},
};

/// Digests that must never again influence collateralization math.
///
/// Append-only. Entries are kept sorted so lookups are a binary search.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct RevocationRegistry {
    /// Account discriminator
    pub discriminator: [u8; 8],

    /// Is initialized
    pub is_initialized: bool,

    /// Pool this registry belongs to
    pub pool: Pubkey,

    /// Revoked digests, ascending
    pub revoked: Vec<Digest>,

    /// Registry PDA bump
    pub bump: u8,
}

impl RevocationRegistry {
    pub const DISCRIMINATOR: [u8; 8] = *b"REVOKED_";

    pub const SEED: &'static [u8] = b"registry";

    pub const MAX_ENTRIES: usize = 256;

    pub const LEN: usize = 8 + // discriminator
        1 + // is_initialized
        32 + // pool
        4 + (Self::MAX_ENTRIES * 32) + // revoked
        1; // bump

    pub fn new(pool: Pubkey, bump: u8) -> Self {
        Self {
            discriminator: Self::DISCRIMINATOR,
            is_initialized: true,
            pool,
            revoked: Vec::new(),
            bump,
        }
    }

    pub fn find_address(pool: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[Self::SEED, pool.as_ref()], program_id)
    }

    pub fn validate_account(&self) -> Result<(), ProgramError> {
        if self.discriminator != Self::DISCRIMINATOR {
            return Err(ProgramError::InvalidAccountData);
        }

        if !self.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }

        Ok(())
    }

    pub fn is_revoked(&self, digest: &Digest) -> bool {
        self.revoked.binary_search(digest).is_ok()
    }

    /// Revoke `digest`, proven by any valid signature over it.
    pub fn revoke<S: SignatureScheme>(
        &mut self,
        authority: &SignatureAuthority<S>,
        digest: &Digest,
        signature: &[u8],
    ) -> Result<(), ProgramError> {
        authority.verify(digest, signature)?;

        let position = match self.revoked.binary_search(digest) {
            Ok(_) => return Err(LendingPoolError::AlreadyRevoked.into()),
            Err(position) => position,
        };

        if self.revoked.len() >= Self::MAX_ENTRIES {
            msg!("Revocation registry full: {} entries", self.revoked.len());
            return Err(LendingPoolError::RegistryFull.into());
        }

        self.revoked.insert(position, *digest);
        Ok(())
    }

    /// Gate an attestation on expiry and revocation.
    ///
    /// A revoked digest surfaces as `InvalidSignature`, same as a forged one.
    pub fn validate(
        &self,
        attestation: &PriceAttestation,
        digest: &Digest,
        now: UnixTimestamp,
    ) -> Result<(), ProgramError> {
        if attestation.is_expired(now) {
            msg!("Attestation expired at {}, now {}", attestation.timestamp, now);
            return Err(LendingPoolError::Expired.into());
        }

        if self.is_revoked(digest) {
            msg!("Attestation digest has been revoked");
            return Err(LendingPoolError::InvalidSignature.into());
        }

        Ok(())
    }
}
