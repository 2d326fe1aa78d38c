use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::{
    attestation::{Digest, PriceAttestation},
    state::{AssetKind, PoolConfig, Position, RevocationRegistry},
};

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum LendingPoolInstruction {
    /// Create the pool and its revocation registry
    /// Accounts:
    /// 0. `[signer, writable]` Authority (payer)
    /// 1. `[writable]` Pool PDA
    /// 2. `[writable]` Registry PDA
    /// 3. `[]` Native claim mint
    /// 4. `[]` Stable claim mint
    /// 5. `[]` Stablecoin mint
    /// 6. `[]` Stablecoin vault, owned by the pool PDA
    /// 7. `[]` System program
    InitializePool {
        authorized_signer: [u8; 20],
        max_ltv_percent: u8,
    },

    /// Create the caller's debt position
    /// Accounts:
    /// 0. `[signer, writable]` Owner (payer)
    /// 1. `[]` Pool PDA
    /// 2. `[writable]` Position PDA
    /// 3. `[]` System program
    InitializePosition,

    /// Deposit collateral and receive claims 1:1
    /// Accounts: see [`pool_accounts`]
    DepositCollateral {
        asset_kind: u8,
        amount: u64,
    },

    /// Burn claims and take the collateral back
    /// Accounts: see [`pool_accounts`]
    WithdrawCollateral {
        asset_kind: u8,
        amount: u64,
        attestation: PriceAttestation,
        signature: Vec<u8>,
    },

    /// Borrow against deposited collateral
    /// Accounts: see [`pool_accounts`]
    Borrow {
        asset_kind: u8,
        amount: u64,
        attestation: PriceAttestation,
        signature: Vec<u8>,
    },

    /// Permanently invalidate a signed digest
    /// Accounts:
    /// 0. `[signer]` Caller
    /// 1. `[writable]` Pool PDA
    /// 2. `[writable]` Registry PDA
    RevokeSignature {
        digest: Digest,
        signature: Vec<u8>,
    },

    /// Return data: borsh `bool`
    /// Accounts:
    /// 0. `[]` Pool PDA
    /// 1. `[]` Registry PDA
    IsRevoked {
        digest: Digest,
    },

    /// Return data: price and nonce as 32-byte big-endian words
    /// Accounts:
    /// 0. `[]` Pool PDA
    /// 1. `[]` Registry PDA
    CheckSignature {
        attestation: PriceAttestation,
        signature: Vec<u8>,
    },

    /// Return data: 20-byte signer identity
    /// Accounts:
    /// 0. `[]` Pool PDA
    VerifySignature {
        digest: Digest,
        signature: Vec<u8>,
    },
}

impl LendingPoolInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (&variant, rest) = input
            .split_first()
            .ok_or(ProgramError::InvalidInstructionData)?;

        Ok(match variant {
            0 => {
                let payload = InitializePoolPayload::try_from_slice(rest)?;
                Self::InitializePool {
                    authorized_signer: payload.authorized_signer,
                    max_ltv_percent: payload.max_ltv_percent,
                }
            }
            1 => Self::InitializePosition,
            2 => {
                let payload = DepositPayload::try_from_slice(rest)?;
                Self::DepositCollateral {
                    asset_kind: payload.asset_kind,
                    amount: payload.amount,
                }
            }
            3 => {
                let payload = AttestedPayload::try_from_slice(rest)?;
                Self::WithdrawCollateral {
                    asset_kind: payload.asset_kind,
                    amount: payload.amount,
                    attestation: payload.attestation,
                    signature: payload.signature,
                }
            }
            4 => {
                let payload = AttestedPayload::try_from_slice(rest)?;
                Self::Borrow {
                    asset_kind: payload.asset_kind,
                    amount: payload.amount,
                    attestation: payload.attestation,
                    signature: payload.signature,
                }
            }
            5 => {
                let payload = DigestSignaturePayload::try_from_slice(rest)?;
                Self::RevokeSignature {
                    digest: payload.digest,
                    signature: payload.signature,
                }
            }
            6 => Self::IsRevoked {
                digest: Digest::try_from_slice(rest)?,
            },
            7 => {
                let payload = CheckSignaturePayload::try_from_slice(rest)?;
                Self::CheckSignature {
                    attestation: payload.attestation,
                    signature: payload.signature,
                }
            }
            8 => {
                let payload = DigestSignaturePayload::try_from_slice(rest)?;
                Self::VerifySignature {
                    digest: payload.digest,
                    signature: payload.signature,
                }
            }
            _ => return Err(ProgramError::InvalidInstructionData),
        })
    }

    /// Tag byte followed by the borsh payload, as read by [`Self::unpack`].
    pub fn pack(&self) -> Vec<u8> {
        // borsh writes the enum tag as a single byte in declaration order
        self.try_to_vec().unwrap_or_default()
    }
}

#[derive(BorshSerialize, BorshDeserialize)]
struct InitializePoolPayload {
    authorized_signer: [u8; 20],
    max_ltv_percent: u8,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct DepositPayload {
    asset_kind: u8,
    amount: u64,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct AttestedPayload {
    asset_kind: u8,
    amount: u64,
    attestation: PriceAttestation,
    signature: Vec<u8>,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct DigestSignaturePayload {
    digest: Digest,
    signature: Vec<u8>,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct CheckSignaturePayload {
    attestation: PriceAttestation,
    signature: Vec<u8>,
}

/// Accounts every deposit, withdrawal and borrow takes, in order.
#[derive(Debug, Clone, Copy)]
pub struct PoolAccountKeys {
    pub user: Pubkey,
    pub pool: Pubkey,
    pub native_claim_mint: Pubkey,
    pub stable_claim_mint: Pubkey,
    pub user_native_claim: Pubkey,
    pub user_stable_claim: Pubkey,
    pub user_stable: Pubkey,
    pub stable_vault: Pubkey,
}

/// 0. `[signer, writable]` User
/// 1. `[writable]` Pool PDA
/// 2. `[writable]` Position PDA (may be uninitialized for deposits and withdrawals)
/// 3. `[]` Registry PDA
/// 4. `[writable]` Native claim mint
/// 5. `[writable]` Stable claim mint
/// 6. `[writable]` User's native claim token account
/// 7. `[writable]` User's stable claim token account
/// 8. `[writable]` User's stablecoin token account
/// 9. `[writable]` Stablecoin vault
/// 10. `[]` Token program
/// 11. `[]` System program
pub fn pool_accounts(program_id: &Pubkey, keys: &PoolAccountKeys) -> Vec<AccountMeta> {
    let (position, _) = Position::find_address(&keys.pool, &keys.user, program_id);
    let (registry, _) = RevocationRegistry::find_address(&keys.pool, program_id);

    vec![
        AccountMeta::new(keys.user, true),
        AccountMeta::new(keys.pool, false),
        AccountMeta::new(position, false),
        AccountMeta::new_readonly(registry, false),
        AccountMeta::new(keys.native_claim_mint, false),
        AccountMeta::new(keys.stable_claim_mint, false),
        AccountMeta::new(keys.user_native_claim, false),
        AccountMeta::new(keys.user_stable_claim, false),
        AccountMeta::new(keys.user_stable, false),
        AccountMeta::new(keys.stable_vault, false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(system_program::id(), false),
    ]
}

// Helper functions to create instructions
#[allow(clippy::too_many_arguments)]
pub fn initialize_pool(
    program_id: &Pubkey,
    authority: &Pubkey,
    native_claim_mint: &Pubkey,
    stable_claim_mint: &Pubkey,
    stable_mint: &Pubkey,
    stable_vault: &Pubkey,
    authorized_signer: [u8; 20],
    max_ltv_percent: u8,
) -> Instruction {
    let (pool, _) = PoolConfig::find_address(authority, program_id);
    let (registry, _) = RevocationRegistry::find_address(&pool, program_id);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*authority, true),
            AccountMeta::new(pool, false),
            AccountMeta::new(registry, false),
            AccountMeta::new_readonly(*native_claim_mint, false),
            AccountMeta::new_readonly(*stable_claim_mint, false),
            AccountMeta::new_readonly(*stable_mint, false),
            AccountMeta::new_readonly(*stable_vault, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: LendingPoolInstruction::InitializePool {
            authorized_signer,
            max_ltv_percent,
        }
        .pack(),
    }
}

pub fn initialize_position(program_id: &Pubkey, owner: &Pubkey, pool: &Pubkey) -> Instruction {
    let (position, _) = Position::find_address(pool, owner, program_id);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new_readonly(*pool, false),
            AccountMeta::new(position, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: LendingPoolInstruction::InitializePosition.pack(),
    }
}

pub fn deposit_collateral(
    program_id: &Pubkey,
    keys: &PoolAccountKeys,
    asset_kind: AssetKind,
    amount: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: pool_accounts(program_id, keys),
        data: LendingPoolInstruction::DepositCollateral {
            asset_kind: asset_kind.selector(),
            amount,
        }
        .pack(),
    }
}

pub fn deposit_collateral_native(program_id: &Pubkey, keys: &PoolAccountKeys, amount: u64) -> Instruction {
    deposit_collateral(program_id, keys, AssetKind::Native, amount)
}

/// The pool must already be an approved delegate of `keys.user_stable`.
pub fn deposit_collateral_stable(program_id: &Pubkey, keys: &PoolAccountKeys, amount: u64) -> Instruction {
    deposit_collateral(program_id, keys, AssetKind::Stable, amount)
}

pub fn withdraw_collateral(
    program_id: &Pubkey,
    keys: &PoolAccountKeys,
    asset_kind: AssetKind,
    amount: u64,
    attestation: PriceAttestation,
    signature: Vec<u8>,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: pool_accounts(program_id, keys),
        data: LendingPoolInstruction::WithdrawCollateral {
            asset_kind: asset_kind.selector(),
            amount,
            attestation,
            signature,
        }
        .pack(),
    }
}

pub fn borrow(
    program_id: &Pubkey,
    keys: &PoolAccountKeys,
    asset_kind: AssetKind,
    amount: u64,
    attestation: PriceAttestation,
    signature: Vec<u8>,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: pool_accounts(program_id, keys),
        data: LendingPoolInstruction::Borrow {
            asset_kind: asset_kind.selector(),
            amount,
            attestation,
            signature,
        }
        .pack(),
    }
}

pub fn revoke_signature(
    program_id: &Pubkey,
    caller: &Pubkey,
    pool: &Pubkey,
    digest: Digest,
    signature: Vec<u8>,
) -> Instruction {
    let (registry, _) = RevocationRegistry::find_address(pool, program_id);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*caller, true),
            AccountMeta::new(*pool, false),
            AccountMeta::new(registry, false),
        ],
        data: LendingPoolInstruction::RevokeSignature { digest, signature }.pack(),
    }
}

pub fn is_revoked(program_id: &Pubkey, pool: &Pubkey, digest: Digest) -> Instruction {
    let (registry, _) = RevocationRegistry::find_address(pool, program_id);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*pool, false),
            AccountMeta::new_readonly(registry, false),
        ],
        data: LendingPoolInstruction::IsRevoked { digest }.pack(),
    }
}

pub fn check_signature(
    program_id: &Pubkey,
    pool: &Pubkey,
    attestation: PriceAttestation,
    signature: Vec<u8>,
) -> Instruction {
    let (registry, _) = RevocationRegistry::find_address(pool, program_id);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*pool, false),
            AccountMeta::new_readonly(registry, false),
        ],
        data: LendingPoolInstruction::CheckSignature {
            attestation,
            signature,
        }
        .pack(),
    }
}

pub fn verify_signature(program_id: &Pubkey, pool: &Pubkey, digest: Digest, signature: Vec<u8>) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(*pool, false)],
        data: LendingPoolInstruction::VerifySignature { digest, signature }.pack(),
    }
}

/// Hand a claim mint's authority to the pool PDA, signed by its current holder.
pub fn transfer_claim_ownership(
    claim_mint: &Pubkey,
    current_authority: &Pubkey,
    pool: &Pubkey,
) -> Result<Instruction, ProgramError> {
    spl_token::instruction::set_authority(
        &spl_token::id(),
        claim_mint,
        Some(pool),
        spl_token::instruction::AuthorityType::MintTokens,
        current_authority,
        &[],
    )
}
