use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke_signed, set_return_data},
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction, system_program,
    sysvar::{clock::Clock, Sysvar},
};

use crate::{
    attestation::{Digest, PriceAttestation},
    error::LendingPoolError,
    host::{
        spl::{unpack_mint, unpack_token_account},
        PoolSigner, SplClaimToken, SplHost,
    },
    instructions::LendingPoolInstruction,
    pool::LendingPool,
    signature::{Secp256k1Scheme, SignatureAuthority},
    state::{AssetKind, PoolConfig, Position, RevocationRegistry},
};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    let instruction = LendingPoolInstruction::unpack(instruction_data)?;

    match instruction {
        LendingPoolInstruction::InitializePool {
            authorized_signer,
            max_ltv_percent,
        } => {
            msg!("Instruction: InitializePool");
            process_initialize_pool(program_id, accounts, authorized_signer, max_ltv_percent)
        }

        LendingPoolInstruction::InitializePosition => {
            msg!("Instruction: InitializePosition");
            process_initialize_position(program_id, accounts)
        }

        LendingPoolInstruction::DepositCollateral { asset_kind, amount } => {
            msg!("Instruction: DepositCollateral");
            process_deposit_collateral(program_id, accounts, asset_kind, amount)
        }

        LendingPoolInstruction::WithdrawCollateral {
            asset_kind,
            amount,
            attestation,
            signature,
        } => {
            msg!("Instruction: WithdrawCollateral");
            process_withdraw_collateral(program_id, accounts, asset_kind, amount, &attestation, &signature)
        }

        LendingPoolInstruction::Borrow {
            asset_kind,
            amount,
            attestation,
            signature,
        } => {
            msg!("Instruction: Borrow");
            process_borrow(program_id, accounts, asset_kind, amount, &attestation, &signature)
        }

        LendingPoolInstruction::RevokeSignature { digest, signature } => {
            msg!("Instruction: RevokeSignature");
            process_revoke_signature(program_id, accounts, &digest, &signature)
        }

        LendingPoolInstruction::IsRevoked { digest } => {
            msg!("Instruction: IsRevoked");
            process_is_revoked(program_id, accounts, &digest)
        }

        LendingPoolInstruction::CheckSignature {
            attestation,
            signature,
        } => {
            msg!("Instruction: CheckSignature");
            process_check_signature(program_id, accounts, &attestation, &signature)
        }

        LendingPoolInstruction::VerifySignature { digest, signature } => {
            msg!("Instruction: VerifySignature");
            process_verify_signature(program_id, accounts, &digest, &signature)
        }
    }
}

/// Create the pool PDA and its revocation registry
fn process_initialize_pool(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    authorized_signer: [u8; 20],
    max_ltv_percent: u8,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let authority_info = next_account_info(account_info_iter)?;
    let pool_info = next_account_info(account_info_iter)?;
    let registry_info = next_account_info(account_info_iter)?;
    let native_claim_mint_info = next_account_info(account_info_iter)?;
    let stable_claim_mint_info = next_account_info(account_info_iter)?;
    let stable_mint_info = next_account_info(account_info_iter)?;
    let stable_vault_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;

    if !authority_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let (pool_key, pool_bump) = PoolConfig::find_address(authority_info.key, program_id);
    if pool_key != *pool_info.key {
        msg!("Pool account is not the expected PDA");
        return Err(LendingPoolError::InvalidPDA.into());
    }

    let (registry_key, registry_bump) = RevocationRegistry::find_address(&pool_key, program_id);
    if registry_key != *registry_info.key {
        msg!("Registry account is not the expected PDA");
        return Err(LendingPoolError::InvalidPDA.into());
    }

    if !pool_info.data_is_empty() || !registry_info.data_is_empty() {
        return Err(LendingPoolError::AccountAlreadyInitialized.into());
    }

    for mint_info in [native_claim_mint_info, stable_claim_mint_info, stable_mint_info] {
        unpack_mint(mint_info)?;
    }
    if native_claim_mint_info.key == stable_claim_mint_info.key {
        msg!("Claim mints must be distinct");
        return Err(LendingPoolError::InvalidConfiguration.into());
    }
    unpack_token_account(stable_vault_info, stable_mint_info.key, &pool_key)?;

    let mut config = PoolConfig::new(
        *authority_info.key,
        &pool_key,
        authorized_signer.into(),
        pool_bump,
    );
    config.native_claim_mint = *native_claim_mint_info.key;
    config.stable_claim_mint = *stable_claim_mint_info.key;
    config.stable_mint = *stable_mint_info.key;
    config.stable_vault = *stable_vault_info.key;
    config.max_ltv_percent = max_ltv_percent;
    config.last_update = Clock::get()?.unix_timestamp;
    config.validate()?;

    let pool_bump_seed = [pool_bump];
    create_pda_account(
        program_id,
        authority_info,
        pool_info,
        system_program_info,
        PoolConfig::LEN,
        &[PoolConfig::SEED, authority_info.key.as_ref(), &pool_bump_seed],
    )?;

    let registry_bump_seed = [registry_bump];
    create_pda_account(
        program_id,
        authority_info,
        registry_info,
        system_program_info,
        RevocationRegistry::LEN,
        &[RevocationRegistry::SEED, pool_key.as_ref(), &registry_bump_seed],
    )?;

    config.serialize(&mut &mut pool_info.data.borrow_mut()[..])?;
    RevocationRegistry::new(pool_key, registry_bump)
        .serialize(&mut &mut registry_info.data.borrow_mut()[..])?;

    msg!(
        "Pool initialized with signer {:?}, max LTV {}%",
        config.authorized_signer(),
        max_ltv_percent
    );

    Ok(())
}

/// Create the caller's position PDA
fn process_initialize_position(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let owner_info = next_account_info(account_info_iter)?;
    let pool_info = next_account_info(account_info_iter)?;
    let position_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;

    if !owner_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    load_pool(program_id, pool_info)?;

    let (position_key, bump) = Position::find_address(pool_info.key, owner_info.key, program_id);
    if position_key != *position_info.key {
        msg!("Position account is not the expected PDA");
        return Err(LendingPoolError::InvalidPDA.into());
    }

    if !position_info.data_is_empty() {
        return Err(LendingPoolError::AccountAlreadyInitialized.into());
    }

    let bump_seed = [bump];
    create_pda_account(
        program_id,
        owner_info,
        position_info,
        system_program_info,
        Position::LEN,
        &[
            Position::SEED,
            pool_info.key.as_ref(),
            owner_info.key.as_ref(),
            &bump_seed,
        ],
    )?;

    Position::new(*pool_info.key, *owner_info.key, bump)
        .serialize(&mut &mut position_info.data.borrow_mut()[..])?;

    msg!("Position initialized for {}", owner_info.key);
    Ok(())
}

fn process_deposit_collateral(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    asset_kind: u8,
    amount: u64,
) -> ProgramResult {
    let kind = AssetKind::from_selector(asset_kind)?;
    let accounts = PoolAccounts::parse(program_id, accounts)?;
    let now = Clock::get()?.unix_timestamp;

    let mut config = load_pool(program_id, accounts.pool)?;
    let mut registry = load_registry(program_id, accounts.registry, accounts.pool.key)?;
    let mut position = accounts.user_position(program_id)?;
    let mut host = accounts.host(&config)?;

    LendingPool::new(*accounts.pool.key, &mut config, &mut registry).deposit_collateral(
        &mut host,
        kind,
        accounts.user.key,
        &mut position,
        amount,
        now,
    )?;

    position.serialize(&mut &mut accounts.position.data.borrow_mut()[..])?;
    config.serialize(&mut &mut accounts.pool.data.borrow_mut()[..])?;
    Ok(())
}

fn process_withdraw_collateral(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    asset_kind: u8,
    amount: u64,
    attestation: &PriceAttestation,
    signature: &[u8],
) -> ProgramResult {
    let kind = AssetKind::from_selector(asset_kind)?;
    let accounts = PoolAccounts::parse(program_id, accounts)?;
    let now = Clock::get()?.unix_timestamp;

    let mut config = load_pool(program_id, accounts.pool)?;
    let mut registry = load_registry(program_id, accounts.registry, accounts.pool.key)?;
    let mut position = accounts.user_position(program_id)?;
    let mut host = accounts.host(&config)?;

    LendingPool::new(*accounts.pool.key, &mut config, &mut registry).withdraw_collateral(
        &mut host,
        kind,
        accounts.user.key,
        &mut position,
        amount,
        attestation,
        signature,
        now,
    )?;

    position.serialize(&mut &mut accounts.position.data.borrow_mut()[..])?;
    config.serialize(&mut &mut accounts.pool.data.borrow_mut()[..])?;
    Ok(())
}

fn process_borrow(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    asset_kind: u8,
    amount: u64,
    attestation: &PriceAttestation,
    signature: &[u8],
) -> ProgramResult {
    let kind = AssetKind::from_selector(asset_kind)?;
    let accounts = PoolAccounts::parse(program_id, accounts)?;
    let now = Clock::get()?.unix_timestamp;

    let mut config = load_pool(program_id, accounts.pool)?;
    let mut registry = load_registry(program_id, accounts.registry, accounts.pool.key)?;
    let mut position = accounts.user_position(program_id)?;
    let mut host = accounts.host(&config)?;

    LendingPool::new(*accounts.pool.key, &mut config, &mut registry).borrow(
        &mut host,
        accounts.user.key,
        &mut position,
        amount,
        kind,
        attestation,
        signature,
        now,
    )?;

    position.serialize(&mut &mut accounts.position.data.borrow_mut()[..])?;
    config.serialize(&mut &mut accounts.pool.data.borrow_mut()[..])?;
    Ok(())
}

fn process_revoke_signature(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    digest: &Digest,
    signature: &[u8],
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let caller_info = next_account_info(account_info_iter)?;
    let pool_info = next_account_info(account_info_iter)?;
    let registry_info = next_account_info(account_info_iter)?;

    if !caller_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut config = load_pool(program_id, pool_info)?;
    let mut registry = load_registry(program_id, registry_info, pool_info.key)?;

    LendingPool::new(*pool_info.key, &mut config, &mut registry).revoke_signature(digest, signature)?;

    registry.serialize(&mut &mut registry_info.data.borrow_mut()[..])?;
    config.serialize(&mut &mut pool_info.data.borrow_mut()[..])?;
    Ok(())
}

fn process_is_revoked(program_id: &Pubkey, accounts: &[AccountInfo], digest: &Digest) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let pool_info = next_account_info(account_info_iter)?;
    let registry_info = next_account_info(account_info_iter)?;

    load_pool(program_id, pool_info)?;
    let registry = load_registry(program_id, registry_info, pool_info.key)?;

    let revoked = registry.is_revoked(digest);
    set_return_data(&revoked.try_to_vec()?);

    msg!("Digest revoked: {}", revoked);
    Ok(())
}

fn process_check_signature(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    attestation: &PriceAttestation,
    signature: &[u8],
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let pool_info = next_account_info(account_info_iter)?;
    let registry_info = next_account_info(account_info_iter)?;

    let mut config = load_pool(program_id, pool_info)?;
    let mut registry = load_registry(program_id, registry_info, pool_info.key)?;
    let now = Clock::get()?.unix_timestamp;

    let (price, nonce) = LendingPool::new(*pool_info.key, &mut config, &mut registry)
        .check_signature(attestation, signature, now)?;

    let mut data = [0u8; 64];
    price.to_big_endian(&mut data[..32]);
    nonce.to_big_endian(&mut data[32..]);
    set_return_data(&data);

    msg!("Attestation valid: price {}, nonce {}", price, nonce);
    Ok(())
}

fn process_verify_signature(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    digest: &Digest,
    signature: &[u8],
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let pool_info = next_account_info(account_info_iter)?;

    let config = load_pool(program_id, pool_info)?;

    let signer = SignatureAuthority::new(Secp256k1Scheme, config.authorized_signer())
        .verify(digest, signature)?;
    set_return_data(signer.as_bytes());

    msg!("Signature recovers to {:?}", signer);
    Ok(())
}

/// Accounts shared by deposit, withdraw and borrow.
struct PoolAccounts<'a, 'info> {
    user: &'a AccountInfo<'info>,
    pool: &'a AccountInfo<'info>,
    position: &'a AccountInfo<'info>,
    registry: &'a AccountInfo<'info>,
    native_claim_mint: &'a AccountInfo<'info>,
    stable_claim_mint: &'a AccountInfo<'info>,
    user_native_claim: &'a AccountInfo<'info>,
    user_stable_claim: &'a AccountInfo<'info>,
    user_stable: &'a AccountInfo<'info>,
    stable_vault: &'a AccountInfo<'info>,
    token_program: &'a AccountInfo<'info>,
    system_program: &'a AccountInfo<'info>,
}

impl<'a, 'info> PoolAccounts<'a, 'info> {
    fn parse(program_id: &Pubkey, accounts: &'a [AccountInfo<'info>]) -> Result<Self, ProgramError> {
        let account_info_iter = &mut accounts.iter();

        let parsed = Self {
            user: next_account_info(account_info_iter)?,
            pool: next_account_info(account_info_iter)?,
            position: next_account_info(account_info_iter)?,
            registry: next_account_info(account_info_iter)?,
            native_claim_mint: next_account_info(account_info_iter)?,
            stable_claim_mint: next_account_info(account_info_iter)?,
            user_native_claim: next_account_info(account_info_iter)?,
            user_stable_claim: next_account_info(account_info_iter)?,
            user_stable: next_account_info(account_info_iter)?,
            stable_vault: next_account_info(account_info_iter)?,
            token_program: next_account_info(account_info_iter)?,
            system_program: next_account_info(account_info_iter)?,
        };

        if !parsed.user.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        if parsed.token_program.key != &spl_token::id()
            || parsed.system_program.key != &system_program::id()
        {
            return Err(ProgramError::IncorrectProgramId);
        }

        let (position_key, _) = Position::find_address(parsed.pool.key, parsed.user.key, program_id);
        if position_key != *parsed.position.key {
            msg!("Position account is not the expected PDA");
            return Err(LendingPoolError::InvalidPDA.into());
        }

        Ok(parsed)
    }

    fn user_position(&self, program_id: &Pubkey) -> Result<Position, ProgramError> {
        if self.position.data_is_empty() {
            msg!("{} has no position; call InitializePosition first", self.user.key);
            return Err(LendingPoolError::AccountNotInitialized.into());
        }
        load_position(program_id, self.position)
    }

    /// Host over these accounts, after checking they match the pool's config.
    fn host(&self, config: &PoolConfig) -> Result<SplHost<'a, 'info>, ProgramError> {
        if self.native_claim_mint.key != &config.native_claim_mint
            || self.stable_claim_mint.key != &config.stable_claim_mint
            || self.stable_vault.key != &config.stable_vault
        {
            msg!("Mint or vault does not match the pool configuration");
            return Err(ProgramError::InvalidAccountData);
        }

        let signer = PoolSigner {
            authority: config.authority,
            bump: config.bump,
        };

        Ok(SplHost::new(
            signer,
            self.pool,
            self.user,
            self.user_stable,
            self.stable_vault,
            config.stable_mint,
            self.token_program,
            self.system_program,
            SplClaimToken::new(
                signer,
                self.pool,
                self.native_claim_mint,
                self.user,
                self.user_native_claim,
                self.token_program,
            ),
            SplClaimToken::new(
                signer,
                self.pool,
                self.stable_claim_mint,
                self.user,
                self.user_stable_claim,
                self.token_program,
            ),
        ))
    }
}

fn create_pda_account<'info>(
    program_id: &Pubkey,
    payer: &AccountInfo<'info>,
    account: &AccountInfo<'info>,
    system_program_info: &AccountInfo<'info>,
    space: usize,
    seeds: &[&[u8]],
) -> ProgramResult {
    let lamports = Rent::get()?.minimum_balance(space);

    invoke_signed(
        &system_instruction::create_account(payer.key, account.key, lamports, space as u64, program_id),
        &[payer.clone(), account.clone(), system_program_info.clone()],
        &[seeds],
    )
}

fn deserialize_account<T: BorshDeserialize>(
    program_id: &Pubkey,
    info: &AccountInfo,
) -> Result<T, ProgramError> {
    if info.owner != program_id {
        return Err(ProgramError::IncorrectProgramId);
    }

    if info.data_is_empty() {
        return Err(LendingPoolError::AccountNotInitialized.into());
    }

    // accounts are allocated at their maximum size, so trailing bytes are expected
    T::deserialize(&mut &info.data.borrow()[..]).map_err(|_| ProgramError::InvalidAccountData)
}

pub fn load_pool(program_id: &Pubkey, info: &AccountInfo) -> Result<PoolConfig, ProgramError> {
    let config: PoolConfig = deserialize_account(program_id, info)?;
    config.validate()?;

    let expected = Pubkey::create_program_address(
        &[PoolConfig::SEED, config.authority.as_ref(), &[config.bump]],
        program_id,
    )
    .map_err(|_| LendingPoolError::InvalidPDA)?;
    if expected != *info.key {
        msg!("Pool account is not the expected PDA");
        return Err(LendingPoolError::InvalidPDA.into());
    }

    Ok(config)
}

pub fn load_registry(
    program_id: &Pubkey,
    info: &AccountInfo,
    pool: &Pubkey,
) -> Result<RevocationRegistry, ProgramError> {
    let registry: RevocationRegistry = deserialize_account(program_id, info)?;
    registry.validate_account()?;

    if registry.pool != *pool {
        msg!("Registry belongs to another pool");
        return Err(LendingPoolError::InvalidPDA.into());
    }

    Ok(registry)
}

pub fn load_position(program_id: &Pubkey, info: &AccountInfo) -> Result<Position, ProgramError> {
    let position: Position = deserialize_account(program_id, info)?;
    position.validate()?;
    Ok(position)
}
