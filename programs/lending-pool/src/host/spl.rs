//! Lamports and SPL tokens, moved by CPI under the pool PDA's signature.

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    instruction::Instruction,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_option::COption,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};
use spl_token::{
    instruction as token_instruction,
    state::{Account as TokenAccount, Mint},
};

use crate::{
    error::LendingPoolError,
    host::PoolHost,
    state::{AssetKind, PoolConfig},
    token::ClaimToken,
};

/// Seeds of the pool PDA, which signs every outgoing transfer and mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSigner {
    pub authority: Pubkey,
    pub bump: u8,
}

impl PoolSigner {
    pub fn invoke_signed(&self, instruction: &Instruction, accounts: &[AccountInfo]) -> ProgramResult {
        let bump = [self.bump];
        let seeds: &[&[u8]] = &[PoolConfig::SEED, self.authority.as_ref(), &bump];
        invoke_signed(instruction, accounts, &[seeds])
    }
}

/// Unpack an SPL token account and check who it belongs to.
pub fn unpack_token_account(
    account: &AccountInfo,
    mint: &Pubkey,
    owner: &Pubkey,
) -> Result<TokenAccount, ProgramError> {
    if account.owner != &spl_token::id() {
        msg!("Token account not owned by the token program");
        return Err(ProgramError::IncorrectProgramId);
    }

    let token_account = TokenAccount::unpack(&account.try_borrow_data()?)?;

    if &token_account.mint != mint {
        msg!("Token account mint mismatch");
        return Err(ProgramError::InvalidAccountData);
    }

    if &token_account.owner != owner {
        msg!("Token account owner mismatch");
        return Err(LendingPoolError::InvalidAuthority.into());
    }

    Ok(token_account)
}

pub fn unpack_mint(account: &AccountInfo) -> Result<Mint, ProgramError> {
    if account.owner != &spl_token::id() {
        msg!("Mint not owned by the token program");
        return Err(ProgramError::IncorrectProgramId);
    }

    Mint::unpack(&account.try_borrow_data()?)
}

/// An SPL mint seen through the holder's token account for it.
pub struct SplClaimToken<'a, 'info> {
    signer: PoolSigner,
    pool: &'a AccountInfo<'info>,
    mint: &'a AccountInfo<'info>,
    holder: &'a AccountInfo<'info>,
    holder_account: &'a AccountInfo<'info>,
    token_program: &'a AccountInfo<'info>,
}

impl<'a, 'info> SplClaimToken<'a, 'info> {
    pub fn new(
        signer: PoolSigner,
        pool: &'a AccountInfo<'info>,
        mint: &'a AccountInfo<'info>,
        holder: &'a AccountInfo<'info>,
        holder_account: &'a AccountInfo<'info>,
        token_program: &'a AccountInfo<'info>,
    ) -> Self {
        Self {
            signer,
            pool,
            mint,
            holder,
            holder_account,
            token_program,
        }
    }

    fn require_owner(&self, caller: &Pubkey) -> ProgramResult {
        if self.owner()? != *caller {
            msg!("Pool is not the mint authority of {}", self.mint.key);
            return Err(LendingPoolError::ClaimAuthorityMissing.into());
        }
        Ok(())
    }
}

impl<'a, 'info> ClaimToken for SplClaimToken<'a, 'info> {
    fn owner(&self) -> Result<Pubkey, ProgramError> {
        match unpack_mint(self.mint)?.mint_authority {
            COption::Some(authority) => Ok(authority),
            COption::None => Ok(Pubkey::default()),
        }
    }

    fn balance_of(&self, holder: &Pubkey) -> Result<u64, ProgramError> {
        Ok(unpack_token_account(self.holder_account, self.mint.key, holder)?.amount)
    }

    fn mint(&mut self, caller: &Pubkey, to: &Pubkey, amount: u64) -> ProgramResult {
        self.require_owner(caller)?;
        unpack_token_account(self.holder_account, self.mint.key, to)?;

        self.signer.invoke_signed(
            &token_instruction::mint_to(
                self.token_program.key,
                self.mint.key,
                self.holder_account.key,
                self.pool.key,
                &[],
                amount,
            )?,
            &[
                self.mint.clone(),
                self.holder_account.clone(),
                self.pool.clone(),
                self.token_program.clone(),
            ],
        )
    }

    fn burn(&mut self, caller: &Pubkey, from: &Pubkey, amount: u64) -> ProgramResult {
        self.require_owner(caller)?;

        let account = unpack_token_account(self.holder_account, self.mint.key, from)?;
        if account.amount < amount {
            return Err(LendingPoolError::InsufficientBalance.into());
        }

        // the holder signed the outer transaction
        invoke(
            &token_instruction::burn(
                self.token_program.key,
                self.holder_account.key,
                self.mint.key,
                self.holder.key,
                &[],
                amount,
            )?,
            &[
                self.holder_account.clone(),
                self.mint.clone(),
                self.holder.clone(),
                self.token_program.clone(),
            ],
        )
    }

    fn transfer_ownership(&mut self, caller: &Pubkey, new_owner: &Pubkey) -> ProgramResult {
        if self.owner()? != *caller || caller != self.pool.key {
            return Err(LendingPoolError::InvalidAuthority.into());
        }

        self.signer.invoke_signed(
            &token_instruction::set_authority(
                self.token_program.key,
                self.mint.key,
                Some(new_owner),
                token_instruction::AuthorityType::MintTokens,
                self.pool.key,
                &[],
            )?,
            &[self.mint.clone(), self.pool.clone(), self.token_program.clone()],
        )
    }
}

/// On-chain host for one instruction's account set.
///
/// Native collateral is the pool PDA's lamports above rent exemption. The
/// stablecoin sits in a vault token account owned by the pool PDA and is
/// pulled in through an SPL delegate approval.
pub struct SplHost<'a, 'info> {
    signer: PoolSigner,
    pool: &'a AccountInfo<'info>,
    user: &'a AccountInfo<'info>,
    user_stable: &'a AccountInfo<'info>,
    stable_vault: &'a AccountInfo<'info>,
    stable_mint: Pubkey,
    token_program: &'a AccountInfo<'info>,
    system_program: &'a AccountInfo<'info>,
    native_claim: SplClaimToken<'a, 'info>,
    stable_claim: SplClaimToken<'a, 'info>,
}

#[allow(clippy::too_many_arguments)]
impl<'a, 'info> SplHost<'a, 'info> {
    pub fn new(
        signer: PoolSigner,
        pool: &'a AccountInfo<'info>,
        user: &'a AccountInfo<'info>,
        user_stable: &'a AccountInfo<'info>,
        stable_vault: &'a AccountInfo<'info>,
        stable_mint: Pubkey,
        token_program: &'a AccountInfo<'info>,
        system_program: &'a AccountInfo<'info>,
        native_claim: SplClaimToken<'a, 'info>,
        stable_claim: SplClaimToken<'a, 'info>,
    ) -> Self {
        Self {
            signer,
            pool,
            user,
            user_stable,
            stable_vault,
            stable_mint,
            token_program,
            system_program,
            native_claim,
            stable_claim,
        }
    }

    fn require_user(&self, party: &Pubkey) -> ProgramResult {
        if party != self.user.key {
            msg!("Transfer party {} is not the instruction signer", party);
            return Err(LendingPoolError::InvalidAuthority.into());
        }
        Ok(())
    }
}

impl<'a, 'info> PoolHost for SplHost<'a, 'info> {
    fn claim(&mut self, kind: AssetKind) -> &mut dyn ClaimToken {
        match kind {
            AssetKind::Native => &mut self.native_claim,
            AssetKind::Stable => &mut self.stable_claim,
        }
    }

    fn reserves(&self, kind: AssetKind) -> Result<u64, ProgramError> {
        match kind {
            AssetKind::Native => {
                let rent_exempt = Rent::get()?.minimum_balance(self.pool.data_len());
                Ok(self.pool.lamports().saturating_sub(rent_exempt))
            }
            AssetKind::Stable => {
                Ok(unpack_token_account(self.stable_vault, &self.stable_mint, self.pool.key)?.amount)
            }
        }
    }

    fn collect(&mut self, kind: AssetKind, from: &Pubkey, amount: u64) -> ProgramResult {
        self.require_user(from)?;

        match kind {
            AssetKind::Native => invoke(
                &system_instruction::transfer(self.user.key, self.pool.key, amount),
                &[
                    self.user.clone(),
                    self.pool.clone(),
                    self.system_program.clone(),
                ],
            ),
            AssetKind::Stable => {
                let source = unpack_token_account(self.user_stable, &self.stable_mint, from)?;

                let approved = match source.delegate {
                    COption::Some(delegate) if delegate == *self.pool.key => source.delegated_amount,
                    _ => 0,
                };
                if approved < amount {
                    msg!("Pool approved for {} of {} requested", approved, amount);
                    return Err(LendingPoolError::InsufficientAllowance.into());
                }
                if source.amount < amount {
                    return Err(LendingPoolError::InsufficientBalance.into());
                }

                self.signer.invoke_signed(
                    &token_instruction::transfer(
                        self.token_program.key,
                        self.user_stable.key,
                        self.stable_vault.key,
                        self.pool.key,
                        &[],
                        amount,
                    )?,
                    &[
                        self.user_stable.clone(),
                        self.stable_vault.clone(),
                        self.pool.clone(),
                        self.token_program.clone(),
                    ],
                )
            }
        }
    }

    fn disburse(&mut self, kind: AssetKind, to: &Pubkey, amount: u64) -> ProgramResult {
        self.require_user(to)?;

        match kind {
            AssetKind::Native => {
                let pool_lamports = self
                    .pool
                    .lamports()
                    .checked_sub(amount)
                    .ok_or(LendingPoolError::InsufficientLiquidity)?;
                let user_lamports = self
                    .user
                    .lamports()
                    .checked_add(amount)
                    .ok_or(LendingPoolError::ArithmeticOverflow)?;

                **self.pool.try_borrow_mut_lamports()? = pool_lamports;
                **self.user.try_borrow_mut_lamports()? = user_lamports;
                Ok(())
            }
            AssetKind::Stable => {
                unpack_token_account(self.user_stable, &self.stable_mint, to)?;

                self.signer.invoke_signed(
                    &token_instruction::transfer(
                        self.token_program.key,
                        self.stable_vault.key,
                        self.user_stable.key,
                        self.pool.key,
                        &[],
                        amount,
                    )?,
                    &[
                        self.stable_vault.clone(),
                        self.user_stable.clone(),
                        self.pool.clone(),
                        self.token_program.clone(),
                    ],
                )
            }
        }
    }
}
