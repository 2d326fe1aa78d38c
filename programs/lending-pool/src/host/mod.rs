//! Where collateral and claims actually live.
//!
//! [`LendingPool`](crate::pool::LendingPool) decides; a [`PoolHost`] moves
//! assets. [`SplHost`] does it with lamports and SPL tokens inside the
//! program, [`MemoryHost`] with in-memory ledgers.

pub mod memory;
pub mod spl;

pub use memory::MemoryHost;
pub use spl::{PoolSigner, SplClaimToken, SplHost};

use solana_program::{entrypoint::ProgramResult, program_error::ProgramError, pubkey::Pubkey};

use crate::{state::AssetKind, token::ClaimToken};

pub trait PoolHost {
    /// Claim token minted against deposits of `kind`.
    fn claim(&mut self, kind: AssetKind) -> &mut dyn ClaimToken;

    /// Amount of `kind` the pool can pay out right now.
    fn reserves(&self, kind: AssetKind) -> Result<u64, ProgramError>;

    /// Move `amount` of `kind` from `from` into the pool.
    fn collect(&mut self, kind: AssetKind, from: &Pubkey, amount: u64) -> ProgramResult;

    /// Move `amount` of `kind` from the pool to `to`.
    fn disburse(&mut self, kind: AssetKind, to: &Pubkey, amount: u64) -> ProgramResult;
}
