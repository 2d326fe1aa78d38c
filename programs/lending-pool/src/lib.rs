// Attested-price collateralized lending pool
// Native Solana implementation - NO ANCHOR

pub mod attestation;
pub mod engine;
pub mod error;
pub mod host;
pub mod instructions;
pub mod pool;
pub mod processor;
pub mod signature;
pub mod state;
pub mod token;

#[cfg(not(feature = "no-entrypoint"))]
use solana_program::entrypoint;

#[cfg(not(feature = "no-entrypoint"))]
use processor::process_instruction;

solana_program::declare_id!("LendPoo111111111111111111111111111111111111");

#[cfg(not(feature = "no-entrypoint"))]
entrypoint!(process_instruction);
