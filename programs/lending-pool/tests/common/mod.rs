#![allow(dead_code)]

use ethereum_types::{Address, U256};
use lending_pool::{
    attestation::{Digest, PriceAttestation},
    signature::address_from_pubkey,
};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

/// Price of the native asset in the reference fixtures: 0.237887 stable units.
pub const PRICE: u64 = 237_887;
pub const SCALE: u64 = 1_000_000;

/// Off-chain price reporter.
pub struct Reporter {
    secret: SecretKey,
    pub address: Address,
}

impl Reporter {
    pub fn new(seed: u8) -> Self {
        let secret = SecretKey::from_slice(&[seed; 32]).unwrap();
        let public = PublicKey::from_secret_key(&Secp256k1::new(), &secret).serialize_uncompressed();

        let mut key = [0u8; 64];
        key.copy_from_slice(&public[1..]);

        Self {
            secret,
            address: address_from_pubkey(&key),
        }
    }

    /// 65-byte `r ‖ s ‖ v` with `v` in {27, 28}.
    pub fn sign(&self, digest: &Digest) -> Vec<u8> {
        let message = Message::from_slice(digest.as_bytes()).unwrap();
        let (recovery_id, compact) = Secp256k1::new()
            .sign_ecdsa_recoverable(&message, &self.secret)
            .serialize_compact();

        let mut signature = compact.to_vec();
        signature.push(27 + recovery_id.to_i32() as u8);
        signature
    }
}

pub fn attestation(nonce: u64, price: u64, scale: u64, timestamp: u64) -> PriceAttestation {
    PriceAttestation::new(U256::from(nonce), U256::from(price), U256::from(scale), timestamp).unwrap()
}
