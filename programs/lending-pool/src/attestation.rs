//! Price attestations and their EIP-712 style digest.
//!
//! The reporter signs `keccak256(0x19 0x01 ‖ domainSeparator ‖ structHash)`
//! off-chain. Type strings, field order and integer widths below are the wire
//! contract with that signer; changing any of them invalidates every
//! signature already issued.

use std::io::{self, Read, Write};

use borsh::{BorshDeserialize, BorshSerialize};
use ethereum_types::{Address, U256};
use sha3::{Digest as _, Keccak256};
use solana_program::{clock::UnixTimestamp, program_error::ProgramError};

use crate::error::LendingPoolError;

pub const DOMAIN_NAME: &str = "LilCompound";
pub const DOMAIN_VERSION: &str = "1.0";

pub const DOMAIN_TYPE: &str = "EIP712Domain(string name,string version,address verifyingContract)";

/// `multipliedBy` is the wire name of [`PriceAttestation::scale`].
pub const ATTESTATION_TYPE: &str =
    "SignatureContent(uint256 nonce,uint256 price,uint256 multipliedBy,uint40 timestamp)";

/// Largest value representable as `uint40`.
pub const MAX_TIMESTAMP: u64 = (1 << 40) - 1;

/// Keccak-256 over the concatenation of `chunks`.
pub fn keccak256(chunks: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    hasher.finalize().into()
}

/// Fixed-size fingerprint of an attestation bound to one pool.
#[derive(
    BorshSerialize, BorshDeserialize, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Signed statement of a price and its expiration.
///
/// The native asset is worth `price / scale` stable units while
/// `timestamp` (unix seconds) has not passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceAttestation {
    pub nonce: U256,
    pub price: U256,
    pub scale: U256,
    pub timestamp: u64,
}

impl PriceAttestation {
    pub fn new(nonce: U256, price: U256, scale: U256, timestamp: u64) -> Result<Self, ProgramError> {
        if timestamp > MAX_TIMESTAMP {
            return Err(LendingPoolError::InvalidAttestation.into());
        }

        Ok(Self {
            nonce,
            price,
            scale,
            timestamp,
        })
    }

    pub fn is_expired(&self, now: UnixTimestamp) -> bool {
        now > self.timestamp as i64
    }
}

impl BorshSerialize for PriceAttestation {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&encode_uint256(&self.nonce))?;
        writer.write_all(&encode_uint256(&self.price))?;
        writer.write_all(&encode_uint256(&self.scale))?;
        self.timestamp.serialize(writer)
    }
}

impl BorshDeserialize for PriceAttestation {
    fn deserialize_reader<R: Read>(reader: &mut R) -> io::Result<Self> {
        let nonce = U256::from_big_endian(&<[u8; 32]>::deserialize_reader(reader)?);
        let price = U256::from_big_endian(&<[u8; 32]>::deserialize_reader(reader)?);
        let scale = U256::from_big_endian(&<[u8; 32]>::deserialize_reader(reader)?);
        let timestamp = u64::deserialize_reader(reader)?;

        if timestamp > MAX_TIMESTAMP {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "attestation timestamp exceeds 40 bits",
            ));
        }

        Ok(Self {
            nonce,
            price,
            scale,
            timestamp,
        })
    }
}

/// Computes attestation digests for a single verifying contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttestationCodec {
    domain_separator: [u8; 32],
}

impl AttestationCodec {
    pub fn new(verifying_contract: &Address) -> Self {
        let domain_separator = keccak256(&[
            &keccak256(&[DOMAIN_TYPE.as_bytes()]),
            &keccak256(&[DOMAIN_NAME.as_bytes()]),
            &keccak256(&[DOMAIN_VERSION.as_bytes()]),
            &encode_address(verifying_contract),
        ]);

        Self { domain_separator }
    }

    pub fn domain_separator(&self) -> &[u8; 32] {
        &self.domain_separator
    }

    /// `hashStruct(SignatureContent)`
    pub fn struct_hash(attestation: &PriceAttestation) -> [u8; 32] {
        keccak256(&[
            &keccak256(&[ATTESTATION_TYPE.as_bytes()]),
            &encode_uint256(&attestation.nonce),
            &encode_uint256(&attestation.price),
            &encode_uint256(&attestation.scale),
            &encode_uint64(attestation.timestamp),
        ])
    }

    pub fn digest(&self, attestation: &PriceAttestation) -> Digest {
        Digest(keccak256(&[
            &[0x19, 0x01],
            &self.domain_separator,
            &Self::struct_hash(attestation),
        ]))
    }
}

/// Digest of `attestation` as signed for `verifying_contract`.
pub fn digest(attestation: &PriceAttestation, verifying_contract: &Address) -> Digest {
    AttestationCodec::new(verifying_contract).digest(attestation)
}

fn encode_address(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

fn encode_uint256(value: &U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

// uint40 is left-padded like any other uint
fn encode_uint64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}
