mod common;

use common::{attestation, Reporter, PRICE, SCALE};
use ethereum_types::U256;
use lending_pool::{
    attestation::{Digest, PriceAttestation},
    error::LendingPoolError,
    host::{MemoryHost, PoolHost},
    pool::LendingPool,
    signature::{Secp256k1Scheme, SignatureAuthority},
    state::{AssetKind, PoolConfig, Position, RevocationRegistry},
    token::ClaimToken,
};
use proptest::prelude::*;
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

const NOW: i64 = 1_700_000_000;
const EXPIRY: u64 = 1_700_000_100;

struct Fixture {
    key: Pubkey,
    deployer: Pubkey,
    user: Pubkey,
    reporter: Reporter,
    config: PoolConfig,
    registry: RevocationRegistry,
    host: MemoryHost,
    position: Position,
}

impl Fixture {
    /// Pool that owns both claim tokens; the user holds 1000 of each asset.
    fn new() -> Self {
        let mut fixture = Self::without_claim_authority();
        let key = fixture.key;
        let deployer = fixture.deployer;
        fixture.host.native_claim.transfer_ownership(&deployer, &key).unwrap();
        fixture.host.stable_claim.transfer_ownership(&deployer, &key).unwrap();
        fixture
    }

    fn without_claim_authority() -> Self {
        let key = Pubkey::new_unique();
        let deployer = Pubkey::new_unique();
        let user = Pubkey::new_unique();
        let reporter = Reporter::new(0x11);

        let config = PoolConfig::new(deployer, &key, reporter.address, 255);
        let registry = RevocationRegistry::new(key, 254);
        let mut host = MemoryHost::new(key, deployer);
        host.fund(AssetKind::Native, &user, 1_000).unwrap();
        host.fund(AssetKind::Stable, &user, 1_000).unwrap();
        let position = Position::new(key, user, 253);

        Self {
            key,
            deployer,
            user,
            reporter,
            config,
            registry,
            host,
            position,
        }
    }

    fn pool(&mut self) -> (LendingPool<'_>, &mut MemoryHost, &mut Position) {
        (
            LendingPool::new(self.key, &mut self.config, &mut self.registry),
            &mut self.host,
            &mut self.position,
        )
    }

    /// A priced attestation signed by the authorized reporter for this pool.
    fn signed(&mut self, price: u64, scale: u64) -> (PriceAttestation, Vec<u8>) {
        let att = attestation(1, price, scale, EXPIRY);
        let digest = self.pool().0.digest(&att);
        (att, self.reporter.sign(&digest))
    }

    fn deposit(&mut self, kind: AssetKind, amount: u64) -> Result<(), ProgramError> {
        let user = self.user;
        if kind == AssetKind::Stable {
            let pool = self.key;
            self.host.stablecoin.approve(&user, &pool, amount);
        }
        let (mut pool, host, position) = self.pool();
        pool.deposit_collateral(host, kind, &user, position, amount, NOW)
    }

    fn borrow(
        &mut self,
        kind: AssetKind,
        amount: u64,
        att: &PriceAttestation,
        signature: &[u8],
        now: i64,
    ) -> Result<(), ProgramError> {
        let user = self.user;
        let (mut pool, host, position) = self.pool();
        pool.borrow(host, &user, position, amount, kind, att, signature, now)
    }

    fn withdraw(
        &mut self,
        kind: AssetKind,
        amount: u64,
        att: &PriceAttestation,
        signature: &[u8],
    ) -> Result<(), ProgramError> {
        let user = self.user;
        let (mut pool, host, position) = self.pool();
        pool.withdraw_collateral(host, kind, &user, position, amount, att, signature, NOW)
    }

    fn balance(&self, kind: AssetKind, holder: &Pubkey) -> u64 {
        self.host.asset(kind).balance(holder)
    }

    fn claims(&self, kind: AssetKind, holder: &Pubkey) -> u64 {
        self.host.claim_ledger(kind).balance(holder)
    }
}

#[test]
fn test_deposit_mints_claims_one_to_one() {
    let mut fx = Fixture::new();
    let user = fx.user;

    fx.deposit(AssetKind::Native, 100).unwrap();
    fx.deposit(AssetKind::Stable, 100).unwrap();

    assert_eq!(fx.claims(AssetKind::Native, &user), 100);
    assert_eq!(fx.claims(AssetKind::Stable, &user), 100);
    assert_eq!(fx.balance(AssetKind::Native, &user), 900);
    assert_eq!(fx.balance(AssetKind::Stable, &user), 900);
    assert_eq!(fx.position.native_deposited, 100);
    assert_eq!(fx.position.stable_deposited, 100);
    assert_eq!(fx.config.collateral.native.deposited, 100);
    assert_eq!(fx.config.collateral.stable.claim_supply, 100);
    assert_eq!(fx.host.native_claim.name, "Wrapped Native");
    assert_eq!(fx.host.stable_claim.symbol, "WUSD");
}

#[test]
fn test_borrow_stable_under_ltv() {
    let mut fx = Fixture::new();
    let (user, key) = (fx.user, fx.key);
    fx.host.fund(AssetKind::Stable, &key, 70).unwrap();

    fx.deposit(AssetKind::Native, 430).unwrap();
    let (att, signature) = fx.signed(PRICE, SCALE);
    fx.borrow(AssetKind::Stable, 70, &att, &signature, NOW).unwrap();

    assert_eq!(fx.balance(AssetKind::Stable, &key), 0);
    assert_eq!(fx.balance(AssetKind::Stable, &user), 1_070);
    assert_eq!(fx.position.stable_borrowed, 70);
    assert_eq!(fx.position.last_borrow_timestamp, NOW);
    assert_eq!(fx.config.total_borrows, 1);
    assert_eq!(fx.config.collateral.stable.borrowed, 70);
}

#[test]
fn test_borrow_stable_over_ltv() {
    let mut fx = Fixture::new();
    let (user, key) = (fx.user, fx.key);
    fx.host.fund(AssetKind::Stable, &key, 70).unwrap();

    fx.deposit(AssetKind::Native, 420).unwrap();
    let (att, signature) = fx.signed(PRICE, SCALE);

    assert_eq!(
        fx.borrow(AssetKind::Stable, 70, &att, &signature, NOW),
        Err(LendingPoolError::NotEnoughCollateral.into())
    );
    assert_eq!(fx.balance(AssetKind::Stable, &key), 70);
    assert_eq!(fx.balance(AssetKind::Stable, &user), 1_000);
    assert_eq!(fx.position.stable_borrowed, 0);
    assert_eq!(fx.config.total_borrows, 0);
}

#[test]
fn test_borrow_native_against_stable() {
    let mut fx = Fixture::new();
    let (user, key) = (fx.user, fx.key);

    // another lender supplies the native liquidity
    let lender = Pubkey::new_unique();
    let mut lender_position = Position::new(key, lender, 252);
    fx.host.fund(AssetKind::Native, &lender, 500).unwrap();
    {
        let (mut pool, host, _) = fx.pool();
        pool.deposit_collateral_native(host, &lender, &mut lender_position, 500, NOW)
            .unwrap();
    }
    assert_eq!(lender_position.native_deposited, 500);

    fx.deposit(AssetKind::Stable, 100).unwrap();
    let (att, signature) = fx.signed(PRICE, SCALE);

    assert_eq!(
        fx.borrow(AssetKind::Native, 300, &att, &signature, NOW),
        Err(LendingPoolError::NotEnoughCollateral.into())
    );
    assert_eq!(fx.balance(AssetKind::Native, &key), 500);

    fx.borrow(AssetKind::Native, 290, &att, &signature, NOW).unwrap();
    assert_eq!(fx.balance(AssetKind::Native, &key), 210);
    assert_eq!(fx.balance(AssetKind::Native, &user), 1_290);
    assert_eq!(fx.position.native_borrowed, 290);
}

#[test]
fn test_withdraw_full_deposit() {
    for kind in AssetKind::ALL {
        let mut fx = Fixture::new();
        let user = fx.user;
        fx.deposit(kind, 500).unwrap();
        let (att, signature) = fx.signed(PRICE, SCALE);

        fx.withdraw(kind, 500, &att, &signature).unwrap();

        assert_eq!(fx.claims(kind, &user), 0);
        assert_eq!(fx.balance(kind, &user), 1_000);
        assert_eq!(fx.position.deposited(kind), 0);
        assert_eq!(fx.config.collateral.asset(kind).deposited, 0);
        assert_eq!(fx.host.claim_ledger(kind).total_supply(), 0);
    }
}

#[test]
fn test_withdraw_more_than_deposited() {
    for kind in AssetKind::ALL {
        let mut fx = Fixture::new();
        let user = fx.user;
        fx.deposit(kind, 500).unwrap();
        let (att, signature) = fx.signed(PRICE, SCALE);

        assert_eq!(
            fx.withdraw(kind, 501, &att, &signature),
            Err(LendingPoolError::NotEnoughCollateral.into())
        );
        assert_eq!(fx.claims(kind, &user), 500);
        assert_eq!(fx.balance(kind, &user), 500);
        assert_eq!(fx.position.deposited(kind), 500);
    }
}

#[test]
fn test_withdraw_blocked_by_debt() {
    let mut fx = Fixture::new();
    let key = fx.key;
    fx.host.fund(AssetKind::Stable, &key, 70).unwrap();
    fx.deposit(AssetKind::Native, 430).unwrap();

    let (att, signature) = fx.signed(PRICE, SCALE);
    fx.borrow(AssetKind::Stable, 70, &att, &signature, NOW).unwrap();

    // 420 native left would be worth 99 stable
    assert_eq!(
        fx.withdraw(AssetKind::Native, 10, &att, &signature),
        Err(LendingPoolError::NotEnoughCollateral.into())
    );
    assert_eq!(fx.claims(AssetKind::Native, &fx.user.clone()), 430);
}

#[test]
fn test_transferred_claims_do_not_carry_collateral() {
    let mut fx = Fixture::new();
    let (user, key) = (fx.user, fx.key);
    fx.host.fund(AssetKind::Stable, &key, 70).unwrap();
    fx.deposit(AssetKind::Native, 430).unwrap();

    let (att, signature) = fx.signed(PRICE, SCALE);
    fx.borrow(AssetKind::Stable, 70, &att, &signature, NOW).unwrap();

    let other = Pubkey::new_unique();
    let mut other_position = Position::new(key, other, 252);
    fx.host.native_claim.transfer(&user, &other, 430).unwrap();

    {
        let (mut pool, host, _) = fx.pool();
        assert_eq!(
            pool.withdraw_collateral_native(host, &other, &mut other_position, 430, &att, &signature, NOW),
            Err(LendingPoolError::NotEnoughCollateral.into())
        );
    }
    assert_eq!(fx.balance(AssetKind::Native, &other), 0);
    assert_eq!(fx.balance(AssetKind::Native, &key), 430);
    assert_eq!(fx.claims(AssetKind::Native, &other), 430);
    assert_eq!(fx.position.native_deposited, 430);
    assert_eq!(fx.position.stable_borrowed, 70);
}

#[test]
fn test_withdraw_needs_claims_in_hand() {
    let mut fx = Fixture::new();
    let (user, key) = (fx.user, fx.key);
    fx.deposit(AssetKind::Native, 500).unwrap();
    fx.host.native_claim.transfer(&user, &Pubkey::new_unique(), 200).unwrap();

    let (att, signature) = fx.signed(PRICE, SCALE);
    assert_eq!(
        fx.withdraw(AssetKind::Native, 500, &att, &signature),
        Err(LendingPoolError::InsufficientBalance.into())
    );
    assert_eq!(fx.position.native_deposited, 500);
    assert_eq!(fx.balance(AssetKind::Native, &key), 500);
    assert_eq!(fx.config.collateral.native.deposited, 500);

    fx.withdraw(AssetKind::Native, 300, &att, &signature).unwrap();
    assert_eq!(fx.position.native_deposited, 200);
    assert_eq!(fx.balance(AssetKind::Native, &user), 800);
}

#[test]
fn test_revoked_signature_is_rejected() {
    let mut fx = Fixture::new();
    let key = fx.key;
    fx.host.fund(AssetKind::Stable, &key, 70).unwrap();
    fx.deposit(AssetKind::Native, 430).unwrap();

    let (att, signature) = fx.signed(PRICE, SCALE);
    let digest = fx.pool().0.digest(&att);

    {
        let (mut pool, _, _) = fx.pool();
        assert!(!pool.is_revoked(&digest));
        pool.revoke_signature(&digest, &signature).unwrap();
        assert!(pool.is_revoked(&digest));
        assert_eq!(
            pool.revoke_signature(&digest, &signature),
            Err(LendingPoolError::AlreadyRevoked.into())
        );
    }
    assert_eq!(fx.config.total_revocations, 1);

    assert_eq!(
        fx.borrow(AssetKind::Stable, 70, &att, &signature, NOW),
        Err(LendingPoolError::InvalidSignature.into())
    );
    assert_eq!(fx.balance(AssetKind::Stable, &key), 70);
}

#[test]
fn test_revocation_requires_valid_signature() {
    let mut fx = Fixture::new();
    let digest = Digest([3u8; 32]);

    let (mut pool, _, _) = fx.pool();
    assert_eq!(
        pool.revoke_signature(&digest, &[0u8; 65]),
        Err(LendingPoolError::InvalidSignature.into())
    );
    assert!(!pool.is_revoked(&digest));
}

#[test]
fn test_expired_attestation() {
    let mut fx = Fixture::new();
    let key = fx.key;
    fx.host.fund(AssetKind::Stable, &key, 70).unwrap();
    fx.deposit(AssetKind::Native, 430).unwrap();

    let (att, signature) = fx.signed(PRICE, SCALE);

    assert_eq!(
        fx.borrow(AssetKind::Stable, 70, &att, &signature, EXPIRY as i64 + 1),
        Err(LendingPoolError::Expired.into())
    );
    fx.borrow(AssetKind::Stable, 70, &att, &signature, EXPIRY as i64).unwrap();
}

#[test]
fn test_unauthorized_reporter() {
    let mut fx = Fixture::new();
    let key = fx.key;
    fx.host.fund(AssetKind::Stable, &key, 70).unwrap();
    fx.deposit(AssetKind::Native, 430).unwrap();

    let att = attestation(1, PRICE, SCALE, EXPIRY);
    let digest = fx.pool().0.digest(&att);
    let forged = Reporter::new(0x22).sign(&digest);

    assert_eq!(
        fx.borrow(AssetKind::Stable, 70, &att, &forged, NOW),
        Err(LendingPoolError::InvalidSignature.into())
    );
}

#[test]
fn test_attestation_is_bound_to_pool() {
    let mut pool_a = Fixture::new();
    let mut pool_b = Fixture::new();
    let key_b = pool_b.key;
    pool_b.host.fund(AssetKind::Stable, &key_b, 70).unwrap();
    pool_b.deposit(AssetKind::Native, 430).unwrap();

    let (att, signature) = pool_a.signed(PRICE, SCALE);
    assert_ne!(pool_a.pool().0.digest(&att), pool_b.pool().0.digest(&att));

    assert_eq!(
        pool_b.borrow(AssetKind::Stable, 70, &att, &signature, NOW),
        Err(LendingPoolError::InvalidSignature.into())
    );
}

#[test]
fn test_deposit_needs_claim_authority() {
    let mut fx = Fixture::without_claim_authority();
    let user = fx.user;

    assert_eq!(
        fx.deposit(AssetKind::Native, 100),
        Err(LendingPoolError::ClaimAuthorityMissing.into())
    );
    assert_eq!(fx.balance(AssetKind::Native, &user), 1_000);
    assert_eq!(fx.config.collateral.native.deposited, 0);
}

#[test]
fn test_stable_deposit_needs_allowance() {
    let mut fx = Fixture::new();
    let user = fx.user;

    let (mut pool, host, position) = fx.pool();
    assert_eq!(
        pool.deposit_collateral_stable(host, &user, position, 100, NOW),
        Err(LendingPoolError::InsufficientAllowance.into())
    );
    assert_eq!(fx.position.stable_deposited, 0);
    assert_eq!(fx.claims(AssetKind::Stable, &user), 0);
    assert_eq!(fx.config.collateral.stable.deposited, 0);
}

#[test]
fn test_borrow_needs_liquidity() {
    let mut fx = Fixture::new();
    fx.deposit(AssetKind::Native, 1_000).unwrap();
    let (att, signature) = fx.signed(PRICE, SCALE);

    assert_eq!(
        fx.borrow(AssetKind::Stable, 10, &att, &signature, NOW),
        Err(LendingPoolError::InsufficientLiquidity.into())
    );
    assert_eq!(fx.position.stable_borrowed, 0);
}

#[test]
fn test_borrow_requires_own_position() {
    let mut fx = Fixture::new();
    let key = fx.key;
    fx.host.fund(AssetKind::Stable, &key, 70).unwrap();
    fx.deposit(AssetKind::Native, 430).unwrap();
    fx.position.owner = Pubkey::new_unique();

    let (att, signature) = fx.signed(PRICE, SCALE);
    assert_eq!(
        fx.borrow(AssetKind::Stable, 70, &att, &signature, NOW),
        Err(LendingPoolError::InvalidAuthority.into())
    );
}

#[test]
fn test_zero_scale_is_rejected() {
    let mut fx = Fixture::new();
    let key = fx.key;
    fx.host.fund(AssetKind::Stable, &key, 70).unwrap();
    fx.deposit(AssetKind::Native, 430).unwrap();

    let (att, signature) = fx.signed(PRICE, 0);
    assert_eq!(
        fx.borrow(AssetKind::Stable, 70, &att, &signature, NOW),
        Err(LendingPoolError::InvalidAttestation.into())
    );
}

#[test]
fn test_check_signature() {
    let mut fx = Fixture::new();
    let att = attestation(420, PRICE, SCALE, EXPIRY);
    let digest = fx.pool().0.digest(&att);
    let signature = fx.reporter.sign(&digest);

    let (mut pool, _, _) = fx.pool();
    assert_eq!(
        pool.check_signature(&att, &signature, NOW).unwrap(),
        (U256::from(PRICE), U256::from(420u64))
    );

    pool.revoke_signature(&digest, &signature).unwrap();
    assert_eq!(
        pool.check_signature(&att, &signature, NOW),
        Err(LendingPoolError::InvalidSignature.into())
    );
}

#[test]
fn test_verify_signature() {
    let mut fx = Fixture::new();
    let digest = Digest([7u8; 32]);
    let other = Reporter::new(0x33);
    let signature = other.sign(&digest);

    let (pool, _, _) = fx.pool();
    assert_eq!(pool.verify_signature(&digest, &signature).unwrap(), other.address);

    let forged = [
        "6732801029378ddf837210000397c68129387fd887839708320980942102910a",
        "6732801029378ddf837210000397c68129387fd887839708320980942102910a",
        "00",
    ]
    .concat();
    let forged: Vec<u8> = (0..forged.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&forged[i..i + 2], 16).unwrap())
        .collect();
    assert_eq!(
        pool.verify_signature(&digest, &forged),
        Err(LendingPoolError::InvalidSignature.into())
    );
}

#[test]
fn test_host_reserves_track_deposits() {
    let mut fx = Fixture::new();
    fx.deposit(AssetKind::Native, 250).unwrap();
    assert_eq!(fx.host.reserves(AssetKind::Native).unwrap(), 250);
    assert_eq!(fx.host.claim(AssetKind::Native).owner().unwrap(), fx.key);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_flipped_bit_never_authorizes(byte in 0usize..65, bit in 0u8..8) {
        let reporter = Reporter::new(0x11);
        let authority = SignatureAuthority::new(Secp256k1Scheme, reporter.address);
        let digest = Digest([0x5a; 32]);

        let mut signature = reporter.sign(&digest);
        prop_assert!(authority.check_authorized(&digest, &signature).unwrap());

        signature[byte] ^= 1 << bit;
        match authority.check_authorized(&digest, &signature) {
            Ok(authorized) => prop_assert!(!authorized),
            Err(e) => prop_assert_eq!(e, ProgramError::from(LendingPoolError::InvalidSignature)),
        }
    }
}
