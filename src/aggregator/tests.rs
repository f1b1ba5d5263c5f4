//! Aggregation and verification tests

use super::*;
use crate::error::{ErrorCode, SafeError, UncoveredAccount};
use crate::hasher::OperationHasher;
use crate::request::AuthorizationRequest;
use crate::signer::{
    EcdsaKeySigner, KeyRing, KeySigner, PasskeySigner, WebAuthnSignerFactory,
};
use crate::tree::{AccountConfig, AccountNode, AccountSnapshot, Owner, OwnerConfig, OwnershipTree};
use ethers_core::types::{Address, U256};
use p256::ecdsa::SigningKey;

const CHAIN_ID: u64 = 11155111;

fn account(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

fn ecdsa(seed: u8) -> EcdsaKeySigner {
    let mut secret = [0u8; 32];
    secret[0] = 0x42;
    secret[31] = seed;
    EcdsaKeySigner::from_bytes(&secret).unwrap()
}

fn factory() -> WebAuthnSignerFactory {
    WebAuthnSignerFactory::new(Address::repeat_byte(0xfa), vec![0x60, 0x80, 0x60, 0x40])
}

fn request() -> AuthorizationRequest {
    AuthorizationRequest::new(Address::repeat_byte(0xde), U256::from(1000), vec![0xca, 0xfe])
        .with_nonce(7u64)
}

fn key_account(address: Address, threshold: usize, keys: &[&EcdsaKeySigner]) -> AccountConfig {
    AccountConfig::new(
        address,
        threshold,
        keys.iter().map(|k| OwnerConfig::key(k.address())).collect(),
    )
}

fn tree(root: Address, accounts: Vec<AccountConfig>) -> OwnershipTree {
    let snapshot = AccountSnapshot {
        chain_id: CHAIN_ID,
        root,
        accounts,
    };
    OwnershipTree::build(&snapshot, &factory()).unwrap()
}

fn ring(signers: Vec<EcdsaKeySigner>) -> KeyRing {
    signers.into_iter().fold(KeyRing::new(), |ring, s| ring.with(s))
}

#[test]
fn test_single_key_signature_is_raw_signature() {
    let key = ecdsa(1);
    let tree = tree(account(0xa0), vec![key_account(account(0xa0), 1, &[&key])]);
    let factory = factory();
    let aggregator = SignatureAggregator::new(&tree, &factory);

    let hash = OperationHasher::hash(account(0xa0), CHAIN_ID, &request());
    let raw = key.sign_hash(hash).unwrap();

    let signature = aggregator
        .aggregate(account(0xa0), &request(), &ring(vec![ecdsa(1)]))
        .unwrap();
    assert_eq!(signature.to_bytes(), raw);

    let err = aggregator
        .aggregate(account(0xa0), &request(), &KeyRing::new())
        .unwrap_err();
    assert_eq!(
        err,
        SafeError::InsufficientSignatures {
            account: account(0xa0),
            depth: 0,
            collected: 0,
            threshold: 1,
            uncovered: vec![],
        }
    );
}

#[test]
fn test_two_nested_accounts_each_sign_their_own_hash() {
    let (b, c) = (ecdsa(2), ecdsa(3));
    let tree = tree(
        account(0xa0),
        vec![
            AccountConfig::new(
                account(0xa0),
                2,
                vec![OwnerConfig::account(account(0xb0)), OwnerConfig::account(account(0xc0))],
            ),
            key_account(account(0xb0), 1, &[&b]),
            key_account(account(0xc0), 1, &[&c]),
        ],
    );
    let factory = factory();
    let aggregator = SignatureAggregator::new(&tree, &factory);

    let err = aggregator
        .aggregate(account(0xa0), &request(), &ring(vec![ecdsa(2)]))
        .unwrap_err();
    assert_eq!(err.account(), Some(account(0xa0)));
    assert_eq!(err.deficit(), Some(1));

    let signature = aggregator
        .aggregate(account(0xa0), &request(), &ring(vec![ecdsa(2), ecdsa(3)]))
        .unwrap();
    assert_eq!(signature.owners(), vec![account(0xb0), account(0xc0)]);

    let b_hash = OperationHasher::hash(account(0xb0), CHAIN_ID, &request());
    assert_eq!(
        signature.components()[0],
        Component::Contract {
            owner: account(0xb0),
            data: b.sign_hash(b_hash).unwrap(),
        }
    );

    let verifier = SignatureVerifier::new(&tree, &factory);
    assert!(verifier
        .verify(account(0xa0), &request(), &signature.to_bytes(), None)
        .is_ok());
}

#[test]
fn test_shortfall_names_uncovered_nested_accounts() {
    let (b1, b2, c1) = (ecdsa(6), ecdsa(7), ecdsa(8));
    let accounts = |root_threshold| {
        vec![
            AccountConfig::new(
                account(0xa0),
                root_threshold,
                vec![OwnerConfig::account(account(0xb0)), OwnerConfig::account(account(0xc0))],
            ),
            key_account(account(0xb0), 2, &[&b1, &b2]),
            key_account(account(0xc0), 1, &[&c1]),
        ]
    };
    let factory = factory();
    let keys = ring(vec![ecdsa(6), ecdsa(8)]);

    let strict = tree(account(0xa0), accounts(2));
    let err = SignatureAggregator::new(&strict, &factory)
        .aggregate(account(0xa0), &request(), &keys)
        .unwrap_err();
    assert_eq!(err.account(), Some(account(0xa0)));
    assert_eq!(err.deficit(), Some(1));
    assert_eq!(
        err.uncovered(),
        &[UncoveredAccount {
            account: account(0xb0),
            depth: 1,
            deficit: 1,
        }]
    );
    assert!(err.to_string().contains("needs 1 more"));

    // The same shortfall is tolerated once the parent reaches its threshold
    let lenient = tree(account(0xa0), accounts(1));
    let signature = SignatureAggregator::new(&lenient, &factory)
        .aggregate(account(0xa0), &request(), &keys)
        .unwrap();
    assert_eq!(signature.owners(), vec![account(0xc0)]);
}

#[test]
fn test_shortfall_reports_grandchildren() {
    let (c1, c2) = (ecdsa(9), ecdsa(10));
    let tree = tree(
        account(0xa0),
        vec![
            AccountConfig::new(account(0xa0), 1, vec![OwnerConfig::account(account(0xb0))]),
            AccountConfig::new(account(0xb0), 1, vec![OwnerConfig::account(account(0xc0))]),
            key_account(account(0xc0), 2, &[&c1, &c2]),
        ],
    );
    let factory = factory();
    let err = SignatureAggregator::new(&tree, &factory)
        .aggregate(account(0xa0), &request(), &ring(vec![ecdsa(9)]))
        .unwrap_err();

    let uncovered: Vec<(Address, usize, usize)> = err
        .uncovered()
        .iter()
        .map(|u| (u.account, u.depth, u.deficit))
        .collect();
    assert_eq!(uncovered, vec![(account(0xb0), 1, 1), (account(0xc0), 2, 1)]);
}

#[test]
fn test_three_level_composite() {
    let (d, e) = (ecdsa(4), ecdsa(5));
    let (root, middle) = (account(0xa0), account(0xb0));
    let tree = tree(
        root,
        vec![
            AccountConfig::new(
                root,
                2,
                vec![OwnerConfig::account(middle), OwnerConfig::key(d.address())],
            ),
            key_account(middle, 1, &[&e]),
        ],
    );
    let factory = factory();
    let aggregator = SignatureAggregator::new(&tree, &factory);

    let signature = aggregator
        .aggregate(root, &request(), &ring(vec![ecdsa(5), ecdsa(4)]))
        .unwrap();
    assert_eq!(signature.len(), 2);

    let middle_hash = OperationHasher::hash(middle, CHAIN_ID, &request());
    let root_hash = OperationHasher::hash(root, CHAIN_ID, &request());
    let middle_component = Component::Contract {
        owner: middle,
        data: e.sign_hash(middle_hash).unwrap(),
    };
    let direct_component = Component::Ecdsa {
        owner: d.address(),
        signature: d.sign_hash(root_hash).unwrap(),
    };
    assert!(signature.components().contains(&middle_component));
    assert!(signature.components().contains(&direct_component));

    let verifier = SignatureVerifier::new(&tree, &factory);
    let bytes = signature.to_bytes();
    assert!(verifier.verify(root, &request(), &bytes, None).is_ok());

    // The same bytes are bound to this request
    let other = request().with_nonce(8u64);
    assert!(verifier.verify(root, &other, &bytes, None).is_err());
}

#[test]
fn test_components_sorted_regardless_of_key_order() {
    let signers = [ecdsa(6), ecdsa(7), ecdsa(8)];
    let tree = tree(
        account(0xa0),
        vec![key_account(account(0xa0), 3, &[&signers[0], &signers[1], &signers[2]])],
    );
    let factory = factory();
    let aggregator = SignatureAggregator::new(&tree, &factory);

    let forward = aggregator
        .aggregate(account(0xa0), &request(), &ring(vec![ecdsa(6), ecdsa(7), ecdsa(8)]))
        .unwrap();
    let reverse = aggregator
        .aggregate(account(0xa0), &request(), &ring(vec![ecdsa(8), ecdsa(7), ecdsa(6)]))
        .unwrap();

    assert_eq!(forward.to_bytes(), reverse.to_bytes());
    let owners = forward.owners();
    assert!(owners.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn test_aggregation_is_monotonic() {
    let (b1, b2, c1) = (ecdsa(9), ecdsa(10), ecdsa(11));
    let tree = tree(
        account(0xa0),
        vec![
            AccountConfig::new(
                account(0xa0),
                2,
                vec![OwnerConfig::account(account(0xb0)), OwnerConfig::account(account(0xc0))],
            ),
            key_account(account(0xb0), 2, &[&b1, &b2]),
            key_account(account(0xc0), 1, &[&c1]),
        ],
    );
    let factory = factory();
    let aggregator = SignatureAggregator::new(&tree, &factory);

    let only_c = aggregator
        .aggregate(account(0xa0), &request(), &ring(vec![ecdsa(11)]))
        .unwrap_err();
    assert_eq!(only_c.deficit(), Some(1));

    // One of b0's two keys does not complete b0, so a0 is still one short
    let plus_b1 = aggregator
        .aggregate(account(0xa0), &request(), &ring(vec![ecdsa(11), ecdsa(9)]))
        .unwrap_err();
    assert_eq!(plus_b1.account(), Some(account(0xa0)));
    assert_eq!(plus_b1.deficit(), Some(1));

    let complete = aggregator
        .aggregate(account(0xa0), &request(), &ring(vec![ecdsa(11), ecdsa(9), ecdsa(10)]))
        .unwrap();
    assert_eq!(complete.len(), 2);

    // b0 alone reports its own deficit
    let b_only = aggregator
        .aggregate(account(0xb0), &request(), &ring(vec![ecdsa(9)]))
        .unwrap_err();
    assert_eq!(b_only.account(), Some(account(0xb0)));
    assert_eq!(b_only.deficit(), Some(1));
}

#[test]
fn test_uncovered_child_is_tolerated_when_parent_reaches_threshold() {
    let (b, d) = (ecdsa(12), ecdsa(13));
    let tree = tree(
        account(0xa0),
        vec![
            AccountConfig::new(
                account(0xa0),
                1,
                vec![OwnerConfig::account(account(0xb0)), OwnerConfig::key(d.address())],
            ),
            key_account(account(0xb0), 1, &[&b]),
        ],
    );
    let factory = factory();
    let signature = SignatureAggregator::new(&tree, &factory)
        .aggregate(account(0xa0), &request(), &ring(vec![ecdsa(13)]))
        .unwrap();
    assert_eq!(signature.owners(), vec![d.address()]);
}

#[test]
fn test_ownerless_nested_account_has_no_terminal_signers() {
    let node = |address: Address, owners: Vec<Owner>, depth: usize| AccountNode {
        address,
        threshold: 1,
        owners,
        deployed: true,
        nonce: U256::zero(),
        init: None,
        depth,
    };
    let tree = OwnershipTree::from_nodes_unchecked(
        CHAIN_ID,
        account(0xa0),
        vec![
            node(account(0xa0), vec![Owner::Account(account(0xb0))], 0),
            node(account(0xb0), vec![], 1),
        ],
    );
    let factory = factory();
    let err = SignatureAggregator::new(&tree, &factory)
        .aggregate(account(0xa0), &request(), &KeyRing::new())
        .unwrap_err();
    assert_eq!(
        err,
        SafeError::NoTerminalSigners {
            account: account(0xb0),
            depth: 1,
        }
    );
}

#[test]
fn test_passkey_owner_verified_without_deployment() {
    let factory = factory();
    let mut secret = [0u8; 32];
    secret[0] = 0x33;
    secret[31] = 1;
    let passkey = PasskeySigner::new(SigningKey::from_slice(&secret).unwrap(), U256::zero(), &factory)
        .unwrap();
    let data = *passkey.signer_data();
    let passkey_address = passkey.address();

    let snapshot = AccountSnapshot {
        chain_id: CHAIN_ID,
        root: account(0xa0),
        accounts: vec![AccountConfig::new(account(0xa0), 1, vec![OwnerConfig::Passkey(data)])],
    };
    let tree = OwnershipTree::build(&snapshot, &factory).unwrap();
    let keys = KeyRing::new().with(passkey);

    let signature = SignatureAggregator::new(&tree, &factory)
        .aggregate(account(0xa0), &request(), &keys)
        .unwrap();
    assert!(matches!(
        signature.components()[0],
        Component::Contract { owner, .. } if owner == passkey_address
    ));

    let verifier = SignatureVerifier::new(&tree, &factory);
    assert!(verifier
        .verify(account(0xa0), &request(), &signature.to_bytes(), None)
        .is_ok());
    assert_eq!(factory.creation_count(), 0);
}

#[test]
fn test_executor_path_marks_caller_as_approved() {
    let (d, e) = (ecdsa(14), ecdsa(15));
    let (root, middle) = (account(0xa0), account(0xb0));
    let tree = tree(
        root,
        vec![
            AccountConfig::new(
                root,
                2,
                vec![OwnerConfig::account(middle), OwnerConfig::key(d.address())],
            ),
            key_account(middle, 1, &[&e]),
        ],
    );
    let path = tree.executor_path().unwrap();
    assert_eq!(path.executor(), middle);

    let factory = factory();
    let signature = SignatureAggregator::new(&tree, &factory)
        .with_executor_path(&path)
        .aggregate(root, &request(), &ring(vec![ecdsa(14)]))
        .unwrap();
    assert!(signature
        .components()
        .contains(&Component::Approved { owner: middle }));

    let bytes = signature.to_bytes();
    let verifier = SignatureVerifier::new(&tree, &factory);
    assert!(verifier.verify(root, &request(), &bytes, Some(middle)).is_ok());
    assert_eq!(
        verifier.verify(root, &request(), &bytes, None).unwrap_err(),
        SafeError::InvalidSignerVerification {
            signer: middle,
            account: root,
        }
    );
}

#[test]
fn test_verifier_rejects_malformed_input() {
    let (k1, k2) = (ecdsa(16), ecdsa(17));
    let tree = tree(account(0xa0), vec![key_account(account(0xa0), 2, &[&k1, &k2])]);
    let factory = factory();
    let signature = SignatureAggregator::new(&tree, &factory)
        .aggregate(account(0xa0), &request(), &ring(vec![ecdsa(16), ecdsa(17)]))
        .unwrap();
    let bytes = signature.to_bytes();
    let verifier = SignatureVerifier::new(&tree, &factory);

    let truncated = &bytes[..100];
    assert_eq!(
        verifier.verify(account(0xa0), &request(), truncated, None).unwrap_err().code(),
        ErrorCode::MalformedSignature
    );

    let mut swapped = bytes[65..130].to_vec();
    swapped.extend_from_slice(&bytes[..65]);
    assert_eq!(
        verifier.verify(account(0xa0), &request(), &swapped, None).unwrap_err().code(),
        ErrorCode::MalformedSignature
    );

    let mut bad_v = bytes.to_vec();
    bad_v[64] = 5;
    assert_eq!(
        verifier.verify(account(0xa0), &request(), &bad_v, None).unwrap_err().code(),
        ErrorCode::MalformedSignature
    );
}

#[test]
fn test_verifier_rejects_tampered_nested_signature() {
    let b = ecdsa(18);
    let tree = tree(
        account(0xa0),
        vec![
            AccountConfig::new(account(0xa0), 1, vec![OwnerConfig::account(account(0xb0))]),
            key_account(account(0xb0), 1, &[&b]),
        ],
    );
    let factory = factory();
    let signature = SignatureAggregator::new(&tree, &factory)
        .aggregate(account(0xa0), &request(), &ring(vec![ecdsa(18)]))
        .unwrap();
    let mut bytes = signature.to_bytes().to_vec();

    // 65 static + 32 length, then the nested r value
    bytes[65 + 32] ^= 0xff;
    let verifier = SignatureVerifier::new(&tree, &factory);
    assert_eq!(
        verifier.verify(account(0xa0), &request(), &bytes, None).unwrap_err(),
        SafeError::InvalidSignerVerification {
            signer: account(0xb0),
            account: account(0xa0),
        }
    );

    // Offset pointing back into the static part
    let mut bad_offset = signature.to_bytes().to_vec();
    bad_offset[63] = 0;
    assert_eq!(
        verifier.verify(account(0xa0), &request(), &bad_offset, None).unwrap_err().code(),
        ErrorCode::MalformedSignature
    );
}

#[test]
fn test_key_scheme_mismatch_fails_signing() {
    let factory = factory();
    let mut secret = [0u8; 32];
    secret[0] = 0x33;
    secret[31] = 2;
    let passkey = PasskeySigner::new(SigningKey::from_slice(&secret).unwrap(), U256::zero(), &factory)
        .unwrap();

    // Configure the passkey's address as a plain ECDSA owner
    let snapshot = AccountSnapshot {
        chain_id: CHAIN_ID,
        root: account(0xa0),
        accounts: vec![AccountConfig::new(
            account(0xa0),
            1,
            vec![OwnerConfig::key(passkey.address())],
        )],
    };
    let tree = OwnershipTree::build(&snapshot, &factory).unwrap();
    let err = SignatureAggregator::new(&tree, &factory)
        .aggregate(account(0xa0), &request(), &KeyRing::new().with(passkey))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::SigningFailed);
}

#[test]
fn test_encoding_layout() {
    let owner = account(0x0b);
    let signature = AggregatedSignature::new(vec![
        Component::Contract {
            owner,
            data: vec![0xaa, 0xbb].into(),
        },
        Component::Approved { owner: account(0x01) },
    ]);
    let bytes = signature.to_bytes();

    // Approved (0x01..) sorts first, contract second
    assert_eq!(bytes.len(), 2 * 65 + 32 + 2);
    assert_eq!(&bytes[12..32], account(0x01).as_bytes());
    assert_eq!(bytes[64], APPROVED_CALLER_V);
    assert_eq!(&bytes[65 + 12..65 + 32], owner.as_bytes());
    assert_eq!(bytes[65 + 63], 130);
    assert_eq!(bytes[129], CONTRACT_SIGNATURE_V);
    assert_eq!(bytes[130 + 31], 2);
    assert_eq!(&bytes[162..], &[0xaa, 0xbb]);
}
