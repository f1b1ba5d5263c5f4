//! Key Material
//!
//! The signing keys a caller actually holds. Aggregation only ever signs
//! with keys present in a [`KeyRing`]; everything else is reported as
//! missing coverage.

use super::{SignerData, SignerFactory};
use crate::error::{SafeError, SafeResult};
use ethers_core::types::{Address, Bytes, Signature, H256, U256};
use ethers_signers::{LocalWallet, Signer as _};
use p256::ecdsa::signature::Signer as _;
use p256::ecdsa::SigningKey;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Signature scheme a key produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignerScheme {
    /// secp256k1 ECDSA, 65-byte `r || s || v`
    Ecdsa,
    /// P-256 ECDSA, 64-byte `r || s`
    Passkey,
}

/// A key holder able to sign an arbitrary 32-byte hash
pub trait KeySigner: Send + Sync {
    /// Owner address this key signs for
    fn address(&self) -> Address;

    fn scheme(&self) -> SignerScheme;

    /// Raw signature over `hash`
    fn sign_hash(&self, hash: H256) -> SafeResult<Bytes>;
}

/// secp256k1 key holder
pub struct EcdsaKeySigner {
    wallet: LocalWallet,
}

impl EcdsaKeySigner {
    pub fn new(wallet: LocalWallet) -> Self {
        Self { wallet }
    }

    pub fn from_bytes(private_key: &[u8]) -> SafeResult<Self> {
        let wallet = LocalWallet::from_bytes(private_key)
            .map_err(|e| SafeError::invalid_input(format!("Invalid secp256k1 key: {}", e)))?;
        Ok(Self::new(wallet))
    }

    pub fn from_hex(private_key: &str) -> SafeResult<Self> {
        let trimmed = Zeroizing::new(private_key.trim().trim_start_matches("0x").to_string());
        let wallet = LocalWallet::from_str(&trimmed)
            .map_err(|e| SafeError::invalid_input(format!("Invalid secp256k1 key: {}", e)))?;
        Ok(Self::new(wallet))
    }
}

impl KeySigner for EcdsaKeySigner {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    fn scheme(&self) -> SignerScheme {
        SignerScheme::Ecdsa
    }

    fn sign_hash(&self, hash: H256) -> SafeResult<Bytes> {
        let signature = self
            .wallet
            .sign_hash(hash)
            .map_err(|e| SafeError::signing_failed(e.to_string()))?;
        Ok(signature.to_vec().into())
    }
}

impl fmt::Debug for EcdsaKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaKeySigner")
            .field("address", &self.address())
            .finish()
    }
}

/// P-256 key holder whose owner address comes from a signer factory
pub struct PasskeySigner {
    key: SigningKey,
    data: SignerData,
    address: Address,
}

impl PasskeySigner {
    pub fn new(key: SigningKey, verifiers: U256, factory: &dyn SignerFactory) -> SafeResult<Self> {
        let data = SignerData::from_verifying_key(key.verifying_key(), verifiers)?;
        let address = factory.get_signer(&data);
        Ok(Self { key, data, address })
    }

    pub fn from_bytes(
        secret: &[u8],
        verifiers: U256,
        factory: &dyn SignerFactory,
    ) -> SafeResult<Self> {
        let key = SigningKey::from_slice(secret)
            .map_err(|e| SafeError::invalid_input(format!("Invalid P-256 key: {}", e)))?;
        Self::new(key, verifiers, factory)
    }

    pub fn signer_data(&self) -> &SignerData {
        &self.data
    }
}

impl KeySigner for PasskeySigner {
    fn address(&self) -> Address {
        self.address
    }

    fn scheme(&self) -> SignerScheme {
        SignerScheme::Passkey
    }

    fn sign_hash(&self, hash: H256) -> SafeResult<Bytes> {
        let signature: p256::ecdsa::Signature = self.key.sign(hash.as_bytes());
        Ok(signature.to_bytes().to_vec().into())
    }
}

impl fmt::Debug for PasskeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasskeySigner")
            .field("address", &self.address)
            .finish()
    }
}

/// Keys available to sign with, indexed by owner address
#[derive(Default)]
pub struct KeyRing {
    signers: HashMap<Address, Box<dyn KeySigner>>,
}

impl KeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key; a later key for the same address replaces the earlier one
    pub fn insert(&mut self, signer: Box<dyn KeySigner>) -> Address {
        let address = signer.address();
        self.signers.insert(address, signer);
        address
    }

    pub fn with(mut self, signer: impl KeySigner + 'static) -> Self {
        self.insert(Box::new(signer));
        self
    }

    pub fn get(&self, address: &Address) -> Option<&dyn KeySigner> {
        self.signers.get(address).map(|s| s.as_ref())
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.signers.contains_key(address)
    }

    pub fn remove(&mut self, address: &Address) -> bool {
        self.signers.remove(address).is_some()
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    pub fn addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.signers.keys().copied().collect();
        addresses.sort();
        addresses
    }
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRing")
            .field("addresses", &self.addresses())
            .finish()
    }
}

/// Recover the secp256k1 signer of a 65-byte `r || s || v` signature
pub fn recover_signer(hash: H256, signature: &[u8]) -> SafeResult<Address> {
    let signature = Signature::try_from(signature)
        .map_err(|e| SafeError::malformed(format!("Invalid ECDSA signature: {}", e)))?;
    signature
        .recover(hash)
        .map_err(|e| SafeError::malformed(format!("Signer recovery failed: {}", e)))
}
