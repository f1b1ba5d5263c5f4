//! P-256 (WebAuthn / passkey) Signer Factory
//!
//! Signers live at CREATE2 addresses derived from the factory address and
//! the signer data, so an account can list a passkey owner before the
//! signer contract is deployed. Deployment is modelled by an in-memory
//! registry; verification never touches it.

use super::{SignerData, SignerFactory, ERC1271_MAGIC_VALUE};
use crate::config::RelayConfig;
use crate::error::{SafeError, SafeResult};
use crate::{log_debug, log_info};
use ethers_core::types::{Address, Bytes, H256};
use ethers_core::utils::{get_create2_address_from_hash, keccak256};
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::Signature;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// Deployed P-256 signer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebAuthnSigner {
    pub address: Address,
    pub data: SignerData,
}

impl WebAuthnSigner {
    /// ERC-1271 style validation by the deployed signer
    pub fn is_valid_signature(&self, hash: H256, signature: &[u8]) -> SafeResult<[u8; 4]> {
        verify_p256(hash, signature, &self.data)
    }
}

/// Factory for P-256 signers
pub struct WebAuthnSignerFactory {
    address: Address,
    creation_code: Bytes,
    signers: RwLock<HashMap<Address, WebAuthnSigner>>,
    creations: AtomicUsize,
}

impl WebAuthnSignerFactory {
    pub fn new(address: Address, creation_code: impl Into<Bytes>) -> Self {
        Self {
            address,
            creation_code: creation_code.into(),
            signers: RwLock::new(HashMap::new()),
            creations: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.signer_factory, config.signer_creation_code.clone())
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// The deployed signer at `address`, if any
    pub fn deployed_signer(&self, address: Address) -> Option<WebAuthnSigner> {
        self.signers
            .read()
            .ok()
            .and_then(|signers| signers.get(&address).cloned())
    }

    pub fn is_deployed(&self, data: &SignerData) -> bool {
        self.deployed_signer(self.get_signer(data)).is_some()
    }

    /// Number of signers actually provisioned (retries excluded)
    pub fn creation_count(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }

    fn init_code_hash(&self, data: &SignerData) -> [u8; 32] {
        let mut init_code = self.creation_code.to_vec();
        init_code.extend_from_slice(&data.abi_encode());
        keccak256(init_code)
    }
}

impl SignerFactory for WebAuthnSignerFactory {
    fn get_signer(&self, data: &SignerData) -> Address {
        get_create2_address_from_hash(self.address, [0u8; 32], self.init_code_hash(data))
    }

    fn create_signer(&self, data: &SignerData) -> SafeResult<Address> {
        let address = self.get_signer(data);
        let mut signers = self
            .signers
            .write()
            .map_err(|_| SafeError::signing_failed("signer registry lock poisoned"))?;

        if signers.contains_key(&address) {
            log_debug!("signer", "Signer already deployed", signer = address);
            return Ok(address);
        }

        signers.insert(address, WebAuthnSigner { address, data: *data });
        self.creations.fetch_add(1, Ordering::SeqCst);
        log_info!("signer", "Deployed P-256 signer", signer = address);
        Ok(address)
    }

    fn is_valid_signature_for(
        &self,
        hash: H256,
        signature: &[u8],
        data: &SignerData,
    ) -> SafeResult<[u8; 4]> {
        verify_p256(hash, signature, data)
    }
}

/// Shared by the deployed signer and the factory so both paths always agree
fn verify_p256(hash: H256, signature: &[u8], data: &SignerData) -> SafeResult<[u8; 4]> {
    let key = data.verifying_key()?;
    let signature = Signature::from_slice(signature)
        .map_err(|e| SafeError::malformed(format!("Invalid P-256 signature: {}", e)))?;

    match key.verify(hash.as_bytes(), &signature) {
        Ok(()) => Ok(ERC1271_MAGIC_VALUE),
        Err(_) => Ok([0u8; 4]),
    }
}
