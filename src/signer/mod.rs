//! Alternate Signers
//!
//! Capability boundary around non-default signing schemes. A factory maps
//! opaque signer data to a deterministic address, provisions the signer on
//! demand, and can verify a signature for a signer that does not exist yet.
//!
//! Contract of [`SignerFactory::is_valid_signature_for`]: observably the
//! same as `create_signer(data)` followed by asking that signer to validate
//! the signature, without performing the creation. Anything other than
//! [`ERC1271_MAGIC_VALUE`] (including an error) means "invalid".

pub mod keys;
pub mod webauthn;

pub use keys::*;
pub use webauthn::*;

use crate::error::{SafeError, SafeResult};
use ethers_core::abi::{encode, Token};
use ethers_core::types::{Address, H256, U256};
use p256::ecdsa::VerifyingKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Serialize};

/// ERC-1271 `isValidSignature` success marker
pub const ERC1271_MAGIC_VALUE: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];

/// Signer-specific data for a P-256 (passkey) signer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerData {
    /// Public key x coordinate
    pub x: U256,
    /// Public key y coordinate
    pub y: U256,
    /// Verifier configuration (precompile / fallback verifier selection)
    #[serde(default)]
    pub verifiers: U256,
}

impl SignerData {
    pub fn from_verifying_key(key: &VerifyingKey, verifiers: U256) -> SafeResult<Self> {
        let point = p256::PublicKey::from(key).to_encoded_point(false);
        let (x, y) = match (point.x(), point.y()) {
            (Some(x), Some(y)) => (U256::from_big_endian(x), U256::from_big_endian(y)),
            _ => return Err(SafeError::invalid_input("P-256 key has no affine coordinates")),
        };
        Ok(Self { x, y, verifiers })
    }

    /// Rebuild the public key from the stored coordinates
    pub fn verifying_key(&self) -> SafeResult<VerifyingKey> {
        let mut sec1 = [0u8; 65];
        sec1[0] = 0x04;
        self.x.to_big_endian(&mut sec1[1..33]);
        self.y.to_big_endian(&mut sec1[33..65]);

        VerifyingKey::from_sec1_bytes(&sec1)
            .map_err(|e| SafeError::invalid_input(format!("Invalid P-256 public key: {}", e)))
    }

    /// `abi.encode(x, y, verifiers)`
    pub fn abi_encode(&self) -> Vec<u8> {
        encode(&[
            Token::Uint(self.x),
            Token::Uint(self.y),
            Token::Uint(self.verifiers),
        ])
    }
}

/// Factory for alternate signers
pub trait SignerFactory: Send + Sync {
    /// Deterministic signer address; never requires the signer to exist
    fn get_signer(&self, data: &SignerData) -> Address;

    /// Provision the signer if needed. Idempotent and safe to retry.
    fn create_signer(&self, data: &SignerData) -> SafeResult<Address>;

    /// Validate `signature` over `hash` as the signer for `data` would
    fn is_valid_signature_for(
        &self,
        hash: H256,
        signature: &[u8],
        data: &SignerData,
    ) -> SafeResult<[u8; 4]>;
}

/// Collapse a verification outcome: only the magic value counts as valid
pub fn is_success(result: SafeResult<[u8; 4]>) -> bool {
    matches!(result, Ok(marker) if marker == ERC1271_MAGIC_VALUE)
}
