//! ERC-4337 UserOperation (v0.7)
//!
//! The relay-network record a translated authorization ends up as, and
//! its `userOpHash` for a given entry point and chain.

use ethers_core::abi::{encode, Token};
use ethers_core::types::{Address, Bytes, H256, U256};
use ethers_core::utils::keccak256;
use serde::{Deserialize, Serialize};

/// UserOperation for ERC-4337 v0.7
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// The account making the operation
    pub sender: Address,
    /// Anti-replay parameter
    pub nonce: U256,
    /// Account factory, only for accounts not deployed yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_data: Option<Bytes>,
    /// The encoded call to execute
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    /// Gas for account validation
    pub verification_gas_limit: U256,
    /// Gas to compensate bundler for overhead
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    /// `validAfter || validUntil || signatures`
    pub signature: Bytes,
}

impl UserOperation {
    /// Operation with zero gas and an empty signature
    pub fn new(sender: Address, nonce: U256, call_data: impl Into<Bytes>) -> Self {
        Self {
            sender,
            nonce,
            factory: None,
            factory_data: None,
            call_data: call_data.into(),
            call_gas_limit: U256::zero(),
            verification_gas_limit: U256::zero(),
            pre_verification_gas: U256::zero(),
            max_fee_per_gas: U256::zero(),
            max_priority_fee_per_gas: U256::zero(),
            signature: Bytes::default(),
        }
    }

    /// `factory || factoryData`, empty for deployed accounts
    pub fn init_code(&self) -> Vec<u8> {
        match (&self.factory, &self.factory_data) {
            (Some(factory), Some(data)) => {
                let mut init_code = factory.as_bytes().to_vec();
                init_code.extend_from_slice(data);
                init_code
            }
            _ => Vec::new(),
        }
    }

    /// Pack the UserOperation for hashing (v0.7 format)
    pub fn pack_for_hash(&self) -> Vec<u8> {
        encode(&[
            Token::Address(self.sender),
            Token::Uint(self.nonce),
            Token::FixedBytes(keccak256(self.init_code()).to_vec()),
            Token::FixedBytes(keccak256(&self.call_data).to_vec()),
            // accountGasLimits: bytes32 = verificationGasLimit || callGasLimit
            Token::FixedBytes(pack_u128_pair(self.verification_gas_limit, self.call_gas_limit)),
            Token::Uint(self.pre_verification_gas),
            // gasFees: bytes32 = maxPriorityFeePerGas || maxFeePerGas
            Token::FixedBytes(pack_u128_pair(self.max_priority_fee_per_gas, self.max_fee_per_gas)),
            // no paymaster
            Token::FixedBytes(keccak256(b"").to_vec()),
        ])
    }

    /// `keccak256(keccak256(packed) || entryPoint || chainId)`
    pub fn get_hash(&self, entry_point: Address, chain_id: u64) -> H256 {
        let inner = keccak256(self.pack_for_hash());
        H256(keccak256(encode(&[
            Token::FixedBytes(inner.to_vec()),
            Token::Address(entry_point),
            Token::Uint(U256::from(chain_id)),
        ])))
    }
}

/// Two values truncated to 128 bits each, high half first
fn pack_u128_pair(high: U256, low: U256) -> Vec<u8> {
    let mut word = [0u8; 32];
    word[..16].copy_from_slice(&high.low_u128().to_be_bytes());
    word[16..].copy_from_slice(&low.low_u128().to_be_bytes());
    word.to_vec()
}
