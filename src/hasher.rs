//! Operation Hashing
//!
//! EIP-712 style, domain-separated hashing of authorization requests.
//! The domain binds the chain id and the authorizing account's own
//! address, so a signature over one (account, chain) pair can never be
//! replayed against another.
//!
//! hash = keccak256("\x19\x01" || domainSeparator(chainId, account) || hashStruct(request))

use crate::request::AuthorizationRequest;
use ethers_core::abi::{encode, Token};
use ethers_core::types::{Address, H256, U256};
use ethers_core::utils::keccak256;
use serde::Serialize;

/// Magic prefix for EIP-712 encoding
const EIP712_PREFIX: &[u8] = b"\x19\x01";

pub const DOMAIN_TYPE: &str = "EIP712Domain(uint256 chainId,address verifyingContract)";

pub const SAFE_OPERATION_TYPE: &str = "SafeOperation(address to,uint256 value,bytes data,uint8 operation,uint256 nonce,uint128 callGasLimit,uint128 verificationGasLimit,uint256 preVerificationGas,uint128 maxFeePerGas,uint128 maxPriorityFeePerGas,uint48 validAfter,uint48 validUntil)";

/// Pre-image components (for external signers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationPreImage {
    pub domain_separator: H256,
    pub struct_hash: H256,
    pub final_hash: H256,
}

/// Stateless hasher for authorization requests
pub struct OperationHasher;

impl OperationHasher {
    /// domainSeparator = hashStruct(EIP712Domain { chainId, verifyingContract: account })
    pub fn domain_separator(account: Address, chain_id: u64) -> H256 {
        let encoded = encode(&[
            Token::FixedBytes(keccak256(DOMAIN_TYPE).to_vec()),
            Token::Uint(U256::from(chain_id)),
            Token::Address(account),
        ]);
        H256(keccak256(encoded))
    }

    /// hashStruct(SafeOperation)
    pub fn struct_hash(request: &AuthorizationRequest) -> H256 {
        let window = request.window();
        let encoded = encode(&[
            Token::FixedBytes(keccak256(SAFE_OPERATION_TYPE).to_vec()),
            Token::Address(request.to),
            Token::Uint(request.value),
            Token::FixedBytes(keccak256(&request.data).to_vec()),
            Token::Uint(U256::from(request.operation.as_u8())),
            Token::Uint(request.nonce),
            Token::Uint(U256::from(request.gas.call_gas_limit)),
            Token::Uint(U256::from(request.gas.verification_gas_limit)),
            Token::Uint(U256::from(request.gas.pre_verification_gas)),
            Token::Uint(U256::from(request.gas.max_fee_per_gas)),
            Token::Uint(U256::from(request.gas.max_priority_fee_per_gas)),
            Token::Uint(U256::from(window.valid_after)),
            Token::Uint(U256::from(window.valid_until)),
        ]);
        H256(keccak256(encoded))
    }

    /// Final digest an owner of `account` signs on `chain_id`
    pub fn hash(account: Address, chain_id: u64, request: &AuthorizationRequest) -> H256 {
        Self::pre_image(account, chain_id, request).final_hash
    }

    pub fn pre_image(
        account: Address,
        chain_id: u64,
        request: &AuthorizationRequest,
    ) -> OperationPreImage {
        let domain_separator = Self::domain_separator(account, chain_id);
        let struct_hash = Self::struct_hash(request);

        let mut data = Vec::with_capacity(2 + 32 + 32);
        data.extend_from_slice(EIP712_PREFIX);
        data.extend_from_slice(domain_separator.as_bytes());
        data.extend_from_slice(struct_hash.as_bytes());

        OperationPreImage {
            domain_separator,
            struct_hash,
            final_hash: H256(keccak256(data)),
        }
    }
}
