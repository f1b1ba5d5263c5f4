//! Bottom-up verification of aggregated signatures
//!
//! Checks an encoded signature the way the account itself would: exactly
//! `threshold` slots, strictly ascending owners, each slot valid for the
//! account's own operation hash. Nested components are checked by
//! recursing into their embedded bytes, so no tree depth is needed upfront.

use super::signature::{APPROVED_CALLER_V, CONTRACT_SIGNATURE_V, SIGNATURE_SLOT_LEN};
use crate::error::{SafeError, SafeResult};
use crate::hasher::OperationHasher;
use crate::log_debug;
use crate::request::AuthorizationRequest;
use crate::signer::{is_success, recover_signer, SignerFactory};
use crate::tree::{AccountNode, KeyOwner, Owner, OwnershipTree};
use ethers_core::types::{Address, H256, U256};

pub struct SignatureVerifier<'a> {
    tree: &'a OwnershipTree,
    factory: &'a dyn SignerFactory,
}

impl<'a> SignatureVerifier<'a> {
    pub fn new(tree: &'a OwnershipTree, factory: &'a dyn SignerFactory) -> Self {
        Self { tree, factory }
    }

    /// Verify `signature` for `account` over `request`.
    ///
    /// `caller` is the address executing the call; only it may appear as a
    /// pre-approved component.
    pub fn verify(
        &self,
        account: Address,
        request: &AuthorizationRequest,
        signature: &[u8],
        caller: Option<Address>,
    ) -> SafeResult<()> {
        let node = self.tree.account(account)?;
        self.verify_node(node, request, signature, caller)
    }

    fn verify_node(
        &self,
        node: &AccountNode,
        request: &AuthorizationRequest,
        signature: &[u8],
        caller: Option<Address>,
    ) -> SafeResult<()> {
        let hash = OperationHasher::hash(node.address, self.tree.chain_id(), request);
        let static_len = node.threshold * SIGNATURE_SLOT_LEN;
        if signature.len() < static_len {
            return Err(SafeError::malformed(format!(
                "{} bytes cannot hold {} signatures",
                signature.len(),
                node.threshold
            )));
        }

        let mut last_owner = Address::zero();
        for index in 0..node.threshold {
            let slot = &signature[index * SIGNATURE_SLOT_LEN..(index + 1) * SIGNATURE_SLOT_LEN];
            let v = slot[64];

            let owner = match v {
                CONTRACT_SIGNATURE_V => {
                    let owner = word_to_address(&slot[..32])?;
                    let data = dynamic_part(signature, &slot[32..64], static_len)?;
                    self.verify_contract(node, owner, hash, request, data)?;
                    owner
                }
                APPROVED_CALLER_V => {
                    let owner = word_to_address(&slot[..32])?;
                    if Some(owner) != caller {
                        return Err(SafeError::InvalidSignerVerification {
                            signer: owner,
                            account: node.address,
                        });
                    }
                    owner
                }
                27 | 28 => {
                    let owner = recover_signer(hash, slot)?;
                    if node.find_owner(owner) != Some(&Owner::Key(KeyOwner::Ecdsa(owner))) {
                        return Err(SafeError::InvalidSignerVerification {
                            signer: owner,
                            account: node.address,
                        });
                    }
                    owner
                }
                other => {
                    return Err(SafeError::malformed(format!(
                        "Unsupported signature type v={}",
                        other
                    )))
                }
            };

            if owner <= last_owner {
                return Err(SafeError::malformed(format!(
                    "Owner {:?} is not in ascending order",
                    owner
                )));
            }
            if node.find_owner(owner).is_none() {
                return Err(SafeError::InvalidSignerVerification {
                    signer: owner,
                    account: node.address,
                });
            }
            last_owner = owner;
        }

        log_debug!(
            "verifier",
            "Signature verified",
            account = node.address,
            threshold = node.threshold
        );
        Ok(())
    }

    fn verify_contract(
        &self,
        node: &AccountNode,
        owner: Address,
        hash: H256,
        request: &AuthorizationRequest,
        data: &[u8],
    ) -> SafeResult<()> {
        let rejected = SafeError::InvalidSignerVerification {
            signer: owner,
            account: node.address,
        };

        match node.find_owner(owner) {
            Some(Owner::Account(child)) => {
                let child = self.tree.account(*child)?;
                self.verify_node(child, request, data, None)
                    .map_err(|_| rejected)
            }
            Some(Owner::Key(KeyOwner::Alternate { data: signer_data, .. })) => {
                if is_success(self.factory.is_valid_signature_for(hash, data, signer_data)) {
                    Ok(())
                } else {
                    Err(rejected)
                }
            }
            _ => Err(rejected),
        }
    }
}

fn word_to_address(word: &[u8]) -> SafeResult<Address> {
    if word[..12].iter().any(|b| *b != 0) {
        return Err(SafeError::malformed("Owner word is not a padded address"));
    }
    Ok(Address::from_slice(&word[12..]))
}

/// Resolve a contract component's `uint256 length || bytes` part
fn dynamic_part<'s>(signature: &'s [u8], offset_word: &[u8], static_len: usize) -> SafeResult<&'s [u8]> {
    let offset = word_to_usize(offset_word)?;
    if offset < static_len {
        return Err(SafeError::malformed("Dynamic offset points into static part"));
    }

    let data_start = offset
        .checked_add(32)
        .filter(|end| *end <= signature.len())
        .ok_or_else(|| SafeError::malformed("Dynamic length out of bounds"))?;
    let length = word_to_usize(&signature[offset..data_start])?;
    let data_end = data_start
        .checked_add(length)
        .filter(|end| *end <= signature.len())
        .ok_or_else(|| SafeError::malformed("Dynamic data out of bounds"))?;

    Ok(&signature[data_start..data_end])
}

fn word_to_usize(word: &[u8]) -> SafeResult<usize> {
    let value = U256::from_big_endian(word);
    if value > U256::from(usize::MAX) {
        return Err(SafeError::malformed("Word does not fit in usize"));
    }
    Ok(value.as_usize())
}
