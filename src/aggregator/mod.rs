//! Signature Aggregation
//!
//! Builds the composite proof for an account bottom-up through the
//! ownership tree. Every account signs with its own operation hash; a
//! nested account's aggregated signature becomes one contract component at
//! its parent.
//!
//! # Example
//! ```rust,ignore
//! use nested_safe::aggregator::SignatureAggregator;
//!
//! let aggregator = SignatureAggregator::new(&tree, &factory);
//! let signature = aggregator.aggregate(tree.root(), &request, &keys)?;
//! let bytes = signature.to_bytes();
//! ```

pub mod signature;
pub mod verifier;

pub use signature::*;
pub use verifier::*;

use crate::error::{SafeError, SafeResult, UncoveredAccount};
use crate::hasher::OperationHasher;
use crate::request::AuthorizationRequest;
use crate::signer::{is_success, recover_signer, KeyRing, SignerFactory, SignerScheme};
use crate::tree::{AccountNode, ExecutorPath, KeyOwner, Owner, OwnershipTree};
use crate::{log_debug, log_info, log_warn};
use ethers_core::types::{Address, H256};

/// Recursive aggregator over a validated [`OwnershipTree`]
pub struct SignatureAggregator<'a> {
    tree: &'a OwnershipTree,
    factory: &'a dyn SignerFactory,
    executor: Option<&'a ExecutorPath>,
}

impl<'a> SignatureAggregator<'a> {
    pub fn new(tree: &'a OwnershipTree, factory: &'a dyn SignerFactory) -> Self {
        Self {
            tree,
            factory,
            executor: None,
        }
    }

    /// Treat the path account below each aggregated account as its caller.
    ///
    /// That owner is then encoded as pre-approved instead of being asked
    /// for a signature, because its own execution call is the approval.
    pub fn with_executor_path(mut self, path: &'a ExecutorPath) -> Self {
        self.executor = Some(path);
        self
    }

    /// Aggregate signatures for `account` over `request`.
    ///
    /// Only keys in `keys` are used. Sub-accounts that fall short are
    /// skipped as long as the parent still reaches its threshold. Otherwise
    /// this fails with `InsufficientSignatures` naming `account` and listing
    /// every nested account that was left uncovered with its own deficit.
    pub fn aggregate(
        &self,
        account: Address,
        request: &AuthorizationRequest,
        keys: &KeyRing,
    ) -> SafeResult<AggregatedSignature> {
        let node = self.tree.account(account)?;
        let caller = self.executor.and_then(|path| path.caller_of(account));
        let signature = match self.aggregate_node(node, request, keys, caller) {
            Ok(signature) => signature,
            Err(err) => {
                if let Some(deficit) = err.deficit() {
                    log_warn!(
                        "aggregator",
                        "Account below threshold",
                        account = account,
                        deficit = deficit,
                        uncovered = err.uncovered().len()
                    );
                }
                return Err(err);
            }
        };

        log_info!(
            "aggregator",
            "Aggregated signature",
            account = account,
            components = signature.len(),
            threshold = node.threshold
        );
        Ok(signature)
    }

    fn aggregate_node(
        &self,
        node: &AccountNode,
        request: &AuthorizationRequest,
        keys: &KeyRing,
        caller: Option<Address>,
    ) -> SafeResult<AggregatedSignature> {
        if node.owners.is_empty() {
            return Err(SafeError::NoTerminalSigners {
                account: node.address,
                depth: node.depth,
            });
        }

        let hash = OperationHasher::hash(node.address, self.tree.chain_id(), request);
        log_debug!(
            "aggregator",
            "Collecting signatures",
            account = node.address,
            depth = node.depth,
            hash = hash
        );

        let mut components = Vec::with_capacity(node.owners.len());
        let mut uncovered = Vec::new();
        for owner in &node.owners {
            if Some(owner.address()) == caller {
                components.push(Component::Approved {
                    owner: owner.address(),
                });
                continue;
            }

            match owner {
                Owner::Key(key) => {
                    if let Some(component) = self.sign_with_key(node, key, hash, keys)? {
                        components.push(component);
                    }
                }
                Owner::Account(child) => {
                    let child_node = self.tree.account(*child)?;
                    match self.aggregate_node(child_node, request, keys, None) {
                        Ok(nested) => components.push(Component::Contract {
                            owner: *child,
                            data: nested.to_bytes(),
                        }),
                        Err(SafeError::InsufficientSignatures {
                            account,
                            depth,
                            collected,
                            threshold,
                            uncovered: below,
                        }) => {
                            log_debug!(
                                "aggregator",
                                "Nested account not covered",
                                account = account,
                                collected = collected,
                                threshold = threshold
                            );
                            uncovered.push(UncoveredAccount {
                                account,
                                depth,
                                deficit: threshold.saturating_sub(collected),
                            });
                            uncovered.extend(below);
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
        }

        if components.len() < node.threshold {
            return Err(SafeError::InsufficientSignatures {
                account: node.address,
                depth: node.depth,
                collected: components.len(),
                threshold: node.threshold,
                uncovered,
            });
        }

        Ok(AggregatedSignature::new(components))
    }

    /// Sign `hash` for a key owner, or `None` when its key is not available
    fn sign_with_key(
        &self,
        node: &AccountNode,
        owner: &KeyOwner,
        hash: H256,
        keys: &KeyRing,
    ) -> SafeResult<Option<Component>> {
        let address = owner.address();
        let signer = match keys.get(&address) {
            Some(signer) => signer,
            None => return Ok(None),
        };

        match owner {
            KeyOwner::Ecdsa(_) => {
                if signer.scheme() != SignerScheme::Ecdsa {
                    return Err(SafeError::signing_failed(format!(
                        "Owner {:?} expects an ECDSA key",
                        address
                    )));
                }
                let signature = signer.sign_hash(hash)?;
                if recover_signer(hash, &signature)? != address {
                    return Err(SafeError::signing_failed(format!(
                        "Key for {:?} produced a signature for another address",
                        address
                    )));
                }
                Ok(Some(Component::Ecdsa {
                    owner: address,
                    signature,
                }))
            }
            KeyOwner::Alternate { data, .. } => {
                if signer.scheme() != SignerScheme::Passkey {
                    return Err(SafeError::signing_failed(format!(
                        "Owner {:?} expects a passkey",
                        address
                    )));
                }
                let signature = signer.sign_hash(hash)?;
                if !is_success(self.factory.is_valid_signature_for(hash, &signature, data)) {
                    return Err(SafeError::InvalidSignerVerification {
                        signer: address,
                        account: node.address,
                    });
                }
                Ok(Some(Component::Contract {
                    owner: address,
                    data: signature,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests;
