//! Nested Safe Core Library
//!
//! Authorization for hierarchical multisig accounts (accounts whose owners
//! may themselves be multisig accounts) relayed through ERC-4337 bundlers.
//!
//! # Architecture
//!
//! This crate provides:
//! - **tree**: Validated ownership trees and executor selection
//! - **hasher**: Domain-separated operation hashes
//! - **signer**: Alternate (passkey) signer factory and key material
//! - **aggregator**: Recursive signature aggregation and verification
//! - **relay**: UserOperation translation and execution planning
//! - **config**: Chain presets and relay settings
//!
//! # Flow
//!
//! snapshot → [`tree::OwnershipTree`] → executor path → per-account
//! aggregated signatures → [`relay::UserOperation`] handed to a bundler.
//!
//! # Example
//!
//! ```rust,ignore
//! use nested_safe::{OwnershipTree, RelayConfig, RelayPlanner, WebAuthnSignerFactory};
//!
//! let config = RelayConfig::default();
//! let factory = WebAuthnSignerFactory::from_config(&config);
//! let tree = OwnershipTree::build(&snapshot, &factory)?;
//! let plan = RelayPlanner::new(&tree, &factory, &config).plan(&request, &keys)?;
//! println!("userOpHash: {:?}", plan.user_op_hash);
//! ```

pub mod error;
pub mod config;
pub mod request;
pub mod hasher;
pub mod signer;
pub mod tree;
pub mod aggregator;
pub mod relay;
pub mod utils;

// Re-export key types for convenience
pub use error::{ErrorCode, SafeError, SafeResult, UncoveredAccount};
pub use config::{RelayChain, RelayConfig};
pub use request::{AuthorizationRequest, GasParameters, Operation, ValidityWindow};
pub use hasher::OperationHasher;
pub use signer::{
    EcdsaKeySigner, KeyRing, KeySigner, PasskeySigner, SignerData, SignerFactory,
    WebAuthnSignerFactory,
};
pub use tree::{AccountSnapshot, ExecutorPath, ExecutorSelector, OwnershipTree};
pub use aggregator::{AggregatedSignature, SignatureAggregator, SignatureVerifier};
pub use relay::{OperationTranslator, RelayPlan, RelayPlanner, UserOperation};
