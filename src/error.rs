//! Unified error types for nested-safe
//!
//! Every failure carries enough structured context (account address,
//! depth, signature counts) for a caller to resume a signing flow
//! instead of restarting it.

use ethers_core::types::Address;
use serde::{Deserialize, Serialize};

/// Main error type for all nested-safe operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SafeError {
    #[error("No account in the ownership tree is owned exclusively by keys")]
    NoExecutorFound,

    #[error(
        "Account {account:?} at depth {depth} has {collected} of {threshold} required signatures{}",
        describe_uncovered(.uncovered)
    )]
    InsufficientSignatures {
        account: Address,
        depth: usize,
        collected: usize,
        threshold: usize,
        /// Nested accounts below `account` that fell short, deepest last
        uncovered: Vec<UncoveredAccount>,
    },

    #[error("Account {account:?} at depth {depth} has no terminal signers")]
    NoTerminalSigners { account: Address, depth: usize },

    #[error("Relay operation is missing {field}")]
    IncompleteOperation { field: &'static str },

    #[error("Signer {signer:?} rejected the signature for account {account:?}")]
    InvalidSignerVerification { signer: Address, account: Address },

    #[error("Ownership cycle through account {account:?}")]
    OwnershipCycle { account: Address, path: Vec<Address> },

    #[error("Account {0:?} is not part of the snapshot")]
    UnknownAccount(Address),

    #[error("Invalid threshold {threshold} for {owners} owners on account {account:?}")]
    InvalidThreshold {
        account: Address,
        threshold: usize,
        owners: usize,
    },

    #[error("Duplicate owner {owner:?} on account {account:?}")]
    DuplicateOwner { account: Address, owner: Address },

    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SafeError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedSignature(msg.into())
    }

    pub fn signing_failed(msg: impl Into<String>) -> Self {
        Self::SigningFailed(msg.into())
    }

    /// Stable category for machine consumers
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoExecutorFound => ErrorCode::NoExecutorFound,
            Self::InsufficientSignatures { .. } => ErrorCode::InsufficientSignatures,
            Self::NoTerminalSigners { .. } => ErrorCode::NoTerminalSigners,
            Self::IncompleteOperation { .. } => ErrorCode::IncompleteOperation,
            Self::InvalidSignerVerification { .. } => ErrorCode::InvalidSignerVerification,
            Self::OwnershipCycle { .. } => ErrorCode::OwnershipCycle,
            Self::UnknownAccount(_) => ErrorCode::UnknownAccount,
            Self::InvalidThreshold { .. } => ErrorCode::InvalidThreshold,
            Self::DuplicateOwner { .. } => ErrorCode::DuplicateOwner,
            Self::MalformedSignature(_) => ErrorCode::MalformedSignature,
            Self::SigningFailed(_) => ErrorCode::SigningFailed,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
        }
    }

    /// The account the failure is attributed to, if any
    pub fn account(&self) -> Option<Address> {
        match self {
            Self::InsufficientSignatures { account, .. }
            | Self::NoTerminalSigners { account, .. }
            | Self::InvalidSignerVerification { account, .. }
            | Self::OwnershipCycle { account, .. }
            | Self::InvalidThreshold { account, .. }
            | Self::DuplicateOwner { account, .. } => Some(*account),
            Self::UnknownAccount(account) => Some(*account),
            _ => None,
        }
    }

    /// Number of signatures still missing for an under-threshold account
    pub fn deficit(&self) -> Option<usize> {
        match self {
            Self::InsufficientSignatures {
                collected,
                threshold,
                ..
            } => Some(threshold.saturating_sub(*collected)),
            _ => None,
        }
    }

    /// Nested accounts that could not be covered while signing
    pub fn uncovered(&self) -> &[UncoveredAccount] {
        match self {
            Self::InsufficientSignatures { uncovered, .. } => uncovered,
            _ => &[],
        }
    }
}

/// A nested account that stayed below its threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UncoveredAccount {
    pub account: Address,
    pub depth: usize,
    pub deficit: usize,
}

fn describe_uncovered(uncovered: &[UncoveredAccount]) -> String {
    if uncovered.is_empty() {
        return String::new();
    }
    let accounts: Vec<String> = uncovered
        .iter()
        .map(|u| format!("{:?} (depth {}) needs {} more", u.account, u.depth, u.deficit))
        .collect();
    format!("; uncovered: {}", accounts.join(", "))
}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Tree errors
    NoExecutorFound,
    NoTerminalSigners,
    OwnershipCycle,
    UnknownAccount,
    InvalidThreshold,
    DuplicateOwner,

    // Signing errors
    InsufficientSignatures,
    InvalidSignerVerification,
    MalformedSignature,
    SigningFailed,

    // Relay errors
    IncompleteOperation,

    // Input errors
    InvalidInput,
}

/// Result type alias for nested-safe operations
pub type SafeResult<T> = Result<T, SafeError>;

impl From<hex::FromHexError> for SafeError {
    fn from(e: hex::FromHexError) -> Self {
        SafeError::InvalidInput(format!("Invalid hex: {}", e))
    }
}

impl From<serde_json::Error> for SafeError {
    fn from(e: serde_json::Error) -> Self {
        SafeError::InvalidInput(format!("Invalid JSON: {}", e))
    }
}
