//! Account snapshot and tree node types

use crate::error::SafeResult;
use crate::signer::SignerData;
use ethers_core::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// Read-only account configuration as supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub chain_id: u64,
    /// Account the operation is authorized for
    pub root: Address,
    pub accounts: Vec<AccountConfig>,
}

impl AccountSnapshot {
    pub fn from_json(json: &str) -> SafeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One account entry in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountConfig {
    pub address: Address,
    pub threshold: usize,
    pub owners: Vec<OwnerConfig>,
    #[serde(default = "default_deployed")]
    pub deployed: bool,
    #[serde(default)]
    pub nonce: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<InitPayload>,
}

fn default_deployed() -> bool {
    true
}

impl AccountConfig {
    /// A deployed account with nonce zero
    pub fn new(address: Address, threshold: usize, owners: Vec<OwnerConfig>) -> Self {
        Self {
            address,
            threshold,
            owners,
            deployed: true,
            nonce: U256::zero(),
            init: None,
        }
    }

    /// Mark the account as not yet deployed, with its initialization payload
    pub fn lazy(mut self, init: Option<InitPayload>) -> Self {
        self.deployed = false;
        self.init = init;
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<U256>) -> Self {
        self.nonce = nonce.into();
        self
    }
}

/// Owner reference as configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OwnerConfig {
    /// secp256k1 key holder
    Key { address: Address },
    /// P-256 signer, addressed through the signer factory
    Passkey(SignerData),
    /// Nested account
    Account { address: Address },
}

impl OwnerConfig {
    pub fn key(address: Address) -> Self {
        Self::Key { address }
    }

    pub fn account(address: Address) -> Self {
        Self::Account { address }
    }
}

/// Deployment payload for an account that is not on-chain yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    pub factory: Address,
    #[serde(default)]
    pub factory_data: Bytes,
}

/// Terminal key holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyOwner {
    /// Plain ECDSA key; signatures are recovered directly
    Ecdsa(Address),
    /// Alternate signer verified through a [`crate::signer::SignerFactory`]
    Alternate { address: Address, data: SignerData },
}

impl KeyOwner {
    pub fn address(&self) -> Address {
        match self {
            KeyOwner::Ecdsa(address) => *address,
            KeyOwner::Alternate { address, .. } => *address,
        }
    }
}

/// Owner edge of a built tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    Key(KeyOwner),
    Account(Address),
}

impl Owner {
    pub fn address(&self) -> Address {
        match self {
            Owner::Key(key) => key.address(),
            Owner::Account(address) => *address,
        }
    }

    pub fn is_key(&self) -> bool {
        matches!(self, Owner::Key(_))
    }
}

/// What the relay translator needs to know about the originating account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMeta {
    pub address: Address,
    pub deployed: bool,
    pub init: Option<InitPayload>,
}

/// Validated account in an [`super::OwnershipTree`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountNode {
    pub address: Address,
    pub threshold: usize,
    /// Owners in configured order
    pub owners: Vec<Owner>,
    pub deployed: bool,
    pub nonce: U256,
    pub init: Option<InitPayload>,
    /// Depth at which the account was first reached from the root
    pub depth: usize,
}

impl AccountNode {
    /// True when every owner is a key holder (and there is at least one)
    pub fn is_key_only(&self) -> bool {
        !self.owners.is_empty() && self.owners.iter().all(Owner::is_key)
    }

    pub fn find_owner(&self, address: Address) -> Option<&Owner> {
        self.owners.iter().find(|owner| owner.address() == address)
    }

    /// Nested accounts among the owners, in configured order
    pub fn child_accounts(&self) -> impl Iterator<Item = Address> + '_ {
        self.owners.iter().filter_map(|owner| match owner {
            Owner::Account(address) => Some(*address),
            Owner::Key(_) => None,
        })
    }

    pub fn meta(&self) -> AccountMeta {
        AccountMeta {
            address: self.address,
            deployed: self.deployed,
            init: self.init.clone(),
        }
    }
}
