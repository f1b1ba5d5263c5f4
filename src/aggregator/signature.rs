//! Aggregated signature encoding
//!
//! One 65-byte static slot per component, sorted by ascending owner, then
//! the dynamic parts of contract components:
//!
//! | component | r (32)          | s (32)          | v (1)   |
//! |-----------|-----------------|-----------------|---------|
//! | ECDSA     | r               | s               | 27 / 28 |
//! | contract  | owner (padded)  | dynamic offset  | 0       |
//! | approved  | owner (padded)  | 0               | 1       |
//!
//! A contract component's dynamic part is `uint256 length || bytes`.

use ethers_core::types::{Address, Bytes, U256};
use serde::Serialize;

/// Length of one static signature slot
pub const SIGNATURE_SLOT_LEN: usize = 65;

/// `v` marking a contract (ERC-1271 style) component
pub const CONTRACT_SIGNATURE_V: u8 = 0;

/// `v` marking a pre-approved caller
pub const APPROVED_CALLER_V: u8 = 1;

/// One owner's contribution to an aggregated signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Component {
    /// Raw `r || s || v` from a key owner
    Ecdsa { owner: Address, signature: Bytes },
    /// Bytes verified by the owner itself: a nested account's aggregated
    /// signature, or an alternate signer's raw signature
    Contract { owner: Address, data: Bytes },
    /// The owner is the account executing the call
    Approved { owner: Address },
}

impl Component {
    pub fn owner(&self) -> Address {
        match self {
            Component::Ecdsa { owner, .. }
            | Component::Contract { owner, .. }
            | Component::Approved { owner } => *owner,
        }
    }
}

/// Canonically ordered set of components for one account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregatedSignature {
    components: Vec<Component>,
}

impl AggregatedSignature {
    /// Sort `components` by owner; input order never affects the result
    pub fn new(mut components: Vec<Component>) -> Self {
        components.sort_by_key(Component::owner);
        Self { components }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn owners(&self) -> Vec<Address> {
        self.components.iter().map(Component::owner).collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Encode as static slots followed by the dynamic parts
    pub fn to_bytes(&self) -> Bytes {
        let static_len = self.components.len() * SIGNATURE_SLOT_LEN;
        let mut head = Vec::with_capacity(static_len);
        let mut tail = Vec::new();

        for component in &self.components {
            match component {
                Component::Ecdsa { signature, .. } => head.extend_from_slice(signature),
                Component::Contract { owner, data } => {
                    let offset = static_len + tail.len();
                    head.extend_from_slice(&pad_address(owner));
                    head.extend_from_slice(&pad_uint(U256::from(offset)));
                    head.push(CONTRACT_SIGNATURE_V);

                    tail.extend_from_slice(&pad_uint(U256::from(data.len())));
                    tail.extend_from_slice(data);
                }
                Component::Approved { owner } => {
                    head.extend_from_slice(&pad_address(owner));
                    head.extend_from_slice(&[0u8; 32]);
                    head.push(APPROVED_CALLER_V);
                }
            }
        }

        head.extend_from_slice(&tail);
        head.into()
    }
}

pub(crate) fn pad_address(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

pub(crate) fn pad_uint(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}
