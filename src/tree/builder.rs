//! Snapshot validation and tree construction

use super::types::*;
use crate::error::{SafeError, SafeResult};
use crate::signer::SignerFactory;
use crate::{log_debug, log_info};
use ethers_core::types::Address;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Deepest nesting accepted below the root
pub const MAX_NESTING_DEPTH: usize = 16;

/// Validated, acyclic ownership graph rooted at one account.
///
/// Nodes are stored by address; a sub-account that owns several parents
/// appears once and is referenced from each of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipTree {
    chain_id: u64,
    root: Address,
    accounts: BTreeMap<Address, AccountNode>,
}

impl OwnershipTree {
    /// Validate `snapshot` and build the tree reachable from its root.
    ///
    /// Passkey owners are resolved to their signer address through
    /// `factory`; nothing is deployed. Accounts in the snapshot that the
    /// root cannot reach are ignored.
    pub fn build(snapshot: &AccountSnapshot, factory: &dyn SignerFactory) -> SafeResult<Self> {
        let mut configs: HashMap<Address, &AccountConfig> = HashMap::new();
        for config in &snapshot.accounts {
            if configs.insert(config.address, config).is_some() {
                return Err(SafeError::invalid_input(format!(
                    "Account {:?} appears twice in the snapshot",
                    config.address
                )));
            }
        }

        let mut builder = TreeBuilder {
            configs,
            factory,
            accounts: BTreeMap::new(),
            path: Vec::new(),
        };
        builder.visit(snapshot.root, 0)?;

        let unreachable = snapshot.accounts.len() - builder.accounts.len();
        if unreachable > 0 {
            log_debug!("tree", "Ignoring unreachable accounts", count = unreachable);
        }

        log_info!(
            "tree",
            "Built ownership tree",
            root = snapshot.root,
            accounts = builder.accounts.len(),
            chain_id = snapshot.chain_id
        );

        Ok(Self {
            chain_id: snapshot.chain_id,
            root: snapshot.root,
            accounts: builder.accounts,
        })
    }

    /// Assemble a tree from already-built nodes without any validation
    #[cfg(test)]
    pub(crate) fn from_nodes_unchecked(
        chain_id: u64,
        root: Address,
        nodes: Vec<AccountNode>,
    ) -> Self {
        Self {
            chain_id,
            root,
            accounts: nodes.into_iter().map(|node| (node.address, node)).collect(),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn root(&self) -> Address {
        self.root
    }

    pub fn root_node(&self) -> SafeResult<&AccountNode> {
        self.account(self.root)
    }

    pub fn account(&self, address: Address) -> SafeResult<&AccountNode> {
        self.accounts
            .get(&address)
            .ok_or(SafeError::UnknownAccount(address))
    }

    /// All nodes, ordered by address
    pub fn accounts(&self) -> impl Iterator<Item = &AccountNode> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

struct TreeBuilder<'a> {
    configs: HashMap<Address, &'a AccountConfig>,
    factory: &'a dyn SignerFactory,
    accounts: BTreeMap<Address, AccountNode>,
    /// Accounts on the current root-to-node walk
    path: Vec<Address>,
}

impl TreeBuilder<'_> {
    fn visit(&mut self, address: Address, depth: usize) -> SafeResult<()> {
        if self.path.contains(&address) {
            let mut path = self.path.clone();
            path.push(address);
            return Err(SafeError::OwnershipCycle { account: address, path });
        }
        if self.accounts.contains_key(&address) {
            return Ok(());
        }
        if depth > MAX_NESTING_DEPTH {
            return Err(SafeError::NoTerminalSigners { account: address, depth });
        }

        let config = *self
            .configs
            .get(&address)
            .ok_or(SafeError::UnknownAccount(address))?;
        let node = self.resolve(config, depth)?;

        self.path.push(address);
        for child in node.child_accounts() {
            self.visit(child, depth + 1)?;
        }
        self.path.pop();

        log_debug!(
            "tree",
            "Validated account",
            account = address,
            depth = depth,
            threshold = node.threshold,
            owners = node.owners.len()
        );
        self.accounts.insert(address, node);
        Ok(())
    }

    fn resolve(&self, config: &AccountConfig, depth: usize) -> SafeResult<AccountNode> {
        let account = config.address;
        if config.owners.is_empty() {
            return Err(SafeError::NoTerminalSigners { account, depth });
        }
        if config.threshold == 0 || config.threshold > config.owners.len() {
            return Err(SafeError::InvalidThreshold {
                account,
                threshold: config.threshold,
                owners: config.owners.len(),
            });
        }

        let mut seen = HashSet::new();
        let mut owners = Vec::with_capacity(config.owners.len());
        for owner in &config.owners {
            let owner = match owner {
                OwnerConfig::Key { address } => Owner::Key(KeyOwner::Ecdsa(*address)),
                OwnerConfig::Passkey(data) => Owner::Key(KeyOwner::Alternate {
                    address: self.factory.get_signer(data),
                    data: *data,
                }),
                OwnerConfig::Account { address } => Owner::Account(*address),
            };
            if !seen.insert(owner.address()) {
                return Err(SafeError::DuplicateOwner {
                    account,
                    owner: owner.address(),
                });
            }
            owners.push(owner);
        }

        Ok(AccountNode {
            address: account,
            threshold: config.threshold,
            owners,
            deployed: config.deployed,
            nonce: config.nonce,
            init: config.init.clone(),
            depth,
        })
    }
}
