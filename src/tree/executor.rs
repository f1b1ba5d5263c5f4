//! Executor Selection
//!
//! Only an account owned exclusively by keys can originate a relayed
//! operation without itself needing an aggregated proof. The selector walks
//! the tree depth-first in configured owner order and takes the first such
//! account it meets. This is a fixed, reproducible tie-break: when several
//! accounts qualify, the choice is not cost-optimal, only stable.

use super::builder::OwnershipTree;
use crate::error::{SafeError, SafeResult};
use crate::log_debug;
use ethers_core::types::Address;
use serde::Serialize;
use std::collections::HashSet;

/// Root-to-executor chain of accounts; each account owns the next one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutorPath {
    accounts: Vec<Address>,
}

impl ExecutorPath {
    pub fn root(&self) -> Address {
        self.accounts[0]
    }

    /// The account that originates the relayed operation
    pub fn executor(&self) -> Address {
        self.accounts[self.accounts.len() - 1]
    }

    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    /// The path account directly below `account`, which calls into it
    pub fn caller_of(&self, account: Address) -> Option<Address> {
        let index = self.accounts.iter().position(|a| *a == account)?;
        self.accounts.get(index + 1).copied()
    }

    /// Number of nesting levels between the root and the executor
    pub fn depth(&self) -> usize {
        self.accounts.len() - 1
    }
}

pub struct ExecutorSelector;

impl ExecutorSelector {
    /// First all-key-owned account in pre-order, with the path leading to it
    pub fn select(tree: &OwnershipTree) -> SafeResult<ExecutorPath> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();

        if Self::walk(tree, tree.root(), &mut visited, &mut path) {
            let executor = ExecutorPath { accounts: path };
            log_debug!(
                "executor",
                "Selected executor",
                executor = executor.executor(),
                depth = executor.depth()
            );
            return Ok(executor);
        }
        Err(SafeError::NoExecutorFound)
    }

    fn walk(
        tree: &OwnershipTree,
        account: Address,
        visited: &mut HashSet<Address>,
        path: &mut Vec<Address>,
    ) -> bool {
        if !visited.insert(account) {
            return false;
        }
        // Unvalidated trees may reference accounts they do not contain
        let node = match tree.account(account) {
            Ok(node) => node,
            Err(_) => return false,
        };

        path.push(account);
        if node.is_key_only() {
            return true;
        }
        for child in node.child_accounts() {
            if Self::walk(tree, child, visited, path) {
                return true;
            }
        }
        path.pop();
        false
    }
}

impl OwnershipTree {
    /// See [`ExecutorSelector::select`]
    pub fn executor_path(&self) -> SafeResult<ExecutorPath> {
        ExecutorSelector::select(self)
    }
}
