//! Execution Planning
//!
//! Runs the whole flow for one request: pick the executor, aggregate the
//! root's signature, let every account below it on the path call its
//! parent's `execTransaction`, and package the executor's call as the relay
//! operation.

use super::calldata;
use super::translator::OperationTranslator;
use super::user_operation::UserOperation;
use crate::aggregator::{AggregatedSignature, SignatureAggregator};
use crate::config::RelayConfig;
use crate::error::{SafeError, SafeResult};
use crate::request::{AuthorizationRequest, Operation};
use crate::signer::{KeyRing, SignerFactory};
use crate::tree::{ExecutorPath, OwnershipTree};
use crate::{log_debug, log_info, log_warn};
use ethers_core::types::{Address, Bytes, H256, U256};
use serde::Serialize;

/// One account's authorization along the executor path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub account: Address,
    pub request: AuthorizationRequest,
    pub signature: AggregatedSignature,
    /// Encoded form of `signature`
    pub encoded_signature: Bytes,
}

/// Completed plan ready to hand to the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayPlan {
    pub chain_id: u64,
    pub entry_point: Address,
    pub path: ExecutorPath,
    /// Root first, executor last
    pub steps: Vec<PlanStep>,
    pub user_operation: UserOperation,
    pub user_op_hash: H256,
}

impl RelayPlan {
    pub fn executor_step(&self) -> Option<&PlanStep> {
        self.steps.last()
    }
}

pub struct RelayPlanner<'a> {
    tree: &'a OwnershipTree,
    factory: &'a dyn SignerFactory,
    config: &'a RelayConfig,
}

impl<'a> RelayPlanner<'a> {
    pub fn new(
        tree: &'a OwnershipTree,
        factory: &'a dyn SignerFactory,
        config: &'a RelayConfig,
    ) -> Self {
        Self {
            tree,
            factory,
            config,
        }
    }

    /// Plan the relayed execution of `request` by the tree's root account
    pub fn plan(&self, request: &AuthorizationRequest, keys: &KeyRing) -> SafeResult<RelayPlan> {
        if self.config.chain_id != self.tree.chain_id() {
            return Err(SafeError::invalid_input(format!(
                "Relay configured for chain {} but accounts are on chain {}",
                self.config.chain_id,
                self.tree.chain_id()
            )));
        }
        request.window().validate()?;

        let path = self.tree.executor_path()?;
        self.check_path_deployed(&path)?;
        let aggregator = SignatureAggregator::new(self.tree, self.factory).with_executor_path(&path);

        let mut steps: Vec<PlanStep> = Vec::with_capacity(path.accounts().len());
        for account in path.accounts() {
            let step_request = match steps.last() {
                None => request.clone(),
                Some(parent) => self.step_request(*account, parent, request)?,
            };
            let signature = aggregator.aggregate(*account, &step_request, keys)?;
            log_debug!(
                "planner",
                "Authorized path step",
                account = account,
                nonce = step_request.nonce
            );
            steps.push(PlanStep {
                account: *account,
                encoded_signature: signature.to_bytes(),
                request: step_request,
                signature,
            });
        }

        let executor = self.tree.account(path.executor())?;
        let leaf = steps
            .last()
            .ok_or(SafeError::NoExecutorFound)?;
        let user_operation =
            OperationTranslator::to_relay_operation(&leaf.request, &leaf.signature, &executor.meta())?;
        let user_op_hash = user_operation.get_hash(self.config.entry_point, self.config.chain_id);

        log_info!(
            "planner",
            "Planned relay operation",
            executor = path.executor(),
            steps = steps.len(),
            user_op_hash = user_op_hash
        );

        Ok(RelayPlan {
            chain_id: self.config.chain_id,
            entry_point: self.config.entry_point,
            path,
            steps,
            user_operation,
            user_op_hash,
        })
    }

    /// Every account above the executor receives an `execTransaction` call,
    /// so only the executor itself may still be awaiting deployment
    fn check_path_deployed(&self, path: &ExecutorPath) -> SafeResult<()> {
        let above_executor = &path.accounts()[..path.accounts().len().saturating_sub(1)];
        for account in above_executor {
            let node = self.tree.account(*account)?;
            if !node.deployed {
                log_warn!(
                    "planner",
                    "Path account not deployed",
                    account = account,
                    depth = node.depth
                );
                return Err(SafeError::invalid_input(format!(
                    "Account {:?} on the executor path is not deployed",
                    account
                )));
            }
        }
        Ok(())
    }

    /// `account` calling its parent's `execTransaction` with the parent's signature
    fn step_request(
        &self,
        account: Address,
        parent: &PlanStep,
        root: &AuthorizationRequest,
    ) -> SafeResult<AuthorizationRequest> {
        let node = self.tree.account(account)?;
        Ok(AuthorizationRequest {
            to: parent.account,
            value: U256::zero(),
            data: calldata::exec_transaction(&parent.request, &parent.encoded_signature),
            operation: Operation::Call,
            nonce: node.nonce,
            gas: root.gas,
            validity: root.validity,
        })
    }
}
