//! Authorization request to relay operation

use super::calldata;
use super::user_operation::UserOperation;
use crate::aggregator::AggregatedSignature;
use crate::error::{SafeError, SafeResult};
use crate::log_debug;
use crate::request::AuthorizationRequest;
use crate::tree::AccountMeta;
use ethers_core::types::U256;

pub struct OperationTranslator;

impl OperationTranslator {
    /// Package `request` and its aggregated signature for the relay.
    ///
    /// All or nothing: a missing factory payload for an undeployed account,
    /// an empty signature or a zero gas limit fails with
    /// `IncompleteOperation` naming the field.
    pub fn to_relay_operation(
        request: &AuthorizationRequest,
        signature: &AggregatedSignature,
        meta: &AccountMeta,
    ) -> SafeResult<UserOperation> {
        let window = request.window();
        window.validate()?;

        if signature.is_empty() {
            return Err(SafeError::IncompleteOperation { field: "signature" });
        }
        if request.gas.call_gas_limit == 0 {
            return Err(SafeError::IncompleteOperation { field: "callGasLimit" });
        }
        if request.gas.verification_gas_limit == 0 {
            return Err(SafeError::IncompleteOperation {
                field: "verificationGasLimit",
            });
        }

        let (factory, factory_data) = if meta.deployed {
            (None, None)
        } else {
            let init = meta
                .init
                .as_ref()
                .ok_or(SafeError::IncompleteOperation { field: "factory" })?;
            if init.factory.is_zero() {
                return Err(SafeError::IncompleteOperation { field: "factory" });
            }
            if init.factory_data.is_empty() {
                return Err(SafeError::IncompleteOperation { field: "factoryData" });
            }
            (Some(init.factory), Some(init.factory_data.clone()))
        };

        let mut packed_signature = window.encode_packed().to_vec();
        packed_signature.extend_from_slice(&signature.to_bytes());

        let operation = UserOperation {
            sender: meta.address,
            nonce: request.nonce,
            factory,
            factory_data,
            call_data: calldata::execute_user_op(request),
            call_gas_limit: U256::from(request.gas.call_gas_limit),
            verification_gas_limit: U256::from(request.gas.verification_gas_limit),
            pre_verification_gas: U256::from(request.gas.pre_verification_gas),
            max_fee_per_gas: U256::from(request.gas.max_fee_per_gas),
            max_priority_fee_per_gas: U256::from(request.gas.max_priority_fee_per_gas),
            signature: packed_signature.into(),
        };

        log_debug!(
            "relay",
            "Translated relay operation",
            sender = meta.address,
            deployed = meta.deployed,
            signature = operation.signature
        );
        Ok(operation)
    }
}
