//! Authorization Requests
//!
//! The payload an account authorizes: target, value, call data,
//! operation kind, gas parameters, nonce and an optional validity window.

use crate::error::{SafeError, SafeResult};
use ethers_core::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// Largest value representable as a `uint48`
pub const MAX_UINT48: u64 = (1 << 48) - 1;

/// Operation kind executed by the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    #[default]
    Call,
    DelegateCall,
}

impl Operation {
    /// Numeric encoding used on-chain (0 = call, 1 = delegatecall)
    pub fn as_u8(&self) -> u8 {
        match self {
            Operation::Call => 0,
            Operation::DelegateCall => 1,
        }
    }
}

/// Gas limits and fee caps for a relayed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasParameters {
    pub call_gas_limit: u64,
    pub verification_gas_limit: u64,
    pub pre_verification_gas: u64,
    pub max_fee_per_gas: u64,
    pub max_priority_fee_per_gas: u64,
}

impl Default for GasParameters {
    fn default() -> Self {
        Self {
            call_gas_limit: 200_000,
            verification_gas_limit: 100_000,
            pre_verification_gas: 50_000,
            max_fee_per_gas: 2_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
        }
    }
}

/// Not-before / not-after bounds (unix seconds). `valid_until == 0` never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityWindow {
    pub valid_after: u64,
    pub valid_until: u64,
}

impl ValidityWindow {
    pub fn new(valid_after: u64, valid_until: u64) -> Self {
        Self {
            valid_after,
            valid_until,
        }
    }

    pub fn validate(&self) -> SafeResult<()> {
        if self.valid_after > MAX_UINT48 || self.valid_until > MAX_UINT48 {
            return Err(SafeError::invalid_input(format!(
                "Validity window {}..{} does not fit in uint48",
                self.valid_after, self.valid_until
            )));
        }
        if self.valid_until != 0 && self.valid_after >= self.valid_until {
            return Err(SafeError::invalid_input(format!(
                "Validity window is empty: validAfter {} >= validUntil {}",
                self.valid_after, self.valid_until
            )));
        }
        Ok(())
    }

    /// `uint48 validAfter || uint48 validUntil`
    pub fn encode_packed(&self) -> [u8; 12] {
        let mut packed = [0u8; 12];
        packed[..6].copy_from_slice(&self.valid_after.to_be_bytes()[2..]);
        packed[6..].copy_from_slice(&self.valid_until.to_be_bytes()[2..]);
        packed
    }
}

/// An operation to be authorized by a (possibly nested) multisig account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    pub to: Address,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub operation: Operation,
    #[serde(default)]
    pub nonce: U256,
    #[serde(default)]
    pub gas: GasParameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity: Option<ValidityWindow>,
}

impl AuthorizationRequest {
    /// A plain call with default gas and no validity bounds
    pub fn new(to: Address, value: U256, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            value,
            data: data.into(),
            operation: Operation::Call,
            nonce: U256::zero(),
            gas: GasParameters::default(),
            validity: None,
        }
    }

    pub fn with_nonce(mut self, nonce: impl Into<U256>) -> Self {
        self.nonce = nonce.into();
        self
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    pub fn with_gas(mut self, gas: GasParameters) -> Self {
        self.gas = gas;
        self
    }

    pub fn with_validity(mut self, valid_after: u64, valid_until: u64) -> Self {
        self.validity = Some(ValidityWindow::new(valid_after, valid_until));
        self
    }

    /// The effective window (zeroes when unbounded)
    pub fn window(&self) -> ValidityWindow {
        self.validity.unwrap_or_default()
    }

    pub fn from_json(json: &str) -> SafeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a request, taking `gas` from `default_gas` when the JSON omits it
    pub fn from_json_with_gas(json: &str, default_gas: &GasParameters) -> SafeResult<Self> {
        let mut value: serde_json::Value = serde_json::from_str(json)?;
        if let Some(fields) = value.as_object_mut() {
            if !fields.contains_key("gas") {
                fields.insert("gas".to_string(), serde_json::to_value(default_gas)?);
            }
        }
        Ok(serde_json::from_value(value)?)
    }
}
