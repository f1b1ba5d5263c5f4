//! Relay Configuration
//!
//! Chain presets and the settings the relay planner needs: chain id,
//! entry point, alternate signer factory and default gas parameters.

use crate::error::{SafeError, SafeResult};
use crate::request::{AuthorizationRequest, GasParameters};
use ethers_core::types::{Address, Bytes};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// ERC-4337 v0.7 EntryPoint (same on all chains)
pub const ENTRY_POINT_V07: &str = "0x0000000071727De22E5E9d8BAf0edAc6f37da032";

/// Safe WebAuthn signer factory (same on all chains)
pub const WEBAUTHN_SIGNER_FACTORY: &str = "0x1d31F259eE307358a26dFb23EB365939E8641195";

/// Chains with a known relay (bundler) deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayChain {
    Ethereum,
    Polygon,
    Arbitrum,
    Optimism,
    Base,
    Gnosis,
    Sepolia,
}

impl RelayChain {
    pub fn chain_id(&self) -> u64 {
        match self {
            Self::Ethereum => 1,
            Self::Polygon => 137,
            Self::Arbitrum => 42161,
            Self::Optimism => 10,
            Self::Base => 8453,
            Self::Gnosis => 100,
            Self::Sepolia => 11155111,
        }
    }

    pub fn entry_point(&self) -> Address {
        parse_constant(ENTRY_POINT_V07)
    }
}

impl FromStr for RelayChain {
    type Err = SafeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ethereum" | "eth" | "mainnet" | "1" => Ok(Self::Ethereum),
            "polygon" | "matic" | "137" => Ok(Self::Polygon),
            "arbitrum" | "arb" | "42161" => Ok(Self::Arbitrum),
            "optimism" | "op" | "10" => Ok(Self::Optimism),
            "base" | "8453" => Ok(Self::Base),
            "gnosis" | "xdai" | "100" => Ok(Self::Gnosis),
            "sepolia" | "11155111" => Ok(Self::Sepolia),
            _ => Err(SafeError::invalid_input(format!("Unknown relay chain: {}", s))),
        }
    }
}

/// Settings for building relay operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    pub chain_id: u64,
    pub entry_point: Address,
    pub signer_factory: Address,
    #[serde(default)]
    pub signer_creation_code: Bytes,
    #[serde(default)]
    pub default_gas: GasParameters,
}

impl RelayConfig {
    /// Preset for a known chain
    pub fn for_chain(chain: RelayChain) -> Self {
        Self {
            chain_id: chain.chain_id(),
            entry_point: chain.entry_point(),
            signer_factory: parse_constant(WEBAUTHN_SIGNER_FACTORY),
            signer_creation_code: Bytes::default(),
            default_gas: GasParameters::default(),
        }
    }

    pub fn from_json(json: &str) -> SafeResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse an authorization request, filling omitted gas from `default_gas`
    pub fn parse_request(&self, json: &str) -> SafeResult<AuthorizationRequest> {
        AuthorizationRequest::from_json_with_gas(json, &self.default_gas)
    }

    pub fn validate(&self) -> SafeResult<()> {
        if self.chain_id == 0 {
            return Err(SafeError::invalid_input("chainId must be non-zero"));
        }
        if self.entry_point.is_zero() {
            return Err(SafeError::invalid_input("entryPoint must be set"));
        }
        if self.signer_factory.is_zero() {
            return Err(SafeError::invalid_input("signerFactory must be set"));
        }
        if self.default_gas.call_gas_limit == 0 || self.default_gas.verification_gas_limit == 0 {
            return Err(SafeError::invalid_input("default gas limits must be non-zero"));
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::for_chain(RelayChain::Sepolia)
    }
}

fn parse_constant(address: &str) -> Address {
    Address::from_str(address).unwrap_or_default()
}
