//! Relay Translation
//!
//! Turns an authorized request into an ERC-4337 v0.7 UserOperation that a
//! bundler can submit without knowing anything about nested ownership.
//!
//! # Reference
//! - <https://eips.ethereum.org/EIPS/eip-4337>

pub mod calldata;
pub mod planner;
pub mod translator;
pub mod user_operation;

pub use planner::*;
pub use translator::*;
pub use user_operation::*;
