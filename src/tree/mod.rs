//! Ownership Tree
//!
//! Who can authorize on behalf of whom. An account snapshot is validated
//! once into an [`OwnershipTree`]; aggregation, executor selection and
//! verification then read it without ever revisiting the raw snapshot.
//!
//! # Example
//! ```rust,ignore
//! use nested_safe::tree::{AccountSnapshot, OwnershipTree};
//!
//! let snapshot = AccountSnapshot::from_json(json)?;
//! let tree = OwnershipTree::build(&snapshot, &factory)?;
//! let path = tree.executor_path()?;
//! ```

pub mod types;
pub mod builder;
pub mod executor;

pub use types::*;
pub use builder::*;
pub use executor::*;
