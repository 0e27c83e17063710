//! # txgraph-primitives
//!
//! Identifier types shared by the txgraph scheduler crates.
//!
//! - [`H256`] / [`TxHash`]: stable 32-byte transaction identifiers
//! - [`ResourceId`]: opaque key of a contended piece of state
//! - [`keccak256`]: hashing helper used to derive both

#![warn(missing_docs)]
#![warn(clippy::all)]

mod hash;
mod resource;

pub use hash::{keccak256, Hash, HashError, TxHash, H256};
pub use resource::ResourceId;
