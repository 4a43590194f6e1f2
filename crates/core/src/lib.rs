//! Core ledger primitives for votechain.
//!
//! This crate provides the fundamental types used throughout the ledger:
//! - SHA-256 hashing
//! - Votes and vote identifiers
//! - Blocks and their canonical encoding

pub mod block;
pub mod hash;
pub mod vote;

// Re-export commonly used types at the crate root
pub use block::{Block, GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
pub use hash::{hash, hash_concat, Hash};
pub use vote::{current_timestamp, Vote, VoteId, VoteIdError};
