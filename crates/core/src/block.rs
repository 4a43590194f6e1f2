//! Block structure and canonical hashing.

use crate::hash::{hash, Hash};
use crate::vote::{current_timestamp, Vote};
use serde::{Deserialize, Serialize};

/// `previous_hash` carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "1";

/// Proof carried by the genesis block.
pub const GENESIS_PROOF: u64 = 100;

/// A committed batch of votes linked to its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain (0 for genesis).
    pub index: u64,
    /// Lowercase hex hash of the preceding block, or
    /// [`GENESIS_PREVIOUS_HASH`] for genesis.
    pub previous_hash: String,
    /// Proof-of-work solution against the preceding block's proof.
    pub proof: u64,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
    /// Votes committed by this block, in admission order.
    pub votes: Vec<Vote>,
}

impl Block {
    /// Create a new block stamped with the current time.
    pub fn new(index: u64, votes: Vec<Vote>, proof: u64, previous_hash: String) -> Self {
        Self {
            index,
            previous_hash,
            proof,
            timestamp: current_timestamp(),
            votes,
        }
    }

    /// Create the genesis block.
    pub fn genesis() -> Self {
        Self::new(
            0,
            Vec::new(),
            GENESIS_PROOF,
            GENESIS_PREVIOUS_HASH.to_string(),
        )
    }

    /// Canonical encoding: compact JSON with object keys sorted by name.
    ///
    /// Going through `serde_json::Value` sorts keys regardless of the order
    /// fields are declared in.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let value = serde_json::to_value(self).expect("serialization should not fail");
        serde_json::to_vec(&value).expect("serialization should not fail")
    }

    /// Get the block hash.
    pub fn hash(&self) -> Hash {
        hash(&self.canonical_bytes())
    }

    /// Get the block hash as lowercase hex, the form stored in `previous_hash`.
    pub fn hash_hex(&self) -> String {
        self.hash().to_hex()
    }

    /// Check if this is the genesis block.
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }

    /// Get the number of votes in this block.
    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }
}
