//! Vote records.
//!
//! A vote is a sender→recipient intent. It is created once on submission and
//! never modified afterwards; its identity is the randomly generated [`VoteId`].

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors produced when parsing a vote id from text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoteIdError {
    #[error("vote id must be {expected} hex characters, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("vote id contains non-hex characters")]
    InvalidHex,
}

/// Number of random bytes behind a vote id.
const VOTE_ID_BYTES: usize = 16;

/// Opaque unique identifier of a vote: 32 lowercase hex characters.
///
/// Deserialization goes through [`FromStr`], so ids inside peer-supplied
/// blocks obey the same format as ids typed into a query.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VoteId(String);

impl VoteId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; VOTE_ID_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// The id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for VoteId {
    type Err = VoteIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != VOTE_ID_BYTES * 2 {
            return Err(VoteIdError::InvalidLength {
                expected: VOTE_ID_BYTES * 2,
                got: s.len(),
            });
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(VoteIdError::InvalidHex);
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for VoteId {
    type Error = VoteIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<VoteId> for String {
    fn from(id: VoteId) -> Self {
        id.0
    }
}

impl fmt::Debug for VoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "VoteId({prefix})")
    }
}

impl fmt::Display for VoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single vote. Fields are declared in lexicographic order, which is also
/// the order they take in the canonical block encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Unique identifier.
    pub id: VoteId,
    /// Account receiving the vote.
    pub recipient: String,
    /// Account casting the vote.
    pub sender: String,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
}

impl Vote {
    /// Create a new vote with a fresh id, stamped with the current time.
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            id: VoteId::generate(),
            recipient: recipient.into(),
            sender: sender.into(),
            timestamp: current_timestamp(),
        }
    }
}

/// Get the current Unix timestamp in milliseconds.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
