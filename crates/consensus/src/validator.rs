//! Chain validation rules.
//!
//! The validator is the trust boundary for chains received from peers: it
//! accepts any sequence of blocks and checks every link after genesis.

use crate::pow::ProofOfWork;
use thiserror::Error;
use votechain_core::Block;

/// Errors that can occur during validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("block {index} previous_hash does not match the hash of its predecessor")]
    BrokenLink { index: usize },

    #[error("block {index} proof does not solve its predecessor's proof")]
    InvalidProof { index: usize },
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Chain validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainValidator {
    pow: ProofOfWork,
}

impl ChainValidator {
    /// Create a validator checking proofs with the given engine.
    pub fn new(pow: ProofOfWork) -> Self {
        Self { pow }
    }

    /// The proof of work engine used for proof checks.
    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }

    /// Validate that `block` correctly extends `parent`.
    pub fn validate_link(&self, parent: &Block, block: &Block, position: usize) -> Result<()> {
        if block.previous_hash != parent.hash_hex() {
            return Err(ValidationError::BrokenLink { index: position });
        }

        if !self.pow.is_valid(parent.proof, block.proof) {
            return Err(ValidationError::InvalidProof { index: position });
        }

        Ok(())
    }

    /// Validate a whole chain, stopping at the first broken link.
    ///
    /// The first block is taken as given; empty and single-block chains pass.
    pub fn validate(&self, chain: &[Block]) -> Result<()> {
        for (position, pair) in chain.windows(2).enumerate() {
            self.validate_link(&pair[0], &pair[1], position + 1)?;
        }
        Ok(())
    }

    /// Check whether a chain is valid.
    pub fn is_valid_chain(&self, chain: &[Block]) -> bool {
        match self.validate(chain) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(%err, "candidate chain rejected");
                false
            }
        }
    }
}
