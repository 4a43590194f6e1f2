//! Proof of Work consensus for votechain.
//!
//! This crate provides:
//! - The proof of work puzzle binding consecutive blocks
//! - Chain validation (hash links and proofs)
//!
//! # Example
//!
//! ```rust
//! use votechain_consensus::{ChainValidator, ProofOfWork};
//! use votechain_core::Block;
//!
//! let pow = ProofOfWork::new(2).unwrap();
//! let genesis = Block::genesis();
//!
//! let proof = pow.solve(genesis.proof);
//! let next = Block::new(1, vec![], proof, genesis.hash_hex());
//!
//! let validator = ChainValidator::new(pow);
//! assert!(validator.is_valid_chain(&[genesis, next]));
//! ```

pub mod pow;
pub mod validator;

// Re-export commonly used types
pub use pow::{NeverStop, PowError, ProofOfWork, StopSignal, DEFAULT_DIFFICULTY};
pub use validator::{ChainValidator, ValidationError};
