//! Proof of Work puzzle.
//!
//! A proof `p'` is valid against the previous proof `p` when the SHA-256
//! digest of the decimal text of `p` followed directly by the decimal text of
//! `p'` starts with `difficulty` zero hex digits. Solving is a linear search
//! upward from zero, so the solution for a given `p` is always the smallest
//! valid integer and any node reproduces it exactly.

use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use votechain_core::hash_concat;

/// Difficulty used by the ledger unless configured otherwise.
pub const DEFAULT_DIFFICULTY: usize = 4;

/// A SHA-256 hex digest has 64 characters.
const MAX_DIFFICULTY: usize = 64;

/// Candidates tried between two polls of the stop signal.
const STOP_POLL_INTERVAL: u64 = 1024;

/// Errors that can occur when configuring proof of work.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PowError {
    #[error("invalid difficulty {0} (must be between 1 and 64)")]
    InvalidDifficulty(usize),
}

pub type Result<T> = std::result::Result<T, PowError>;

/// Something a long-running search can ask whether it should give up.
pub trait StopSignal {
    fn should_stop(&self) -> bool;
}

/// A stop signal that never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStop;

impl StopSignal for NeverStop {
    fn should_stop(&self) -> bool {
        false
    }
}

impl StopSignal for AtomicBool {
    fn should_stop(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl<S: StopSignal + ?Sized> StopSignal for &S {
    fn should_stop(&self) -> bool {
        (**self).should_stop()
    }
}

/// Proof of Work engine with a fixed difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty: usize,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
        }
    }
}

impl ProofOfWork {
    /// Create an engine requiring `difficulty` leading zero hex digits.
    pub fn new(difficulty: usize) -> Result<Self> {
        if difficulty == 0 || difficulty > MAX_DIFFICULTY {
            return Err(PowError::InvalidDifficulty(difficulty));
        }
        Ok(Self { difficulty })
    }

    /// Required number of leading zero hex digits.
    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Check whether `proof` solves the puzzle posed by `last_proof`.
    pub fn is_valid(&self, last_proof: u64, proof: u64) -> bool {
        let last = last_proof.to_string();
        let candidate = proof.to_string();
        let digest = hash_concat(&[last.as_bytes(), candidate.as_bytes()]);
        digest.leading_zero_nibbles() >= self.difficulty
    }

    /// Find the smallest proof valid against `last_proof`.
    ///
    /// Unbounded: runs until a solution is found.
    pub fn solve(&self, last_proof: u64) -> u64 {
        let mut proof = 0;
        while !self.is_valid(last_proof, proof) {
            proof += 1;
        }
        proof
    }

    /// Same search as [`solve`](Self::solve), giving up with `None` once
    /// `stop` fires.
    pub fn solve_until(&self, last_proof: u64, stop: impl StopSignal) -> Option<u64> {
        let mut proof = 0;
        loop {
            if proof % STOP_POLL_INTERVAL == 0 && stop.should_stop() {
                tracing::debug!(last_proof, tried = proof, "proof search stopped");
                return None;
            }
            if self.is_valid(last_proof, proof) {
                return Some(proof);
            }
            proof += 1;
        }
    }
}
