//! Ledger state and peer consensus for votechain.
//!
//! This crate brings the primitives and the proof of work together:
//! - **Ledger**: committed chain, pending vote pool, known peers
//! - **Peers**: peer address normalization and the peer set
//! - **Resolver**: longest-valid-chain consensus across peers
//!
//! # Example
//!
//! ```rust
//! use votechain_chain::{Ledger, LedgerConfig, MineResult};
//!
//! let mut ledger = Ledger::new(LedgerConfig { difficulty: 2 }).unwrap();
//!
//! let id = ledger.submit("alice", "bob").unwrap();
//! assert!(ledger.submit("alice", "carol").is_err());
//!
//! assert!(matches!(ledger.mine(), MineResult::Forged { index: 1, .. }));
//! assert_eq!(ledger.vote_info(&id).unwrap().confirmations, 1);
//! assert_eq!(ledger.votes_count(["bob"])["bob"], 1);
//! ```

pub mod ledger;
pub mod peers;
pub mod resolver;

// Re-export commonly used types
pub use ledger::{
    Ledger, LedgerConfig, LedgerError, MineResult, MiningJob, VoteInfo, VoteLocation,
};
pub use peers::{normalize_peer_address, PeerAddressError, PeerSet};
pub use resolver::{select_longest, PeerChain, PeerClient, PeerError, Resolver, ResolverConfig};
pub use votechain_consensus::DEFAULT_DIFFICULTY;
