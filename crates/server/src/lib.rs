//! HTTP node for votechain.
//!
//! Wires the ledger to the outside world:
//! - [`api`] serves the ledger operations and the `/chain` endpoint peers poll
//! - [`client`] fetches peer chains over HTTP during consensus resolution
//! - [`config`] parses the node's command line

pub mod api;
pub mod client;
pub mod config;

pub use api::{router, ApiServer, AppState};
pub use client::HttpPeerClient;
pub use config::Cli;
