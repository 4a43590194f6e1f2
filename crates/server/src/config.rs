//! Command-line configuration for a node.

use crate::client::DEFAULT_MAX_CHAIN_BYTES;
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::Level;
use votechain_chain::{LedgerConfig, ResolverConfig, DEFAULT_DIFFICULTY};

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_PEER_TIMEOUT_MS: u64 = 5000;

#[derive(Parser, Debug)]
#[command(name = "votechain-node")]
#[command(about = "A minimal proof-of-work voting ledger node", long_about = None)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Peer to register at startup (repeatable)
    #[arg(long = "peer", value_name = "ADDRESS")]
    pub peers: Vec<String>,

    /// Per-peer timeout during consensus resolution, in milliseconds
    #[arg(long, default_value_t = DEFAULT_PEER_TIMEOUT_MS)]
    pub peer_timeout_ms: u64,

    /// Largest chain response accepted from a peer, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_CHAIN_BYTES)]
    pub max_peer_body_bytes: usize,

    /// Leading zero hex digits required of every proof
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    pub difficulty: usize,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            difficulty: self.difficulty,
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            peer_timeout: Duration::from_millis(self.peer_timeout_ms),
        }
    }

    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}
