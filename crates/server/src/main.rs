//! votechain node entry point.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use votechain_chain::{Ledger, Resolver};
use votechain_server::{ApiServer, AppState, Cli, HttpPeerClient};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .init();

    info!("Starting votechain node v{}", env!("CARGO_PKG_VERSION"));

    let mut ledger = Ledger::new(cli.ledger_config()).context("invalid ledger configuration")?;
    for peer in &cli.peers {
        ledger
            .register_peer(peer)
            .with_context(|| format!("invalid peer address {peer:?}"))?;
    }
    info!(
        difficulty = cli.difficulty,
        peers = ledger.peers().len(),
        "ledger initialized with genesis block"
    );

    let resolver = Resolver::new(
        HttpPeerClient::with_max_body_bytes(cli.max_peer_body_bytes),
        cli.resolver_config(),
    );
    let state = AppState::new(ledger, resolver);

    ApiServer::new(cli.listen_addr(), state).start().await
}
