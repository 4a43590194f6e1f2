/// API server implementation

use super::handlers::*;
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing::info;
use votechain_chain::PeerClient;

/// Build the router serving every ledger endpoint
pub fn router<C: PeerClient>(state: AppState<C>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Ledger endpoints
        .route("/mine", get(mine::<C>))
        .route("/chain", get(full_chain::<C>))
        // Vote endpoints
        .route("/votes/new", post(new_vote::<C>))
        .route("/votes/count", post(votes_count::<C>))
        .route("/votes/:id", get(get_vote::<C>))
        // Peer endpoints
        .route("/nodes/register", post(register_nodes::<C>))
        .route("/nodes/resolve", get(resolve::<C>))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP server exposing a node's ledger
pub struct ApiServer<C> {
    listen_addr: SocketAddr,
    state: AppState<C>,
}

impl<C: PeerClient> ApiServer<C> {
    /// Create a new API server
    pub fn new(listen_addr: SocketAddr, state: AppState<C>) -> Self {
        Self { listen_addr, state }
    }

    /// Start the API server
    pub async fn start(self) -> Result<()> {
        let app = router(self.state);

        info!("API server starting on {}", self.listen_addr);

        let listener = tokio::net::TcpListener::bind(self.listen_addr).await?;

        axum::serve(listener, app)
            .await
            .map_err(|e| anyhow::anyhow!("API server error: {}", e))?;

        Ok(())
    }
}
