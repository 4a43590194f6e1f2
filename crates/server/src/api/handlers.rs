/// API request handlers

use super::responses::*;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use votechain_chain::{
    normalize_peer_address, Ledger, LedgerError, MineResult, PeerChain, PeerClient, Resolver,
    VoteInfo,
};
use votechain_core::VoteId;

/// Shared application state
pub struct AppState<C> {
    pub ledger: Arc<RwLock<Ledger>>,
    pub resolver: Resolver<C>,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            resolver: self.resolver.clone(),
        }
    }
}

impl<C: PeerClient> AppState<C> {
    pub fn new(ledger: Ledger, resolver: Resolver<C>) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
            resolver,
        }
    }
}

/// Raises a stop flag when dropped, so an abandoned request ends its proof search.
struct StopOnDrop(Arc<AtomicBool>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Handler for GET /mine
pub async fn mine<C: PeerClient>(
    State(state): State<AppState<C>>,
) -> Result<Json<MineResponse>, AppError> {
    debug!("API: GET /mine");

    let result = loop {
        let Some(job) = state.ledger.read().await.mining_job() else {
            break MineResult::NoOp;
        };

        // The search runs with no ledger lock held; other requests proceed.
        let stop = Arc::new(AtomicBool::new(false));
        let _guard = StopOnDrop(Arc::clone(&stop));
        let search = job.clone();
        let proof = tokio::task::spawn_blocking(move || search.solve_until(&*stop))
            .await
            .map_err(|e| AppError::internal(format!("mining task failed: {e}")))?
            .ok_or_else(|| AppError::internal("proof search was stopped"))?;

        match state.ledger.write().await.commit(&job, proof) {
            Ok(result) => break result,
            Err(LedgerError::StaleMiningJob) => {
                debug!("chain tip moved during proof search, mining again");
            }
            Err(e) => return Err(AppError::internal(e.to_string())),
        }
    };

    let response = match result {
        MineResult::NoOp => MineResponse {
            message: "No pending votes, no need to mine new block".to_string(),
            index: None,
            votes: None,
            proof: None,
            previous_hash: None,
        },
        MineResult::Forged {
            index,
            votes,
            proof,
            previous_hash,
        } => MineResponse {
            message: "New Block Forged".to_string(),
            index: Some(index),
            votes: Some(votes),
            proof: Some(proof),
            previous_hash: Some(previous_hash),
        },
    };

    Ok(Json(response))
}

/// Handler for POST /votes/new
pub async fn new_vote<C: PeerClient>(
    State(state): State<AppState<C>>,
    Json(body): Json<NewVoteRequest>,
) -> Response {
    debug!("API: POST /votes/new");

    let (Some(sender), Some(recipient)) = (body.sender, body.recipient) else {
        return (StatusCode::BAD_REQUEST, "Missing values").into_response();
    };

    match state.ledger.write().await.submit(&sender, &recipient) {
        Ok(id) => (
            StatusCode::CREATED,
            Json(VoteSubmitResponse {
                success: true,
                message: id.to_string(),
            }),
        )
            .into_response(),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            Json(VoteSubmitResponse {
                success: false,
                message: err.to_string(),
            }),
        )
            .into_response(),
    }
}

/// Handler for POST /votes/count
pub async fn votes_count<C: PeerClient>(
    State(state): State<AppState<C>>,
    Json(body): Json<VotesCountRequest>,
) -> Response {
    debug!("API: POST /votes/count");

    let accounts = match body.accounts {
        Some(accounts) if !accounts.is_empty() => accounts,
        _ => return (StatusCode::BAD_REQUEST, "Missing accounts").into_response(),
    };

    let counts: BTreeMap<String, u64> = state.ledger.read().await.votes_count(accounts);
    (StatusCode::CREATED, Json(counts)).into_response()
}

/// Handler for GET /votes/:id
pub async fn get_vote<C: PeerClient>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> Result<Json<VoteInfo>, AppError> {
    debug!("API: GET /votes/{}", id);

    let vote_id: VoteId = id
        .parse()
        .map_err(|_| AppError::not_found(format!("vote {id} not found")))?;

    state
        .ledger
        .read()
        .await
        .vote_info(&vote_id)
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("vote {id} not found")))
}

/// Handler for GET /chain
pub async fn full_chain<C: PeerClient>(State(state): State<AppState<C>>) -> Json<PeerChain> {
    debug!("API: GET /chain");

    let chain = state.ledger.read().await.chain().to_vec();
    Json(PeerChain::new(chain))
}

/// Handler for POST /nodes/register
pub async fn register_nodes<C: PeerClient>(
    State(state): State<AppState<C>>,
    Json(body): Json<RegisterNodesRequest>,
) -> Result<(StatusCode, Json<RegisterNodesResponse>), AppError> {
    debug!("API: POST /nodes/register");

    let nodes = body
        .nodes
        .ok_or_else(|| AppError::bad_request("Error: Please supply a valid list of nodes"))?;

    // Reject the whole request before touching the peer set.
    for node in &nodes {
        normalize_peer_address(node)
            .map_err(|e| AppError::bad_request(format!("Error: {e}")))?;
    }

    let mut ledger = state.ledger.write().await;
    for node in &nodes {
        ledger
            .register_peer(node)
            .map_err(|e| AppError::bad_request(format!("Error: {e}")))?;
    }

    Ok((
        StatusCode::CREATED,
        Json(RegisterNodesResponse {
            message: "New nodes have been added".to_string(),
            total_nodes: ledger.peers().to_vec(),
        }),
    ))
}

/// Handler for GET /nodes/resolve
pub async fn resolve<C: PeerClient>(State(state): State<AppState<C>>) -> Json<ResolveResponse> {
    debug!("API: GET /nodes/resolve");

    let replaced = state.resolver.resolve_conflicts(&state.ledger).await;
    let chain = state.ledger.read().await.chain().to_vec();

    let response = if replaced {
        info!(length = chain.len(), "chain replaced by consensus");
        ResolveResponse {
            message: "Our chain was replaced".to_string(),
            new_chain: Some(chain),
            chain: None,
        }
    } else {
        ResolveResponse {
            message: "Our chain is authoritative".to_string(),
            new_chain: None,
            chain: Some(chain),
        }
    };

    Json(response)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    debug!("API: GET /health");
    (StatusCode::OK, "OK")
}

/// Application error type
pub struct AppError {
    message: String,
    status_code: StatusCode,
}

impl AppError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::NOT_FOUND,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status_code.is_server_error() {
            error!("API Error: {}", self.message);
        } else {
            debug!("API rejection: {}", self.message);
        }

        let body = Json(ErrorResponse::new(
            self.message,
            self.status_code.as_u16(),
        ));

        (self.status_code, body).into_response()
    }
}
