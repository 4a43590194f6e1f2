/// API request and response types

use serde::{Deserialize, Serialize};
use votechain_core::{Block, Vote};

/// Body of POST /votes/new
#[derive(Debug, Deserialize)]
pub struct NewVoteRequest {
    pub sender: Option<String>,
    pub recipient: Option<String>,
}

/// Body of POST /votes/count
#[derive(Debug, Deserialize)]
pub struct VotesCountRequest {
    pub accounts: Option<Vec<String>>,
}

/// Body of POST /nodes/register
#[derive(Debug, Deserialize)]
pub struct RegisterNodesRequest {
    pub nodes: Option<Vec<String>>,
}

/// Outcome of a vote submission
#[derive(Debug, Serialize, Deserialize)]
pub struct VoteSubmitResponse {
    pub success: bool,
    /// Vote id on success, rejection reason otherwise
    pub message: String,
}

/// Outcome of GET /mine
#[derive(Debug, Serialize, Deserialize)]
pub struct MineResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<Vec<Vote>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
}

/// Outcome of POST /nodes/register
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterNodesResponse {
    pub message: String,
    pub total_nodes: Vec<String>,
}

/// Outcome of GET /nodes/resolve
#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub message: String,
    /// Present when the local chain was replaced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_chain: Option<Vec<Block>>,
    /// Present when the local chain was kept
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<Vec<Block>>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

impl ErrorResponse {
    pub fn new(error: String, status: u16) -> Self {
        Self { error, status }
    }
}
