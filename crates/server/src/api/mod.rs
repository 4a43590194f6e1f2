/// REST API module for a votechain node
///
/// Provides HTTP endpoints for clients and peers to:
/// - Submit votes and mine them into blocks
/// - Query votes, tallies and the full chain
/// - Register peers and run consensus resolution

pub mod handlers;
pub mod responses;
pub mod server;


pub use handlers::{AppError, AppState};
pub use responses::*;
pub use server::{router, ApiServer};
