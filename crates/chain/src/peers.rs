//! Known peer addresses.
//!
//! Peers are stored by their authority component only (`host:port`); any
//! scheme, path or query supplied at registration is dropped.

use http::Uri;
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors that can occur when registering a peer address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeerAddressError {
    #[error("peer address is empty")]
    Empty,

    #[error("peer address {0:?} could not be parsed")]
    Unparseable(String),

    #[error("peer address {0:?} has no host")]
    MissingAuthority(String),
}

pub type Result<T> = std::result::Result<T, PeerAddressError>;

/// Reduce a free-form address to its `host[:port]` authority.
///
/// ```
/// use votechain_chain::normalize_peer_address;
///
/// assert_eq!(normalize_peer_address("http://192.168.0.5:5000/chain").unwrap(), "192.168.0.5:5000");
/// assert_eq!(normalize_peer_address("localhost:5001").unwrap(), "localhost:5001");
/// ```
pub fn normalize_peer_address(address: &str) -> Result<String> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(PeerAddressError::Empty);
    }

    let uri: Uri = trimmed
        .parse()
        .map_err(|_| PeerAddressError::Unparseable(trimmed.to_string()))?;

    match uri.authority() {
        Some(authority) if !authority.host().is_empty() => Ok(authority.as_str().to_string()),
        _ => Err(PeerAddressError::MissingAuthority(trimmed.to_string())),
    }
}

/// Set of known peers, kept in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerSet {
    peers: BTreeSet<String>,
}

impl PeerSet {
    /// Create an empty peer set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize and add an address. Returns the stored form.
    pub fn register(&mut self, address: &str) -> Result<String> {
        let normalized = normalize_peer_address(address)?;
        self.peers.insert(normalized.clone());
        Ok(normalized)
    }

    /// Check if a (normalized) peer is known.
    pub fn contains(&self, peer: &str) -> bool {
        self.peers.contains(peer)
    }

    /// Get the number of known peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Check if no peers are known.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Iterate over known peers.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.peers.iter().map(String::as_str)
    }

    /// Known peers as owned strings.
    pub fn to_vec(&self) -> Vec<String> {
        self.peers.iter().cloned().collect()
    }
}
