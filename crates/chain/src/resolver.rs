//! Longest-valid-chain consensus across peers.
//!
//! Resolution polls every known peer for its chain, keeps the longest one that
//! is strictly longer than the local chain and passes validation, and swaps it
//! in. Peers that fail, time out or answer garbage simply contribute nothing.

use crate::ledger::Ledger;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use votechain_consensus::ChainValidator;
use votechain_core::Block;

/// Errors a single peer fetch can end in. None of them abort resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerError {
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    #[error("peer answered with status {0}")]
    Status(u16),

    #[error("invalid response from peer: {0}")]
    InvalidResponse(String),

    #[error("peer did not answer within {0:?}")]
    Timeout(Duration),
}

/// Chain report served by every node at `/chain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerChain {
    pub chain: Vec<Block>,
    pub length: u64,
}

impl PeerChain {
    /// Build a report for `chain`.
    pub fn new(chain: Vec<Block>) -> Self {
        let length = chain.len() as u64;
        Self { chain, length }
    }

    /// Take the chain out, checking the reported length against the blocks.
    pub fn into_checked_chain(self) -> Result<Vec<Block>, PeerError> {
        if self.length != self.chain.len() as u64 {
            return Err(PeerError::InvalidResponse(format!(
                "reported length {} but sent {} blocks",
                self.length,
                self.chain.len()
            )));
        }
        Ok(self.chain)
    }
}

/// Transport used to fetch a peer's chain.
pub trait PeerClient: Send + Sync + 'static {
    /// Fetch the chain report of `peer` (a `host:port` authority).
    fn fetch_chain(
        &self,
        peer: &str,
    ) -> impl Future<Output = Result<PeerChain, PeerError>> + Send;
}

/// Resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Upper bound on a single peer fetch.
    pub peer_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            peer_timeout: Duration::from_secs(5),
        }
    }
}

/// Pick the longest chain that is strictly longer than `local_len` and valid.
///
/// Ties never win: a later candidate must beat the current best outright.
pub fn select_longest<I>(validator: &ChainValidator, local_len: usize, candidates: I) -> Option<Vec<Block>>
where
    I: IntoIterator<Item = Vec<Block>>,
{
    let mut max_length = local_len;
    let mut best = None;

    for chain in candidates {
        if chain.len() > max_length && validator.is_valid_chain(&chain) {
            max_length = chain.len();
            best = Some(chain);
        }
    }

    best
}

/// Consensus resolver.
pub struct Resolver<C> {
    client: Arc<C>,
    config: ResolverConfig,
}

impl<C> Clone for Resolver<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            config: self.config.clone(),
        }
    }
}

impl<C: PeerClient> Resolver<C> {
    /// Create a resolver fetching through `client`.
    pub fn new(client: C, config: ResolverConfig) -> Self {
        Self {
            client: Arc::new(client),
            config,
        }
    }

    /// The resolver configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Fetch every peer concurrently, each bounded by the peer timeout.
    ///
    /// Results come back in completion order.
    pub async fn fetch_all(&self, peers: Vec<String>) -> Vec<(String, Result<Vec<Block>, PeerError>)> {
        let mut tasks = JoinSet::new();

        for peer in peers {
            let client = Arc::clone(&self.client);
            let timeout = self.config.peer_timeout;
            tasks.spawn(async move {
                let result = match tokio::time::timeout(timeout, client.fetch_chain(&peer)).await {
                    Ok(Ok(report)) => report.into_checked_chain(),
                    Ok(Err(err)) => Err(err),
                    Err(_) => Err(PeerError::Timeout(timeout)),
                };
                (peer, result)
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(err) => tracing::warn!(%err, "peer fetch task failed"),
            }
        }
        results
    }

    /// Run one resolution pass against `ledger`.
    ///
    /// Returns true iff the local chain was replaced. No ledger lock is held
    /// while peers are polled.
    pub async fn resolve_conflicts(&self, ledger: &RwLock<Ledger>) -> bool {
        let (peers, local_len, validator) = {
            let ledger = ledger.read().await;
            (ledger.peers().to_vec(), ledger.len(), *ledger.validator())
        };
        if peers.is_empty() {
            return false;
        }

        let fetched = self.fetch_all(peers).await;
        let candidates = fetched.into_iter().filter_map(|(peer, result)| match result {
            Ok(chain) => {
                tracing::debug!(%peer, length = chain.len(), "peer chain received");
                Some(chain)
            }
            Err(err) => {
                tracing::warn!(%peer, %err, "skipping peer");
                None
            }
        });

        let Some(best) = select_longest(&validator, local_len, candidates) else {
            return false;
        };

        // The local chain may have grown while peers were polled.
        match ledger.write().await.replace_chain(best) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(%err, "longest peer chain no longer applicable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerConfig;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockClient {
        responses: HashMap<String, Result<PeerChain, PeerError>>,
        delays: HashMap<String, Duration>,
    }

    impl MockClient {
        fn with(mut self, peer: &str, response: Result<PeerChain, PeerError>) -> Self {
            self.responses.insert(peer.to_string(), response);
            self
        }

        fn delayed(mut self, peer: &str, delay: Duration) -> Self {
            self.delays.insert(peer.to_string(), delay);
            self
        }
    }

    impl PeerClient for MockClient {
        fn fetch_chain(
            &self,
            peer: &str,
        ) -> impl Future<Output = Result<PeerChain, PeerError>> + Send {
            let response = self
                .responses
                .get(peer)
                .cloned()
                .unwrap_or_else(|| Err(PeerError::Unreachable(peer.to_string())));
            let delay = self.delays.get(peer).copied();
            async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                response
            }
        }
    }

    fn ledger_with_len(len: usize) -> Ledger {
        let mut ledger = Ledger::new(LedgerConfig { difficulty: 2 }).unwrap();
        for i in 1..len {
            ledger.submit(&format!("voter-{i}"), "candidate").unwrap();
            ledger.mine();
        }
        ledger
    }

    fn report(len: usize) -> PeerChain {
        PeerChain::new(ledger_with_len(len).chain().to_vec())
    }

    fn shared(mut ledger: Ledger, peers: &[&str]) -> RwLock<Ledger> {
        for peer in peers {
            ledger.register_peer(peer).unwrap();
        }
        RwLock::new(ledger)
    }

    fn resolver(client: MockClient) -> Resolver<MockClient> {
        Resolver::new(
            client,
            ResolverConfig {
                peer_timeout: Duration::from_millis(100),
            },
        )
    }

    #[test]
    fn test_select_longest_strictly_greater() {
        let validator = *ledger_with_len(1).validator();
        let four = ledger_with_len(4).chain().to_vec();

        assert!(select_longest(&validator, 4, vec![four.clone()]).is_none());
        assert_eq!(select_longest(&validator, 3, vec![four.clone()]), Some(four));
    }

    #[test]
    fn test_select_longest_keeps_maximum() {
        let validator = *ledger_with_len(1).validator();
        let candidates: Vec<_> = [3, 7, 5]
            .into_iter()
            .map(|len| ledger_with_len(len).chain().to_vec())
            .collect();
        let seven = candidates[1].clone();

        assert_eq!(select_longest(&validator, 4, candidates), Some(seven));
    }

    #[test]
    fn test_checked_chain_rejects_length_mismatch() {
        let mut lying = report(2);
        lying.length = 10;
        assert!(matches!(
            lying.into_checked_chain(),
            Err(PeerError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_adopts_longest_valid_chain() {
        let client = MockClient::default()
            .with("a:1", Ok(report(3)))
            .with("b:1", Ok(report(7)))
            .with("c:1", Ok(report(5)));
        let expected = client.responses["b:1"].clone().unwrap().chain;
        let ledger = shared(ledger_with_len(4), &["a:1", "b:1", "c:1"]);

        assert!(resolver(client).resolve_conflicts(&ledger).await);
        assert_eq!(ledger.read().await.chain(), &expected[..]);
    }

    #[tokio::test]
    async fn test_resolve_keeps_local_when_no_peer_longer() {
        let mut tampered = report(9);
        tampered.chain[3].previous_hash = "0".repeat(64);

        let client = MockClient::default()
            .with("a:1", Ok(report(3)))
            .with("b:1", Ok(report(4)))
            .with("c:1", Ok(tampered));
        let local = ledger_with_len(4);
        let before = local.chain().to_vec();
        let ledger = shared(local, &["a:1", "b:1", "c:1"]);

        assert!(!resolver(client).resolve_conflicts(&ledger).await);
        assert_eq!(ledger.read().await.chain(), &before[..]);
    }

    #[tokio::test]
    async fn test_resolve_skips_failing_peers() {
        let client = MockClient::default()
            .with("down:1", Err(PeerError::Unreachable("down:1".into())))
            .with("bad:1", Err(PeerError::Status(500)))
            .with("slow:1", Ok(report(8)))
            .delayed("slow:1", Duration::from_secs(30))
            .with("good:1", Ok(report(3)));
        let expected = client.responses["good:1"].clone().unwrap().chain;
        let ledger = shared(ledger_with_len(1), &["down:1", "bad:1", "slow:1", "good:1"]);

        assert!(resolver(client).resolve_conflicts(&ledger).await);
        assert_eq!(ledger.read().await.chain(), &expected[..]);
    }

    #[tokio::test]
    async fn test_resolve_without_peers() {
        let ledger = shared(ledger_with_len(2), &[]);
        assert!(!resolver(MockClient::default()).resolve_conflicts(&ledger).await);
        assert_eq!(ledger.read().await.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_leaves_pending_votes() {
        let client = MockClient::default().with("a:1", Ok(report(3)));
        let mut local = ledger_with_len(1);
        local.submit("waiting", "candidate").unwrap();
        let ledger = shared(local, &["a:1"]);

        assert!(resolver(client).resolve_conflicts(&ledger).await);
        assert_eq!(ledger.read().await.pending_votes().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_all_reports_timeouts() {
        let client = MockClient::default()
            .with("slow:1", Ok(report(2)))
            .delayed("slow:1", Duration::from_secs(30));
        let results = resolver(client).fetch_all(vec!["slow:1".into()]).await;

        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].1,
            Err(PeerError::Timeout(Duration::from_millis(100)))
        );
    }
}
