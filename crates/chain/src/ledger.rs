//! Ledger state.
//!
//! The ledger owns the committed chain, the pending vote pool and the set of
//! known peers. It is a plain value: callers that share it across tasks wrap it
//! in a lock and take the write side for every mutating call.

use crate::peers::{PeerAddressError, PeerSet};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use votechain_consensus::{
    ChainValidator, PowError, ProofOfWork, StopSignal, ValidationError, DEFAULT_DIFFICULTY,
};
use votechain_core::{Block, Vote, VoteId};

/// Errors that can occur during ledger operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Already voted")]
    AlreadyVoted,

    #[error("proof search was interrupted")]
    MiningInterrupted,

    #[error("chain tip moved while the proof was searched")]
    StaleMiningJob,

    #[error("proof {proof} does not solve the tip's proof")]
    ProofRejected { proof: u64 },

    #[error("invalid chain: {0}")]
    InvalidChain(#[from] ValidationError),

    #[error("candidate chain length {candidate} does not exceed local length {local}")]
    ChainNotLonger { candidate: usize, local: usize },

    #[error("candidate chain is empty")]
    EmptyChain,

    #[error("proof of work error: {0}")]
    Pow(#[from] PowError),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Leading zero hex digits required of every proof.
    pub difficulty: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
        }
    }
}

/// Outcome of a mining attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MineResult {
    /// Nothing was pending; the chain is unchanged.
    NoOp,
    /// A new block was appended.
    Forged {
        index: u64,
        votes: Vec<Vote>,
        proof: u64,
        previous_hash: String,
    },
}

/// What a proof search needs, detached from the ledger.
///
/// Taken under a read lock, solved with no lock held, then handed back to
/// [`Ledger::commit`], which only accepts it if the tip is still the same.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningJob {
    /// Hash of the block the new one will extend.
    pub tip_hash: String,
    /// Proof of that block.
    pub last_proof: u64,
    pow: ProofOfWork,
}

impl MiningJob {
    /// Search for the proof, giving up once `stop` fires.
    pub fn solve_until(&self, stop: impl StopSignal) -> Option<u64> {
        self.pow.solve_until(self.last_proof, stop)
    }
}

/// Where a vote currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteLocation {
    /// Admitted but not yet mined.
    Mempool,
    /// Committed in the block with this index.
    Block(u64),
}

impl Serialize for VoteLocation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            VoteLocation::Mempool => serializer.serialize_str("Mempool"),
            VoteLocation::Block(index) => serializer.serialize_u64(*index),
        }
    }
}

/// A vote together with its confirmation status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteInfo {
    #[serde(flatten)]
    pub vote: Vote,
    /// Blocks from the vote's block to the tip, inclusive; 0 while pending.
    pub confirmations: u64,
    /// Block index holding the vote, or `"Mempool"`.
    pub block: VoteLocation,
}

/// The ledger: committed chain, pending votes and known peers.
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Committed blocks, genesis first. Never empty.
    chain: Vec<Block>,
    /// Votes admitted since the last block.
    pending_votes: Vec<Vote>,
    /// Known peer authorities.
    peers: PeerSet,
    /// Validator (and proof engine) for this ledger's difficulty.
    validator: ChainValidator,
}

impl Ledger {
    /// Create a ledger holding only a fresh genesis block.
    pub fn new(config: LedgerConfig) -> Result<Self> {
        let pow = ProofOfWork::new(config.difficulty)?;
        Ok(Self {
            chain: vec![Block::genesis()],
            pending_votes: Vec::new(),
            peers: PeerSet::new(),
            validator: ChainValidator::new(pow),
        })
    }

    /// The committed chain, genesis first.
    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Number of committed blocks, genesis included.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false: the chain holds at least genesis.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// The most recent block.
    pub fn last_block(&self) -> &Block {
        // `chain` is seeded with genesis and only ever replaced by non-empty chains.
        &self.chain[self.chain.len() - 1]
    }

    /// Votes waiting for the next block.
    pub fn pending_votes(&self) -> &[Vote] {
        &self.pending_votes
    }

    /// Known peers.
    pub fn peers(&self) -> &PeerSet {
        &self.peers
    }

    /// The validator this ledger checks chains with.
    pub fn validator(&self) -> &ChainValidator {
        &self.validator
    }

    /// Whether `sender` has a vote anywhere: pending or at any depth of the chain.
    pub fn has_voted(&self, sender: &str) -> bool {
        self.pending_votes.iter().any(|vote| vote.sender == sender)
            || self
                .chain
                .iter()
                .flat_map(|block| block.votes.iter())
                .any(|vote| vote.sender == sender)
    }

    /// Admit a vote into the pending pool.
    ///
    /// A sender may vote once for the lifetime of the ledger.
    pub fn submit(&mut self, sender: &str, recipient: &str) -> Result<VoteId> {
        if self.has_voted(sender) {
            tracing::debug!(sender, "vote rejected: sender already voted");
            return Err(LedgerError::AlreadyVoted);
        }

        let vote = Vote::new(sender, recipient);
        let id = vote.id.clone();
        self.pending_votes.push(vote);

        tracing::debug!(%id, sender, recipient, "vote admitted");
        Ok(id)
    }

    /// Mine the pending pool into a new block.
    ///
    /// The proof search is unbounded; see [`mine_with`](Self::mine_with) for a
    /// stoppable variant.
    pub fn mine(&mut self) -> MineResult {
        if self.pending_votes.is_empty() {
            return MineResult::NoOp;
        }

        let proof = self.validator.pow().solve(self.last_block().proof);
        self.forge(proof)
    }

    /// Mine the pending pool, abandoning the proof search once `stop` fires.
    ///
    /// An interrupted search leaves the ledger untouched.
    pub fn mine_with(&mut self, stop: impl StopSignal) -> Result<MineResult> {
        if self.pending_votes.is_empty() {
            return Ok(MineResult::NoOp);
        }

        let proof = self
            .validator
            .pow()
            .solve_until(self.last_block().proof, stop)
            .ok_or(LedgerError::MiningInterrupted)?;
        Ok(self.forge(proof))
    }

    /// Snapshot the tip for a proof search, or `None` when nothing is pending.
    pub fn mining_job(&self) -> Option<MiningJob> {
        if self.pending_votes.is_empty() {
            return None;
        }

        let tip = self.last_block();
        Some(MiningJob {
            tip_hash: tip.hash_hex(),
            last_proof: tip.proof,
            pow: *self.validator.pow(),
        })
    }

    /// Forge a block from a proof found for `job`.
    ///
    /// Votes admitted during the search are included. Fails with
    /// `StaleMiningJob` if a block was added or the chain was replaced since
    /// the job was taken; the ledger is untouched in every error case.
    pub fn commit(&mut self, job: &MiningJob, proof: u64) -> Result<MineResult> {
        if self.pending_votes.is_empty() {
            return Ok(MineResult::NoOp);
        }

        let tip = self.last_block();
        if tip.hash_hex() != job.tip_hash {
            return Err(LedgerError::StaleMiningJob);
        }
        if !self.validator.pow().is_valid(tip.proof, proof) {
            return Err(LedgerError::ProofRejected { proof });
        }

        Ok(self.forge(proof))
    }

    /// Append a block holding the whole pending pool and empty the pool.
    fn forge(&mut self, proof: u64) -> MineResult {
        let previous_hash = self.last_block().hash_hex();
        let votes = std::mem::take(&mut self.pending_votes);
        let block = Block::new(self.chain.len() as u64, votes, proof, previous_hash);

        let result = MineResult::Forged {
            index: block.index,
            votes: block.votes.clone(),
            proof: block.proof,
            previous_hash: block.previous_hash.clone(),
        };

        tracing::info!(
            index = block.index,
            proof = block.proof,
            votes = block.vote_count(),
            "new block forged"
        );
        self.chain.push(block);

        result
    }

    /// Look up a vote by id, pending pool first.
    pub fn vote_info(&self, id: &VoteId) -> Option<VoteInfo> {
        if let Some(vote) = self.pending_votes.iter().find(|vote| &vote.id == id) {
            return Some(VoteInfo {
                vote: vote.clone(),
                confirmations: 0,
                block: VoteLocation::Mempool,
            });
        }

        let chain_len = self.chain.len() as u64;
        self.chain.iter().find_map(|block| {
            block
                .votes
                .iter()
                .find(|vote| &vote.id == id)
                .map(|vote| VoteInfo {
                    vote: vote.clone(),
                    confirmations: chain_len.saturating_sub(block.index),
                    block: VoteLocation::Block(block.index),
                })
        })
    }

    /// Count committed votes received by each requested account.
    ///
    /// Pending votes are not counted. Every requested account appears in the
    /// result, with 0 if it received nothing.
    pub fn votes_count<I, S>(&self, accounts: I) -> BTreeMap<String, u64>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut counts: BTreeMap<String, u64> = accounts
            .into_iter()
            .map(|account| (account.into(), 0))
            .collect();

        for vote in self.chain.iter().flat_map(|block| block.votes.iter()) {
            if let Some(count) = counts.get_mut(&vote.recipient) {
                *count += 1;
            }
        }

        counts
    }

    /// Register a peer address. Returns the normalized `host:port` stored.
    pub fn register_peer(&mut self, address: &str) -> std::result::Result<String, PeerAddressError> {
        let peer = self.peers.register(address)?;
        tracing::info!(%peer, "peer registered");
        Ok(peer)
    }

    /// Replace the local chain with a strictly longer valid one.
    ///
    /// The pending pool is left as is.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> Result<()> {
        if candidate.is_empty() {
            return Err(LedgerError::EmptyChain);
        }
        if candidate.len() <= self.chain.len() {
            return Err(LedgerError::ChainNotLonger {
                candidate: candidate.len(),
                local: self.chain.len(),
            });
        }
        self.validator.validate(&candidate)?;

        tracing::info!(
            old_len = self.chain.len(),
            new_len = candidate.len(),
            "local chain replaced"
        );
        self.chain = candidate;
        Ok(())
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            chain: vec![Block::genesis()],
            pending_votes: Vec::new(),
            peers: PeerSet::new(),
            validator: ChainValidator::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use votechain_consensus::NeverStop;

    fn setup_ledger() -> Ledger {
        Ledger::new(LedgerConfig { difficulty: 2 }).unwrap()
    }

    #[test]
    fn test_ledger_init() {
        let ledger = setup_ledger();

        assert_eq!(ledger.len(), 1);
        assert!(!ledger.is_empty());
        assert!(ledger.last_block().is_genesis());
        assert!(ledger.pending_votes().is_empty());
        assert!(ledger.peers().is_empty());
    }

    #[test]
    fn test_invalid_difficulty_rejected() {
        assert_eq!(
            Ledger::new(LedgerConfig { difficulty: 0 }).unwrap_err(),
            LedgerError::Pow(PowError::InvalidDifficulty(0))
        );
    }

    #[test]
    fn test_submit_vote() {
        let mut ledger = setup_ledger();

        let id = ledger.submit("alice", "bob").unwrap();
        assert_eq!(ledger.pending_votes().len(), 1);
        assert_eq!(ledger.pending_votes()[0].id, id);
        assert!(ledger.has_voted("alice"));
        assert!(!ledger.has_voted("bob"));
    }

    #[test]
    fn test_double_vote_pending_rejected() {
        let mut ledger = setup_ledger();
        ledger.submit("alice", "bob").unwrap();

        assert_eq!(ledger.submit("alice", "carol"), Err(LedgerError::AlreadyVoted));
        assert_eq!(ledger.pending_votes().len(), 1);
    }

    #[test]
    fn test_double_vote_committed_rejected() {
        let mut ledger = setup_ledger();
        ledger.submit("alice", "bob").unwrap();
        ledger.mine();

        let before = ledger.chain().to_vec();
        assert_eq!(ledger.submit("alice", "carol"), Err(LedgerError::AlreadyVoted));
        assert!(ledger.pending_votes().is_empty());
        assert_eq!(ledger.chain(), &before[..]);
    }

    #[test]
    fn test_mine_empty_pool_is_noop() {
        let mut ledger = setup_ledger();
        assert_eq!(ledger.mine(), MineResult::NoOp);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_mine_commits_pending_votes() {
        let mut ledger = setup_ledger();
        ledger.submit("alice", "bob").unwrap();
        ledger.submit("carol", "bob").unwrap();
        let pending = ledger.pending_votes().to_vec();
        let genesis_hash = ledger.last_block().hash_hex();

        let result = ledger.mine();

        let MineResult::Forged {
            index,
            votes,
            proof,
            previous_hash,
        } = result
        else {
            panic!("expected a forged block");
        };
        assert_eq!(index, 1);
        assert_eq!(votes, pending);
        assert_eq!(previous_hash, genesis_hash);
        assert!(ledger.validator().pow().is_valid(100, proof));

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.last_block().votes, pending);
        assert!(ledger.pending_votes().is_empty());
        assert!(ledger.validator().is_valid_chain(ledger.chain()));
    }

    #[test]
    fn test_mining_job_committed() {
        let mut ledger = setup_ledger();
        assert!(ledger.mining_job().is_none());

        ledger.submit("alice", "bob").unwrap();
        let job = ledger.mining_job().unwrap();
        assert_eq!(job.tip_hash, ledger.last_block().hash_hex());

        let proof = job.solve_until(NeverStop).unwrap();
        ledger.submit("carol", "bob").unwrap();

        let result = ledger.commit(&job, proof).unwrap();
        assert!(matches!(result, MineResult::Forged { index: 1, ref votes, .. } if votes.len() == 2));
        assert!(ledger.pending_votes().is_empty());
        assert!(ledger.validator().is_valid_chain(ledger.chain()));
    }

    #[test]
    fn test_commit_rejects_stale_job() {
        let mut ledger = setup_ledger();
        ledger.submit("alice", "bob").unwrap();
        let job = ledger.mining_job().unwrap();
        let proof = job.solve_until(NeverStop).unwrap();

        // Another miner extends the tip first.
        ledger.mine();
        ledger.submit("carol", "bob").unwrap();

        assert_eq!(ledger.commit(&job, proof), Err(LedgerError::StaleMiningJob));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.pending_votes().len(), 1);
    }

    #[test]
    fn test_commit_rejects_bad_proof() {
        let mut ledger = setup_ledger();
        ledger.submit("alice", "bob").unwrap();
        let job = ledger.mining_job().unwrap();

        let pow = *ledger.validator().pow();
        let bad = (0..).find(|p| !pow.is_valid(job.last_proof, *p)).unwrap();

        assert_eq!(
            ledger.commit(&job, bad),
            Err(LedgerError::ProofRejected { proof: bad })
        );
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.pending_votes().len(), 1);
    }

    #[test]
    fn test_commit_after_pool_drained_is_noop() {
        let mut ledger = setup_ledger();
        ledger.submit("alice", "bob").unwrap();
        let job = ledger.mining_job().unwrap();
        let proof = job.solve_until(NeverStop).unwrap();
        ledger.mine();

        assert_eq!(ledger.commit(&job, proof), Ok(MineResult::NoOp));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_mine_with_interrupted_leaves_state() {
        let mut ledger = Ledger::new(LedgerConfig { difficulty: 64 }).unwrap();
        ledger.submit("alice", "bob").unwrap();

        let stop = std::sync::atomic::AtomicBool::new(true);
        assert_eq!(ledger.mine_with(&stop), Err(LedgerError::MiningInterrupted));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.pending_votes().len(), 1);
    }

    #[test]
    fn test_vote_info_pending_and_committed() {
        let mut ledger = setup_ledger();
        let id = ledger.submit("alice", "bob").unwrap();

        let info = ledger.vote_info(&id).unwrap();
        assert_eq!(info.block, VoteLocation::Mempool);
        assert_eq!(info.confirmations, 0);

        ledger.mine();
        let info = ledger.vote_info(&id).unwrap();
        assert_eq!(info.block, VoteLocation::Block(1));
        assert_eq!(info.confirmations, 1);

        ledger.submit("carol", "bob").unwrap();
        ledger.mine();
        let info = ledger.vote_info(&id).unwrap();
        assert_eq!(info.confirmations, 2);
        assert_eq!(info.vote.sender, "alice");
    }

    #[test]
    fn test_vote_info_unknown() {
        let ledger = setup_ledger();
        assert!(ledger.vote_info(&VoteId::generate()).is_none());
    }

    #[test]
    fn test_vote_info_json_shape() {
        let mut ledger = setup_ledger();
        let id = ledger.submit("alice", "bob").unwrap();

        let pending = serde_json::to_value(ledger.vote_info(&id).unwrap()).unwrap();
        assert_eq!(pending["block"], "Mempool");
        assert_eq!(pending["confirmations"], 0);
        assert_eq!(pending["id"], id.as_str());
        assert_eq!(pending["sender"], "alice");

        ledger.mine();
        let committed = serde_json::to_value(ledger.vote_info(&id).unwrap()).unwrap();
        assert_eq!(committed["block"], 1);
    }

    #[test]
    fn test_votes_count_only_committed() {
        let mut ledger = setup_ledger();
        ledger.submit("alice", "bob").unwrap();
        ledger.submit("carol", "bob").unwrap();
        ledger.submit("dave", "erin").unwrap();
        ledger.mine();
        ledger.submit("frank", "bob").unwrap();

        let counts = ledger.votes_count(["bob", "erin", "nobody"]);
        assert_eq!(counts["bob"], 2);
        assert_eq!(counts["erin"], 1);
        assert_eq!(counts["nobody"], 0);
        assert_eq!(counts.len(), 3);
    }

    #[test]
    fn test_register_peer() {
        let mut ledger = setup_ledger();
        assert_eq!(
            ledger.register_peer("http://127.0.0.1:5001").unwrap(),
            "127.0.0.1:5001"
        );
        assert!(ledger.register_peer("").is_err());
        assert_eq!(ledger.peers().len(), 1);
    }

    #[test]
    fn test_replace_chain_requires_longer_valid_chain() {
        let mut ours = setup_ledger();
        let mut theirs = setup_ledger();
        for voter in ["a", "b"] {
            theirs.submit(voter, "x").unwrap();
            theirs.mine();
        }

        let equal = ours.chain().to_vec();
        assert!(matches!(
            ours.replace_chain(equal),
            Err(LedgerError::ChainNotLonger { .. })
        ));
        assert_eq!(ours.replace_chain(Vec::new()), Err(LedgerError::EmptyChain));

        let mut tampered = theirs.chain().to_vec();
        tampered[1].previous_hash = "f".repeat(64);
        assert!(matches!(
            ours.replace_chain(tampered),
            Err(LedgerError::InvalidChain(_))
        ));
        assert_eq!(ours.len(), 1);

        ours.submit("pending", "x").unwrap();
        ours.replace_chain(theirs.chain().to_vec()).unwrap();
        assert_eq!(ours.chain(), theirs.chain());
        assert_eq!(ours.pending_votes().len(), 1);
    }
}
