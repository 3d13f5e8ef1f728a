//! The `ConsensusStrategy` interface shared by Byzantine, Raft, and Gossip
//!. All three return the same result shape so callers are
//! oblivious to which algorithm decided.

use crate::domain::{ConsensusResult, Proposal};
use crate::error::ConsensusError;
use async_trait::async_trait;
use std::time::Duration;

/// A vote every live participant is assumed to cast absent an explicit entry
/// in [`Proposal::votes`] — algorithms that don't model per-agent dissent
/// (Byzantine, Raft) still need *some* value to count, so unlisted
/// participants default to voting in favor.
pub const DEFAULT_VOTE: &str = "approve";

/// Read a participant's intended vote out of the proposal's seed map,
/// defaulting unlisted agents to [`DEFAULT_VOTE`].
#[must_use]
pub fn intended_vote(proposal: &Proposal, agent_id: &str) -> String {
    proposal
        .votes
        .get(agent_id)
        .cloned()
        .unwrap_or_else(|| DEFAULT_VOTE.to_string())
}

/// One of the three interchangeable, pluggable consensus algorithms.
#[async_trait]
pub trait ConsensusStrategy: Send + Sync {
    /// Machine-readable name used as the registry key in [`crate::consensus::ConsensusManager`].
    fn name(&self) -> &'static str;

    /// Run the algorithm's protocol over `participants` and decide `proposal`
    /// within `timeout`, or return `Timeout`/`NoQuorum` if it can't.
    async fn propose(
        &self,
        proposal: &Proposal,
        participants: &[String],
        timeout: Duration,
    ) -> Result<ConsensusResult, ConsensusError>;
}
