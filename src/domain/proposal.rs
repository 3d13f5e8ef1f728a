//! Consensus proposals and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A one-shot collective decision request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    /// Caller-assigned unique id.
    pub proposal_id: String,
    /// Arbitrary payload: options, description, or (for gossip) a seeding vote map.
    pub payload: Value,
    /// Construction time.
    pub timestamp: DateTime<Utc>,
    /// Pre-seeded per-agent votes, consumed by the gossip strategy (§4.3.3).
    #[serde(default)]
    pub votes: HashMap<String, String>,
}

impl Proposal {
    /// Build a proposal with no pre-seeded votes.
    #[must_use]
    pub fn new(proposal_id: impl Into<String>, payload: Value, now: DateTime<Utc>) -> Self {
        Self {
            proposal_id: proposal_id.into(),
            payload,
            timestamp: now,
            votes: HashMap::new(),
        }
    }

    /// Build a proposal carrying a gossip vote map (agent id -> chosen option).
    #[must_use]
    pub fn with_votes(
        proposal_id: impl Into<String>,
        payload: Value,
        now: DateTime<Utc>,
        votes: HashMap<String, String>,
    ) -> Self {
        Self {
            proposal_id: proposal_id.into(),
            payload,
            timestamp: now,
            votes,
        }
    }
}

/// Final outcome of a consensus round, per the invariant:
/// `decision == Approved` iff `votes_for / (votes_for + votes_against) >= threshold`
/// and participation meets the algorithm's quorum rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusDecision {
    /// Threshold and quorum were both met.
    Approved,
    /// Quorum was met but the threshold was not.
    Rejected,
    /// The strategy did not decide before its deadline.
    Timeout,
    /// Too few live participants to run the algorithm's quorum rule at all.
    NoQuorum,
}

/// Per-participant vote detail recorded in a [`ConsensusResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantVote {
    /// Id of the voting agent.
    pub agent_id: String,
    /// The option or boolean vote cast, rendered as a string for algorithm-agnostic storage.
    pub vote: String,
}

/// The result of a [`crate::ports::ConsensusStrategy::propose`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// Which proposal this result answers.
    pub proposal_id: String,
    /// Final decision.
    pub decision: ConsensusDecision,
    /// Count of votes in favor.
    pub votes_for: usize,
    /// Count of votes against.
    pub votes_against: usize,
    /// Count of abstentions.
    pub abstain: usize,
    /// Ids of every agent that participated (live at proposal time).
    pub participants: Vec<String>,
    /// Per-participant vote detail.
    pub vote_detail: Vec<ParticipantVote>,
    /// The threshold (votes_for / total) the strategy applied.
    pub threshold: f64,
    /// Algorithm-specific extras: `rounds_executed`, `term`, `convergence_ratio`, `primary`, etc.
    pub metadata: HashMap<String, Value>,
}

impl ConsensusResult {
    /// Ratio of `votes_for` to all non-abstaining votes, or `0.0` if none were cast.
    #[must_use]
    pub fn approval_ratio(&self) -> f64 {
        let total = self.votes_for + self.votes_against;
        if total == 0 {
            0.0
        } else {
            f64::from(u32::try_from(self.votes_for).unwrap_or(u32::MAX))
                / f64::from(u32::try_from(total).unwrap_or(u32::MAX))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_ratio_handles_no_votes() {
        let result = ConsensusResult {
            proposal_id: "p1".to_string(),
            decision: ConsensusDecision::NoQuorum,
            votes_for: 0,
            votes_against: 0,
            abstain: 0,
            participants: vec![],
            vote_detail: vec![],
            threshold: 0.51,
            metadata: HashMap::new(),
        };
        assert_eq!(result.approval_ratio(), 0.0);
    }

    #[test]
    fn approval_ratio_computes_fraction() {
        let result = ConsensusResult {
            proposal_id: "p1".to_string(),
            decision: ConsensusDecision::Approved,
            votes_for: 3,
            votes_against: 1,
            abstain: 0,
            participants: vec![],
            vote_detail: vec![],
            threshold: 0.51,
            metadata: HashMap::new(),
        };
        assert!((result.approval_ratio() - 0.75).abs() < f64::EPSILON);
    }
}
