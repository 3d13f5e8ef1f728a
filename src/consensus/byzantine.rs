//! PBFT-style Byzantine consensus.
//!
//! A deterministic, in-process simulation of the four phases (pre-prepare,
//! prepare, commit, reply) over a live participant set — there is no real
//! network, so "messages" are simply counted rather than transmitted.

use crate::domain::{ConsensusDecision, ConsensusResult, ParticipantVote, Proposal};
use crate::error::ConsensusError;
use crate::ports::consensus_strategy::intended_vote;
use crate::ports::ConsensusStrategy;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};

/// PBFT-style strategy tolerating up to `fault_tolerance` simultaneous
/// Byzantine/crashed participants, requiring `N >= 3f+1`.
pub struct ByzantineStrategy {
    fault_tolerance: usize,
}

impl ByzantineStrategy {
    /// A strategy tolerating `f` simultaneous faults.
    #[must_use]
    pub const fn new(fault_tolerance: usize) -> Self {
        Self { fault_tolerance }
    }

    fn required_participants(&self) -> usize {
        3 * self.fault_tolerance + 1
    }

    fn commit_threshold(&self) -> usize {
        2 * self.fault_tolerance + 1
    }
}

#[async_trait]
impl ConsensusStrategy for ByzantineStrategy {
    fn name(&self) -> &'static str {
        "byzantine"
    }

    #[instrument(skip(self, proposal, participants), fields(proposal_id = %proposal.proposal_id, f = self.fault_tolerance))]
    async fn propose(
        &self,
        proposal: &Proposal,
        participants: &[String],
        _timeout: Duration,
    ) -> Result<ConsensusResult, ConsensusError> {
        let required = self.required_participants();
        let threshold = self.commit_threshold();

        let mut sorted: Vec<String> = participants.to_vec();
        sorted.sort();
        let primary = sorted.first().cloned();

        let vote_detail: Vec<ParticipantVote> = sorted
            .iter()
            .map(|id| ParticipantVote {
                agent_id: id.clone(),
                vote: intended_vote(proposal, id),
            })
            .collect();

        let votes_for = vote_detail.iter().filter(|v| v.vote == "approve").count();
        let votes_against = vote_detail.len() - votes_for;

        let decision = if sorted.len() < required {
            ConsensusDecision::NoQuorum
        } else if votes_for >= threshold {
            ConsensusDecision::Approved
        } else if votes_for + votes_against < threshold {
            // Too few commit messages gathered before the deadline.
            ConsensusDecision::Timeout
        } else {
            ConsensusDecision::Rejected
        };

        info!(?decision, votes_for, votes_against, required, "byzantine round decided");

        let mut metadata = HashMap::new();
        metadata.insert("primary".to_string(), json!(primary));
        metadata.insert("fault_tolerance".to_string(), json!(self.fault_tolerance));
        metadata.insert("required_participants".to_string(), json!(required));
        metadata.insert("commit_threshold".to_string(), json!(threshold));

        let threshold = f64::from(u32::try_from(threshold).unwrap_or(u32::MAX))
            / f64::from(u32::try_from(sorted.len().max(1)).unwrap_or(u32::MAX));

        Ok(ConsensusResult {
            proposal_id: proposal.proposal_id.clone(),
            decision,
            votes_for,
            votes_against,
            abstain: 0,
            participants: sorted,
            vote_detail,
            threshold,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap as Map;

    fn participants(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("a{i}")).collect()
    }

    #[tokio::test]
    async fn unanimous_honest_votes_approve_at_exact_fault_bound() {
        // N = 3f+1 = 7, f = 2, all honest.
        let strategy = ByzantineStrategy::new(2);
        let proposal = Proposal::new("p1", json!({"op": "scale_up"}), Utc::now());
        let result = strategy
            .propose(&proposal, &participants(7), Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(result.decision, ConsensusDecision::Approved);
        assert_eq!(result.votes_for, 7);
    }

    #[tokio::test]
    async fn insufficient_participants_is_no_quorum() {
        let strategy = ByzantineStrategy::new(2); // requires 7
        let proposal = Proposal::new("p1", json!({}), Utc::now());
        let result = strategy
            .propose(&proposal, &participants(4), Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(result.decision, ConsensusDecision::NoQuorum);
    }

    #[tokio::test]
    async fn dissenting_votes_reject_when_quorum_present_but_threshold_missed() {
        let strategy = ByzantineStrategy::new(1); // requires 4, commit threshold 3
        let mut votes = Map::new();
        for id in ["a0", "a1"] {
            votes.insert(id.to_string(), "reject".to_string());
        }
        let proposal = Proposal::with_votes("p1", json!({}), Utc::now(), votes);
        let result = strategy
            .propose(&proposal, &participants(4), Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(result.decision, ConsensusDecision::Rejected);
    }
}
