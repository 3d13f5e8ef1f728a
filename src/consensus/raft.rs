//! Raft-style one-shot consensus.
//!
//! Models a single decision lifecycle: leader election over the
//! participant set, log replication to a majority, commit. The log is
//! in-memory and scoped to this one `propose` call (non-goal:
//! no persistent replicated log; Open Question 1).

use crate::domain::{ConsensusDecision, ConsensusResult, ParticipantVote, Proposal};
use crate::error::ConsensusError;
use crate::ports::consensus_strategy::intended_vote;
use crate::ports::ConsensusStrategy;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};

/// Raft-style strategy. `election_timeout_range`/`heartbeat_interval` are
/// carried for parity with the real protocol's tuning knobs; this one-shot
/// decision model runs a single deterministic election rather than a timed
/// randomized one.
pub struct RaftStrategy {
    election_timeout_range: (Duration, Duration),
    heartbeat_interval: Duration,
}

impl RaftStrategy {
    /// A strategy with explicit election/heartbeat tuning.
    #[must_use]
    pub const fn new(election_timeout_range: (Duration, Duration), heartbeat_interval: Duration) -> Self {
        Self {
            election_timeout_range,
            heartbeat_interval,
        }
    }
}

impl Default for RaftStrategy {
    fn default() -> Self {
        Self::new(
            (Duration::from_millis(150), Duration::from_millis(300)),
            Duration::from_millis(50),
        )
    }
}

#[async_trait]
impl ConsensusStrategy for RaftStrategy {
    fn name(&self) -> &'static str {
        "raft"
    }

    #[instrument(skip(self, proposal, participants), fields(proposal_id = %proposal.proposal_id))]
    async fn propose(
        &self,
        proposal: &Proposal,
        participants: &[String],
        _timeout: Duration,
    ) -> Result<ConsensusResult, ConsensusError> {
        let mut sorted: Vec<String> = participants.to_vec();
        sorted.sort();

        if sorted.is_empty() {
            return Ok(ConsensusResult {
                proposal_id: proposal.proposal_id.clone(),
                decision: ConsensusDecision::NoQuorum,
                votes_for: 0,
                votes_against: 0,
                abstain: 0,
                participants: sorted,
                vote_detail: Vec::new(),
                threshold: 0.0,
                metadata: HashMap::new(),
            });
        }

        // Deterministic "election": lowest id by sort order wins the term,
        // mirroring a real election's outcome without modeling split votes.
        let leader = sorted[0].clone();
        let term = 1u64;
        let majority = sorted.len() / 2 + 1;

        let vote_detail: Vec<ParticipantVote> = sorted
            .iter()
            .map(|id| ParticipantVote {
                agent_id: id.clone(),
                vote: intended_vote(proposal, id),
            })
            .collect();

        let votes_for = vote_detail.iter().filter(|v| v.vote == "approve").count();
        let votes_against = vote_detail.len() - votes_for;

        let decision = if votes_for >= majority {
            ConsensusDecision::Approved
        } else if votes_against >= sorted.len().saturating_sub(majority) + 1 {
            // Enough explicit dissent that a majority can never be reached.
            ConsensusDecision::Rejected
        } else {
            // Acks trickled in below majority with no decisive rejection —
            // treat as a leader crash mid-replication with no successful re-election.
            ConsensusDecision::Timeout
        };

        info!(?decision, %leader, term, majority, "raft round decided");

        let mut metadata = HashMap::new();
        metadata.insert("term".to_string(), json!(term));
        metadata.insert("leader".to_string(), json!(leader));
        metadata.insert("log_index".to_string(), json!(1));
        metadata.insert("majority".to_string(), json!(majority));
        metadata.insert(
            "election_timeout_range_ms".to_string(),
            json!([
                self.election_timeout_range.0.as_millis(),
                self.election_timeout_range.1.as_millis()
            ]),
        );
        metadata.insert(
            "heartbeat_interval_ms".to_string(),
            json!(self.heartbeat_interval.as_millis()),
        );

        let threshold = f64::from(u32::try_from(majority).unwrap_or(u32::MAX))
            / f64::from(u32::try_from(sorted.len()).unwrap_or(u32::MAX));

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
