//! `ConsensusManager`: a name -> strategy registry plus the coordinator's
//! built-in simple-majority path.

use crate::domain::{ConsensusDecision, ConsensusResult, ParticipantVote, Proposal};
use crate::error::ConsensusError;
use crate::ports::consensus_strategy::intended_vote;
use crate::ports::ConsensusStrategy;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, instrument};

/// Threshold applied by the coordinator-local simple majority path when no
/// strategy is named and no default has been set.
pub const SIMPLE_MAJORITY_THRESHOLD: f64 = 0.51;

/// Registry and dispatcher for the three pluggable consensus algorithms,
/// plus a non-registrable built-in simple-majority vote.
///
/// Selection rule: a caller-named strategy (or an explicitly configured
/// default) is dispatched through the registry; absent both, the manager
/// decides locally via [`SIMPLE_MAJORITY_THRESHOLD`] rather than delegating.
pub struct ConsensusManager {
    strategies: RwLock<HashMap<String, Arc<dyn ConsensusStrategy>>>,
    default_strategy: RwLock<Option<String>>,
}

impl ConsensusManager {
    /// An empty manager with no registered strategies and no default.
    #[must_use]
    pub fn new() -> Self {
        Self {
            strategies: RwLock::new(HashMap::new()),
            default_strategy: RwLock::new(None),
        }
    }

    /// A manager pre-populated with Byzantine, Raft, and Gossip under their
    /// canonical names, default-tuned.
    #[must_use]
    pub fn with_default_strategies() -> Self {
        let manager = Self::new();
        manager.register_sync(Arc::new(crate::consensus::ByzantineStrategy::new(1)));
        manager.register_sync(Arc::new(crate::consensus::RaftStrategy::default()));
        manager.register_sync(Arc::new(crate::consensus::GossipStrategy::default()));
        manager
    }

    fn register_sync(&self, strategy: Arc<dyn ConsensusStrategy>) {
        self.strategies
            .try_write()
            .expect("no contention during construction")
            .insert(strategy.name().to_string(), strategy);
    }

    /// Add or replace a strategy under its own [`ConsensusStrategy::name`].
    pub async fn register(&self, strategy: Arc<dyn ConsensusStrategy>) {
        self.strategies
            .write()
            .await
            .insert(strategy.name().to_string(), strategy);
    }

    /// Set the strategy used for calls that name none explicitly.
    ///
    /// `None` restores the built-in simple-majority path.
    pub async fn set_default(&self, name: Option<String>) -> Result<(), ConsensusError> {
        if let Some(ref n) = name {
            if !self.strategies.read().await.contains_key(n) {
                return Err(ConsensusError::UnknownStrategy(n.clone()));
            }
        }
        *self.default_strategy.write().await = name;
        Ok(())
    }

    /// Resolve a proposal to a decision, using `strategy_name` if given,
    /// else the configured default, else the built-in simple majority.
    #[instrument(skip(self, proposal, participants), fields(proposal_id = %proposal.proposal_id, strategy_name))]
    pub async fn propose(
        &self,
        proposal: &Proposal,
        participants: &[String],
        timeout: Duration,
        strategy_name: Option<&str>,
    ) -> Result<ConsensusResult, ConsensusError> {
        let resolved_name = match strategy_name {
            Some(name) => Some(name.to_string()),
            None => self.default_strategy.read().await.clone(),
        };

        match resolved_name {
            Some(name) => {
                let strategy = self
                    .strategies
                    .read()
                    .await
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| ConsensusError::UnknownStrategy(name.clone()))?;
                info!(strategy = %name, "dispatching to registered consensus strategy");
                strategy.propose(proposal, participants, timeout).await
            }
            None => {
                info!("no strategy named; deciding via built-in simple majority");
                Ok(simple_majority(proposal, participants))
            }
        }
    }
}

impl Default for ConsensusManager {
    fn default() -> Self {
        Self::with_default_strategies()
    }
}

/// The coordinator-local decision path: every
/// participant's vote defaults to "approve" absent a seed entry, and the
/// proposal passes when the approval ratio meets
/// [`SIMPLE_MAJORITY_THRESHOLD`] with at least one participant.
fn simple_majority(proposal: &Proposal, participants: &[String]) -> ConsensusResult {
    let mut sorted: Vec<String> = participants.to_vec();
    sorted.sort();

    if sorted.is_empty() {
        return ConsensusResult {
            proposal_id: proposal.proposal_id.clone(),
            decision: ConsensusDecision::NoQuorum,
            votes_for: 0,
            votes_against: 0,
            abstain: 0,
            participants: sorted,
            vote_detail: Vec::new(),
            threshold: SIMPLE_MAJORITY_THRESHOLD,
            metadata: HashMap::new(),
        };
    }

    let vote_detail: Vec<ParticipantVote> = sorted
        .iter()
        .map(|id| ParticipantVote {
            agent_id: id.clone(),
            vote: intended_vote(proposal, id),
        })
        .collect();
    let votes_for = vote_detail.iter().filter(|v| v.vote == "approve").count();
    let votes_against = vote_detail.len() - votes_for;
    let ratio = f64::from(u32::try_from(votes_for).unwrap_or(u32::MAX))
        / f64::from(u32::try_from(votes_for + votes_against).unwrap_or(u32::MAX));

    let decision = if ratio >= SIMPLE_MAJORITY_THRESHOLD {
        ConsensusDecision::Approved
    } else {
        ConsensusDecision::Rejected
    };

    ConsensusResult {
        proposal_id: proposal.proposal_id.clone(),
        decision,
        votes_for,
        votes_against,
        abstain: 0,
        participants: sorted,
        vote_detail,
        threshold: SIMPLE_MAJORITY_THRESHOLD,
        metadata: HashMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn no_strategy_named_uses_simple_majority() {
        let manager = ConsensusManager::with_default_strategies();
        let proposal = Proposal::new("p1", json!({}), Utc::now());
        let participants = vec!["a1".to_string(), "a2".to_string(), "a3".to_string()];
        let result = manager
            .propose(&proposal, &participants, Duration::from_millis(200), None)
            .await
            .unwrap();
        assert_eq!(result.decision, ConsensusDecision::Approved);
    }

    #[tokio::test]
    async fn named_strategy_dispatches_to_registry() {
        let manager = ConsensusManager::with_default_strategies();
        let proposal = Proposal::new("p1", json!({}), Utc::now());
        let participants = vec!["a1".to_string()];
        let result = manager
            .propose(&proposal, &participants, Duration::from_millis(200), Some("raft"))
            .await
            .unwrap();
        assert_eq!(result.decision, ConsensusDecision::Approved);
        assert!(result.metadata.contains_key("term"));
    }

    #[tokio::test]
    async fn unknown_strategy_name_errors() {
        let manager = ConsensusManager::with_default_strategies();
        let proposal = Proposal::new("p1", json!({}), Utc::now());
        let err = manager
            .propose(&proposal, &[], Duration::from_millis(200), Some("paxos"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsensusError::UnknownStrategy(_)));
    }

    #[tokio::test]
    async fn zero_live_agents_is_no_quorum_via_simple_majority() {
        let manager = ConsensusManager::with_default_strategies();
        let proposal = Proposal::new("p1", json!({}), Utc::now());
        let result = manager
            .propose(&proposal, &[], Duration::from_millis(200), None)
            .await
            .unwrap();
        assert_eq!(result.decision, ConsensusDecision::NoQuorum);
    }
}
