//! Consensus and state-sync delegation: `request_consensus`,
//! `synchronize_state`.

use super::SwarmCoordinator;
use crate::domain::{Agent, AgentState, ConsensusResult, Proposal, StateVersion};
use crate::error::CoordinatorError;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, instrument};

impl SwarmCoordinator {
    /// Delegate `proposal` to the [`crate::consensus::ConsensusManager`],
    /// restricting participants to every agent not currently `FAILED`
    /// ("the set of non-FAILED agents as known by
    /// HeartbeatMonitor").
    #[instrument(skip(self, proposal), fields(swarm_id = %self.swarm_id, proposal_id = %proposal.proposal_id))]
    pub async fn request_consensus(
        &self,
        proposal: &Proposal,
        timeout: Duration,
        strategy_name: Option<&str>,
    ) -> Result<ConsensusResult, CoordinatorError> {
        let participants: Vec<String> = self
            .agents
            .read()
            .await
            .values()
            .filter(|agent: &&Agent| agent.state != AgentState::Failed)
            .map(|agent| agent.id.clone())
            .collect();

        let result = self
            .consensus
            .propose(proposal, &participants, timeout, strategy_name)
            .await?;
        info!(decision = ?result.decision, participants = participants.len(), "consensus resolved");
        Ok(result)
    }

    /// Single-writer fast path over the coordinator's [`StateSynchronizer`]
    ///: stamps the next version for `key`, broadcasts an
    /// informational update, and persists. Always succeeds once persisted,
    /// even when some topology recipients are unreachable.
    #[instrument(skip(self, value), fields(swarm_id = %self.swarm_id, key))]
    pub async fn synchronize_state(&self, key: &str, value: Value) -> Result<StateVersion, CoordinatorError> {
        Ok(self.synchronizer.local_update(&self.swarm_id, key, value).await?)
    }

    /// Full reconciliation of `key` across every agent currently live in
    /// the active topology, via the coordinator's [`StateSynchronizer`].
    #[instrument(skip(self), fields(swarm_id = %self.swarm_id, key))]
    pub async fn synchronize_state_full(&self, key: &str, timeout: Duration) -> Result<(), CoordinatorError> {
        Ok(self.synchronizer.synchronize_state(&self.swarm_id, key, timeout).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentMetadata, ConsensusDecision};
    use crate::swarm_coordinator::SwarmCoordinator;
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn consensus_excludes_failed_agents_from_participants() {
        let coordinator = SwarmCoordinator::with_defaults("swarm1").await;
        for id in ["a1", "a2", "a3"] {
            coordinator.register_agent(id, AgentMetadata::new("worker")).await.unwrap();
        }
        coordinator.set_agent_state("a3", AgentState::Failed).await.unwrap();

        let proposal = Proposal::new("p1", json!({}), Utc::now());
        let result = coordinator
            .request_consensus(&proposal, Duration::from_millis(200), None)
            .await
            .unwrap();
        assert_eq!(result.participants.len(), 2);
        assert!(!result.participants.contains(&"a3".to_string()));
    }

    #[tokio::test]
    async fn zero_live_agents_yields_no_quorum() {
        let coordinator = SwarmCoordinator::with_defaults("swarm1").await;
        let proposal = Proposal::new("p1", json!({}), Utc::now());
        let result = coordinator
            .request_consensus(&proposal, Duration::from_millis(200), None)
            .await
            .unwrap();
        assert_eq!(result.decision, ConsensusDecision::NoQuorum);
    }

    #[tokio::test]
    async fn synchronize_state_bumps_version_each_call() {
        let coordinator = SwarmCoordinator::with_defaults("swarm1").await;
        let first = coordinator.synchronize_state("k", json!(1)).await.unwrap();
        assert_eq!(first.version, 1);
        let second = coordinator.synchronize_state("k", json!(2)).await.unwrap();
        assert_eq!(second.version, 2);
    }
}
