//! Agent lifecycle: `register_agent`, `unregister_agent`,
//! `get_agent_status`, `update_agent_heartbeat`, `set_agent_state`.

use super::SwarmCoordinator;
use crate::domain::{Agent, AgentMetadata, AgentState};
use crate::error::CoordinatorError;
use chrono::Utc;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// Snapshot returned by [`SwarmCoordinator::get_agent_status`]: the stored
/// record plus the derived fields calls out.
#[derive(Debug, Clone)]
pub struct AgentStatusRecord {
    /// The stored registry record.
    pub agent: Agent,
    /// Seconds elapsed since `agent.last_heartbeat`, as of the query.
    pub heartbeat_age_seconds: f64,
    /// `"root"` for the topology's fixed root/hub, `"member"` otherwise.
    pub topology_role: String,
}

impl SwarmCoordinator {
    /// Admit `id` into both the registry and the active topology.
    ///
    /// `ACTIVE`, heartbeat stamped now. Hierarchical topologies require
    /// `metadata.layer`/`metadata.parent_id` for every id other than the
    /// currently configured root.
    #[instrument(skip(self, metadata), fields(swarm_id = %self.swarm_id))]
    pub async fn register_agent(&self, id: &str, metadata: AgentMetadata) -> Result<(), CoordinatorError> {
        if self.agents.read().await.contains_key(id) {
            return Err(CoordinatorError::AgentAlreadyExists(id.to_string()));
        }

        let topology = self.topology.read().await.clone();
        if topology.topology_type() == "hierarchical" {
            let root = self.special_agent_id.read().await.clone();
            if root.as_deref() != Some(id) && (metadata.layer.is_none() || metadata.parent_id.is_none()) {
                return Err(CoordinatorError::InvalidMetadata(format!(
                    "agent {id} requires layer/parent_id under the active hierarchical topology"
                )));
            }
        }

        topology.connect(id, &metadata).await?;

        let agent = Agent::new(id, metadata, Utc::now());
        self.agents.write().await.insert(id.to_string(), agent);
        let _ = self.heartbeat.start_monitoring(id, None, None).await;
        info!(agent_id = id, "agent registered");
        Ok(())
    }

    /// Remove `id` from the registry, the active topology, and the heartbeat monitor.
    #[instrument(skip(self), fields(swarm_id = %self.swarm_id))]
    pub async fn unregister_agent(&self, id: &str) -> Result<(), CoordinatorError> {
        self.agents
            .write()
            .await
            .remove(id)
            .ok_or_else(|| CoordinatorError::UnknownAgent(id.to_string()))?;

        let topology = self.topology.read().await.clone();
        if let Err(err) = topology.disconnect(id).await {
            warn!(agent_id = id, %err, "topology disconnect failed during unregister");
        }
        let _ = self.heartbeat.stop_monitoring(id).await;
        info!(agent_id = id, "agent unregistered");
        Ok(())
    }

    /// The stored record plus derived heartbeat age and topology role, or
    /// `None` when `id` has no registry entry.
    pub async fn get_agent_status(&self, id: &str) -> Option<AgentStatusRecord> {
        let agents = self.agents.read().await;
        let agent = agents.get(id)?.clone();
        drop(agents);

        let now = Utc::now();
        let heartbeat_age_seconds = (now - agent.last_heartbeat).num_milliseconds().max(0) as f64 / 1000.0;
        let root = self.special_agent_id.read().await.clone();
        let topology_role = if root.as_deref() == Some(id) {
            "root".to_string()
        } else {
            "member".to_string()
        };

        Some(AgentStatusRecord { agent, heartbeat_age_seconds, topology_role })
    }

    /// Bump `id`'s heartbeat. Resurrects a `FAILED` agent back to `ACTIVE`
    /// (the state machine: "FAILED -> ACTIVE on new heartbeat").
    #[instrument(skip(self), fields(swarm_id = %self.swarm_id))]
    pub async fn update_agent_heartbeat(&self, id: &str) -> Result<(), CoordinatorError> {
        {
            let mut agents = self.agents.write().await;
            let agent = agents
                .get_mut(id)
                .ok_or_else(|| CoordinatorError::UnknownAgent(id.to_string()))?;
            agent.last_heartbeat = Utc::now();
            if agent.state == AgentState::Failed {
                agent.state = AgentState::Active;
            }
        }
        self.heartbeat.record_heartbeat(id, HashMap::new()).await?;
        Ok(())
    }

    /// Transition `id` to `new_state`, enforcing [`AgentState::can_transition_to`].
    #[instrument(skip(self), fields(swarm_id = %self.swarm_id))]
    pub async fn set_agent_state(&self, id: &str, new_state: AgentState) -> Result<(), CoordinatorError> {
        let mut agents = self.agents.write().await;
        let agent = agents
            .get_mut(id)
            .ok_or_else(|| CoordinatorError::UnknownAgent(id.to_string()))?;

        if !agent.state.can_transition_to(new_state) {
            return Err(CoordinatorError::InvalidTransition {
                from: format!("{:?}", agent.state),
                to: format!("{new_state:?}"),
            });
        }
        agent.state = new_state;
        Ok(())
    }
}
