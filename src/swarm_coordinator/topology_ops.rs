//! Topology introspection and atomic migration: `get_topology_info`,
//! `switch_topology`.

use super::SwarmCoordinator;
use crate::domain::AgentState;
use crate::error::CoordinatorError;
use crate::ports::Topology;
use crate::topologies::{AdaptiveTopology, HierarchicalTopology, MeshTopology, RingTopology, StarTopology};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

/// Root/hub selection for [`SwarmCoordinator::switch_topology`].
///
/// Ignored by topologies that need neither (Mesh, Ring).
#[derive(Debug, Clone, Default)]
pub struct TopologySwitchOptions {
    /// Fixed root for Hierarchical, or the preferred root Adaptive migrates into.
    pub root_agent_id: Option<String>,
    /// Fixed hub for Star.
    pub hub_agent_id: Option<String>,
}

/// Coarse liveness classification over the whole swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwarmHealth {
    /// No agent is FAILED.
    Healthy,
    /// `0 < failed_fraction < 0.3`.
    Degraded,
    /// `failed_fraction >= 0.3`.
    Critical,
}

/// Aggregate shape returned by [`SwarmCoordinator::get_topology_info`].
#[derive(Debug, Clone)]
pub struct TopologyInfo {
    /// Machine-readable active topology type, e.g. `"mesh"`.
    pub topology_type: &'static str,
    /// Number of registered agents.
    pub agent_count: usize,
    /// Number of direct edges the active topology maintains.
    pub connection_count: usize,
    /// Count of agents in each [`AgentState`], keyed by its snake_case name.
    pub state_counts: HashMap<String, usize>,
    /// Total messages currently retained in `message_history`.
    pub message_count: usize,
    /// Overall health classification.
    pub health: SwarmHealth,
}

fn state_key(state: AgentState) -> &'static str {
    match state {
        AgentState::Active => "active",
        AgentState::Idle => "idle",
        AgentState::Busy => "busy",
        AgentState::Failed => "failed",
    }
}

fn build_topology(new_type: &str, options: &TopologySwitchOptions) -> Result<Arc<dyn Topology>, CoordinatorError> {
    match new_type {
        "mesh" => Ok(Arc::new(MeshTopology::new())),
        "ring" => Ok(Arc::new(RingTopology::new())),
        "star" => {
            let hub = options.hub_agent_id.clone().ok_or_else(|| {
                CoordinatorError::InvalidOptions("star topology requires hub_agent_id".to_string())
            })?;
            Ok(Arc::new(StarTopology::new(hub)))
        }
        "hierarchical" => {
            let root = options.root_agent_id.clone().ok_or_else(|| {
                CoordinatorError::InvalidOptions("hierarchical topology requires root_agent_id".to_string())
            })?;
            Ok(Arc::new(HierarchicalTopology::new(root)))
        }
        "adaptive" => Ok(Arc::new(AdaptiveTopology::new(options.root_agent_id.clone()))),
        other => Err(CoordinatorError::InvalidOptions(format!("unknown topology type: {other}"))),
    }
}

impl SwarmCoordinator {
    /// Aggregate connectivity and health stats for the currently active topology.
    pub async fn get_topology_info(&self) -> TopologyInfo {
        let topology = self.topology.read().await.clone();
        let snapshot = topology.snapshot().await;
        let agents = self.agents.read().await;

        let mut state_counts: HashMap<String, usize> = HashMap::new();
        for agent in agents.values() {
            *state_counts.entry(state_key(agent.state).to_string()).or_insert(0) += 1;
        }
        let failed = state_counts.get("failed").copied().unwrap_or(0);
        let total = agents.len().max(1);
        let failed_fraction = failed as f64 / total as f64;
        let health = if failed == 0 {
            SwarmHealth::Healthy
        } else if failed_fraction < 0.3 {
            SwarmHealth::Degraded
        } else {
            SwarmHealth::Critical
        };

        TopologyInfo {
            topology_type: topology.topology_type(),
            agent_count: agents.len(),
            connection_count: snapshot.connection_count,
            state_counts,
            message_count: self.message_history.read().await.len(),
            health,
        }
    }

    /// Build `new_type` fresh, re-insert every registered agent preserving
    /// metadata and state, then atomically swap it in.
    ///
    /// On any failure (unknown type, missing required option, a connect
    /// rejected by the new topology) the active topology is left untouched
    /// ("on any failure the old topology remains active").
    #[instrument(skip(self, options), fields(swarm_id = %self.swarm_id))]
    pub async fn switch_topology(&self, new_type: &str, options: TopologySwitchOptions) -> Result<(), CoordinatorError> {
        let new_topology = build_topology(new_type, &options)?;

        let agents = self.agents.read().await;
        for (id, agent) in agents.iter() {
            new_topology.connect(id, &agent.metadata).await?;
        }
        drop(agents);

        let sync_id = self.synchronizer.agent_id();
        let mut sync_metadata = crate::domain::AgentMetadata::default();
        if new_type == "hierarchical" {
            if let Some(root) = options.root_agent_id.as_deref() {
                if sync_id != root {
                    // Hierarchical requires layer/parent_id for every non-root
                    // agent; place the synchronizer flat under root like any
                    // other agent without a configured placement.
                    sync_metadata = sync_metadata.with_hierarchy(1, root.to_string());
                }
            }
        }
        new_topology.connect(sync_id, &sync_metadata).await?;

        *self.topology.write().await = new_topology.clone();
        *self.special_agent_id.write().await = options.root_agent_id.or(options.hub_agent_id);
        self.synchronizer.set_topology(new_topology).await;

        info!(new_type, "topology switched");
        Ok(())
    }
}
