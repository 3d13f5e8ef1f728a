//! Agent registry, message routing, topology switching, and
//! consensus/sync delegation. The central component every
//! other piece of this crate is wired into.
//!
//! Split by concern across `registry.rs`/`messaging.rs`/`topology_ops.rs`/
//! `consensus_ops.rs`, each an `impl SwarmCoordinator` block over the
//! struct defined here.

mod consensus_ops;
mod messaging;
mod registry;
mod topology_ops;

pub use consensus_ops::*;
pub use messaging::*;
pub use registry::*;
pub use topology_ops::*;

use crate::consensus::ConsensusManager;
use crate::domain::{Agent, AgentState, Message};
use crate::heartbeat_monitor::{AlertConfig, HeartbeatMonitor, MonitorConfig, DEFAULT_CHECK_INTERVAL_MS};
use crate::ports::{InMemoryProvider, Topology};
use crate::state_synchronizer::StateSynchronizer;
use crate::topologies::MeshTopology;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Default bound on [`SwarmCoordinator`]'s in-memory message history.
pub const DEFAULT_MESSAGE_HISTORY_CAPACITY: usize = 1_000;

/// Ties together the agent registry, an active [`Topology`], a
/// [`ConsensusManager`], a [`HeartbeatMonitor`], and a [`StateSynchronizer`]
/// into the single public surface described.
///
/// The coordinator exclusively owns [`Agent`] records; topologies
/// and the heartbeat monitor hold only ids.
pub struct SwarmCoordinator {
    swarm_id: String,
    agents: Arc<RwLock<HashMap<String, Agent>>>,
    topology: RwLock<Arc<dyn Topology>>,
    special_agent_id: RwLock<Option<String>>,
    message_history: RwLock<VecDeque<Message>>,
    history_capacity: usize,
    consensus: Arc<ConsensusManager>,
    heartbeat: Arc<HeartbeatMonitor>,
    synchronizer: Arc<StateSynchronizer>,
}

impl SwarmCoordinator {
    /// Build a coordinator over an already-constructed topology, consensus
    /// manager, heartbeat monitor, and synchronizer.
    ///
    /// Wires the heartbeat monitor's `on_failed` transition to the registry
    /// ("only HeartbeatMonitor" marks an agent FAILED), and
    /// pushes `topology` into the synchronizer so its broadcasts reach the
    /// same population the coordinator routes through.
    pub async fn new(
        swarm_id: impl Into<String>,
        topology: Arc<dyn Topology>,
        consensus: Arc<ConsensusManager>,
        heartbeat: Arc<HeartbeatMonitor>,
        synchronizer: Arc<StateSynchronizer>,
        history_capacity: usize,
    ) -> Self {
        let agents: Arc<RwLock<HashMap<String, Agent>>> = Arc::new(RwLock::new(HashMap::new()));

        let failed_agents = agents.clone();
        let alerts = AlertConfig {
            on_failed: vec![Arc::new(move |agent_id: &str, _from, _to| {
                let agents = failed_agents.clone();
                let agent_id = agent_id.to_string();
                tokio::spawn(async move {
                    if let Some(agent) = agents.write().await.get_mut(&agent_id) {
                        agent.state = AgentState::Failed;
                    }
                });
            })],
            ..AlertConfig::default()
        };
        heartbeat.configure_alerts(alerts).await;
        synchronizer.set_topology(topology.clone()).await;

        Self {
            swarm_id: swarm_id.into(),
            agents,
            topology: RwLock::new(topology),
            special_agent_id: RwLock::new(None),
            message_history: RwLock::new(VecDeque::new()),
            history_capacity: history_capacity.max(1),
            consensus,
            heartbeat,
            synchronizer,
        }
    }

    /// A coordinator wired with the stock components: a Mesh topology, all
    /// three consensus strategies, a default-tuned heartbeat monitor, and an
    /// in-memory-backed synchronizer. Convenient for tests and callers who
    /// don't need a durable memory provider or a non-default topology.
    pub async fn with_defaults(swarm_id: impl Into<String>) -> Self {
        let topology: Arc<dyn Topology> = Arc::new(MeshTopology::new());
        let synchronizer_agent_id = "__sync__";
        topology
            .connect(synchronizer_agent_id, &crate::domain::AgentMetadata::default())
            .await
            .expect("mesh connect never fails");

        let consensus = Arc::new(ConsensusManager::with_default_strategies());
        let heartbeat = Arc::new(HeartbeatMonitor::new(MonitorConfig::default(), DEFAULT_CHECK_INTERVAL_MS));
        let memory = Arc::new(InMemoryProvider::new());
        let synchronizer = Arc::new(StateSynchronizer::new(synchronizer_agent_id, topology.clone(), memory));

        Self::new(swarm_id, topology, consensus, heartbeat, synchronizer, DEFAULT_MESSAGE_HISTORY_CAPACITY).await
    }

    /// The swarm id this coordinator namespaces synchronized state under.
    #[must_use]
    pub fn swarm_id(&self) -> &str {
        &self.swarm_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgentMetadata;
    use serde_json::json;

    #[tokio::test]
    async fn register_then_unregister_leaves_no_trace() {
        let coordinator = SwarmCoordinator::with_defaults("swarm1").await;
        coordinator.register_agent("a1", AgentMetadata::new("worker")).await.unwrap();
        assert!(coordinator.get_agent_status("a1").await.is_some());

        coordinator.unregister_agent("a1").await.unwrap();
        assert!(coordinator.get_agent_status("a1").await.is_none());
        assert_eq!(coordinator.get_topology_info().await.agent_count, 0);
    }

    #[tokio::test]
    async fn scenario_a_mesh_broadcast_excludes_sender_and_excluded() {
        let coordinator = SwarmCoordinator::with_defaults("swarm1").await;
        for id in ["a1", "a2", "a3", "a4"] {
            coordinator.register_agent(id, AgentMetadata::new("worker")).await.unwrap();
        }

        let mut exclude = std::collections::HashSet::new();
        exclude.insert("a3".to_string());
        let delivered = coordinator
            .broadcast_message("a1", json!({"hi": 1}), exclude)
            .await
            .unwrap();
        assert_eq!(delivered, 2);
    }

    #[tokio::test]
    async fn send_message_to_unknown_recipient_errors() {
        let coordinator = SwarmCoordinator::with_defaults("swarm1").await;
        coordinator.register_agent("a1", AgentMetadata::new("worker")).await.unwrap();
        let err = coordinator
            .send_message("a1", "ghost", json!(1))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::CoordinatorError::UnknownAgent(id) if id == "ghost"));
    }
}
