//! Full-clique topology: every pair of agents is directly connected.
//!
//! Direct delivery is always one hop; broadcast reaches every other agent.
//! Recommended for swarms of ≤ 10 agents since connections grow as O(N²)
//!.

use crate::domain::{AgentMetadata, Message};
use crate::error::TopologyError;
use crate::ports::{Inbox, Topology, TopologySnapshot};
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;

/// A mesh (full-clique) topology.
#[derive(Default)]
pub struct MeshTopology {
    agents: RwLock<HashSet<String>>,
    inbox: Inbox,
}

impl MeshTopology {
    /// An empty mesh.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Topology for MeshTopology {
    fn topology_type(&self) -> &'static str {
        "mesh"
    }

    async fn connect(&self, agent_id: &str, _metadata: &AgentMetadata) -> Result<(), TopologyError> {
        self.agents.write().await.insert(agent_id.to_string());
        Ok(())
    }

    async fn disconnect(&self, agent_id: &str) -> Result<(), TopologyError> {
        self.agents.write().await.remove(agent_id);
        self.inbox.clear(agent_id).await;
        Ok(())
    }

    async fn route(&self, sender: &str, recipient: &str, message: Message) -> bool {
        if sender == recipient {
            return false;
        }
        let agents = self.agents.read().await;
        if !agents.contains(sender) || !agents.contains(recipient) {
            return false;
        }
        drop(agents);
        self.inbox.push(recipient, message).await;
        true
    }

    async fn broadcast(
        &self,
        sender: &str,
        message: Message,
        exclude: &HashSet<String>,
    ) -> Vec<String> {
        let agents = self.agents.read().await.clone();
        let mut delivered = Vec::new();
        for agent_id in agents {
            if agent_id == sender || exclude.contains(&agent_id) {
                continue;
            }
            self.inbox.push(&agent_id, message.clone()).await;
            delivered.push(agent_id);
        }
        delivered
    }

    async fn neighbors(&self, agent_id: &str) -> HashSet<String> {
        let agents = self.agents.read().await;
        if !agents.contains(agent_id) {
            return HashSet::new();
        }
        agents.iter().filter(|id| id.as_str() != agent_id).cloned().collect()
    }

    async fn snapshot(&self) -> TopologySnapshot {
        let n = self.agents.read().await.len();
        TopologySnapshot {
            agent_count: n,
            connection_count: n.saturating_sub(1) * n / 2,
            max_hops: Some(1),
        }
    }

    async fn agent_ids(&self) -> Vec<String> {
        self.agents.read().await.iter().cloned().collect()
    }

    async fn inbox(&self, agent_id: &str) -> Vec<Message> {
        self.inbox.peek(agent_id).await
    }
}
