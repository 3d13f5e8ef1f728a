//! Adaptive topology: holds an inner topology and reconfigures it when the
//! agent count crosses fixed thresholds — `<5` agents -> Mesh, `5..=10` ->
//! Star, `>10` -> Hierarchical. Migration preserves every
//! currently-connected agent.

use crate::domain::{AgentMetadata, Message};
use crate::error::TopologyError;
use crate::ports::{Topology, TopologySnapshot};
use crate::topologies::{HierarchicalTopology, MeshTopology, StarTopology};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Which concrete topology the adaptive wrapper should be running, given a
/// live agent count.
#[must_use]
fn desired_kind(agent_count: usize) -> &'static str {
    if agent_count < 5 {
        "mesh"
    } else if agent_count <= 10 {
        "star"
    } else {
        "hierarchical"
    }
}

fn build_inner(kind: &str, root: &str) -> Box<dyn Topology> {
    match kind {
        "star" => Box::new(StarTopology::new(root)),
        "hierarchical" => Box::new(HierarchicalTopology::new(root)),
        _ => Box::new(MeshTopology::new()),
    }
}

/// Threshold-driven topology that swaps its inner implementation as the
/// swarm grows or shrinks.
///
/// Unlike the other topologies, Adaptive keeps a local copy of each agent's
/// metadata (Open Question 2 requires it to reconstruct hierarchy
/// placement across migrations, which plain ids can't express).
pub struct AdaptiveTopology {
    configured_root: Option<String>,
    inner: RwLock<Box<dyn Topology>>,
    metadata: RwLock<HashMap<String, AgentMetadata>>,
}

impl AdaptiveTopology {
    /// A fresh adaptive topology with no agents, starting in Mesh mode.
    ///
    /// `configured_root` fixes the root/hub used once the swarm grows past
    /// the Mesh band; when absent, the first agent ever connected is used
    ///.
    #[must_use]
    pub fn new(configured_root: Option<String>) -> Self {
        Self {
            configured_root,
            inner: RwLock::new(Box::new(MeshTopology::new())),
            metadata: RwLock::new(HashMap::new()),
        }
    }

    /// The concrete topology type currently active underneath (for diagnostics).
    pub async fn inner_type(&self) -> &'static str {
        self.inner.read().await.topology_type()
    }

    async fn maybe_migrate(&self) -> Result<(), TopologyError> {
        let current_ids = self.inner.read().await.agent_ids().await;
        let desired = desired_kind(current_ids.len());
        if self.inner.read().await.topology_type() == desired {
            return Ok(());
        }
        let Some(root) = self
            .configured_root
            .clone()
            .or_else(|| current_ids.first().cloned())
        else {
            return Ok(());
        };

        let metadata_snapshot = self.metadata.read().await.clone();
        let new_inner = build_inner(desired, &root);
        for id in &current_ids {
            let mut meta = metadata_snapshot.get(id).cloned().unwrap_or_default();
            if desired == "hierarchical"
                && id != &root
                && (meta.layer.is_none() || meta.parent_id.is_none())
            {
                // Open Question 2: place flat under root by default.
                meta = meta.with_hierarchy(1, root.clone());
            }
            new_inner.connect(id, &meta).await?;
        }
        *self.inner.write().await = new_inner;
        Ok(())
    }
}

#[async_trait]
impl Topology for AdaptiveTopology {
    fn topology_type(&self) -> &'static str {
        "adaptive"
    }

    async fn connect(&self, agent_id: &str, metadata: &AgentMetadata) -> Result<(), TopologyError> {
        self.metadata
            .write()
            .await
            .insert(agent_id.to_string(), metadata.clone());
        self.inner.read().await.connect(agent_id, metadata).await?;
        self.maybe_migrate().await
    }

    async fn disconnect(&self, agent_id: &str) -> Result<(), TopologyError> {
        self.metadata.write().await.remove(agent_id);
        self.inner.read().await.disconnect(agent_id).await?;
        self.maybe_migrate().await
    }

    async fn route(&self, sender: &str, recipient: &str, message: Message) -> bool {
        self.inner.read().await.route(sender, recipient, message).await
    }

    async fn broadcast(
        &self,
        sender: &str,
        message: Message,
        exclude: &HashSet<String>,
    ) -> Vec<String> {
        self.inner.read().await.broadcast(sender, message, exclude).await
    }

    async fn neighbors(&self, agent_id: &str) -> HashSet<String> {
        self.inner.read().await.neighbors(agent_id).await
    }

    async fn snapshot(&self) -> TopologySnapshot {
        self.inner.read().await.snapshot().await
    }

    async fn agent_ids(&self) -> Vec<String> {
        self.inner.read().await.agent_ids().await
    }

    async fn inbox(&self, agent_id: &str) -> Vec<Message> {
        self.inner.read().await.inbox(agent_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn stays_mesh_under_five_agents() {
        let topo = AdaptiveTopology::new(None);
        for id in ["a1", "a2", "a3", "a4"] {
            topo.connect(id, &AgentMetadata::new("w")).await.unwrap();
        }
        assert_eq!(topo.inner_type().await, "mesh");
    }

    #[tokio::test]
    async fn migrates_to_star_at_five_agents() {
        let topo = AdaptiveTopology::new(None);
        for id in ["a1", "a2", "a3", "a4", "a5"] {
            topo.connect(id, &AgentMetadata::new("w")).await.unwrap();
        }
        assert_eq!(topo.inner_type().await, "star");
    }

    #[tokio::test]
    async fn migrates_to_hierarchical_past_ten_agents_and_keeps_everyone() {
        let topo = AdaptiveTopology::new(None);
        for i in 0..11 {
            topo.connect(&format!("a{i}"), &AgentMetadata::new("w")).await.unwrap();
        }
        assert_eq!(topo.inner_type().await, "hierarchical");
        assert_eq!(topo.agent_ids().await.len(), 11);
    }

    #[tokio::test]
    async fn migration_preserves_deliverability() {
        let topo = AdaptiveTopology::new(None);
        for i in 0..11 {
            topo.connect(&format!("a{i}"), &AgentMetadata::new("w")).await.unwrap();
        }
        let delivered = topo
            .route("a0", "a10", Message::direct("a0", "a10", serde_json::json!(1), Utc::now()))
            .await;
        assert!(delivered);
    }
}
