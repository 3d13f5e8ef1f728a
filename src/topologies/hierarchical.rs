//! Rooted-tree topology. `metadata.layer`/`metadata.parent_id` are required
//! for every agent other than the fixed root; broadcasts cascade down the
//! tree from the sender (the whole tree when the sender is the root) —
//! broadcasts cascade down the tree.

use crate::domain::{AgentMetadata, Message};
use crate::error::TopologyError;
use crate::ports::{Inbox, Topology, TopologySnapshot};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::RwLock;

/// A rooted-tree topology with a fixed root chosen at construction.
pub struct HierarchicalTopology {
    root_agent_id: String,
    agents: RwLock<HashSet<String>>,
    parent_of: RwLock<HashMap<String, String>>,
    children_of: RwLock<HashMap<String, Vec<String>>>,
    inbox: Inbox,
}

impl HierarchicalTopology {
    /// A topology with no agents yet, rooted at `root_agent_id`.
    #[must_use]
    pub fn new(root_agent_id: impl Into<String>) -> Self {
        Self {
            root_agent_id: root_agent_id.into(),
            agents: RwLock::new(HashSet::new()),
            parent_of: RwLock::new(HashMap::new()),
            children_of: RwLock::new(HashMap::new()),
            inbox: Inbox::new(),
        }
    }

    /// The id fixed as root at construction.
    #[must_use]
    pub fn root_agent_id(&self) -> &str {
        &self.root_agent_id
    }

    async fn descendants_of(&self, start: &str) -> Vec<String> {
        let children_of = self.children_of.read().await;
        let mut queue: VecDeque<String> = children_of.get(start).cloned().unwrap_or_default().into();
        let mut out = Vec::new();
        while let Some(id) = queue.pop_front() {
            out.push(id.clone());
            if let Some(kids) = children_of.get(&id) {
                queue.extend(kids.iter().cloned());
            }
        }
        out
    }
}

#[async_trait]
impl Topology for HierarchicalTopology {
    fn topology_type(&self) -> &'static str {
        "hierarchical"
    }

    async fn connect(&self, agent_id: &str, metadata: &AgentMetadata) -> Result<(), TopologyError> {
        if agent_id == self.root_agent_id {
            self.agents.write().await.insert(agent_id.to_string());
            self.children_of
                .write()
                .await
                .entry(agent_id.to_string())
                .or_default();
            return Ok(());
        }

        let Some(parent_id) = metadata.parent_id.clone() else {
            return Err(TopologyError::MissingHierarchyMetadata(agent_id.to_string()));
        };
        if metadata.layer.is_none() {
            return Err(TopologyError::MissingHierarchyMetadata(agent_id.to_string()));
        }

        self.agents.write().await.insert(agent_id.to_string());
        self.parent_of
            .write()
            .await
            .insert(agent_id.to_string(), parent_id.clone());
        let mut children_of = self.children_of.write().await;
        children_of.entry(parent_id).or_default().push(agent_id.to_string());
        children_of.entry(agent_id.to_string()).or_default();
        Ok(())
    }

    async fn disconnect(&self, agent_id: &str) -> Result<(), TopologyError> {
        self.agents.write().await.remove(agent_id);
        let parent = self.parent_of.write().await.remove(agent_id);
        let mut children_of = self.children_of.write().await;
        children_of.remove(agent_id);
        if let Some(parent_id) = parent {
            if let Some(siblings) = children_of.get_mut(&parent_id) {
                siblings.retain(|id| id != agent_id);
            }
        }
        drop(children_of);
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
        // No path-finding at this layer: delivery is a direct inbox write.
        self.inbox.push(recipient, message).await;
        true
    }

    async fn broadcast(
        &self,
        sender: &str,
        message: Message,
        exclude: &HashSet<String>,
    ) -> Vec<String> {
        if !self.agents.read().await.contains(sender) {
            return Vec::new();
        }
        let mut delivered = Vec::new();
        for agent_id in self.descendants_of(sender).await {
            if exclude.contains(&agent_id) {
                continue;
            }
            self.inbox.push(&agent_id, message.clone()).await;
            delivered.push(agent_id);
        }
        delivered
    }

    async fn neighbors(&self, agent_id: &str) -> HashSet<String> {
        if !self.agents.read().await.contains(agent_id) {
            return HashSet::new();
        }
        let mut out = HashSet::new();
        if let Some(parent_id) = self.parent_of.read().await.get(agent_id) {
            out.insert(parent_id.clone());
        }
        if let Some(children) = self.children_of.read().await.get(agent_id) {
            out.extend(children.iter().cloned());
        }
        out
    }

    async fn snapshot(&self) -> TopologySnapshot {
        let agent_count = self.agents.read().await.len();
        TopologySnapshot {
            agent_count,
            connection_count: agent_count.saturating_sub(1),
            max_hops: None,
        }
    }

    async fn agent_ids(&self) -> Vec<String> {
        self.agents.read().await.iter().cloned().collect()
    }

    async fn inbox(&self, agent_id: &str) -> Vec<Message> {
        self.inbox.peek(agent_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn non_root_without_hierarchy_metadata_fails() {
        let topo = HierarchicalTopology::new("root");
        let err = topo.connect("child", &AgentMetadata::new("worker")).await;
        assert!(matches!(err, Err(TopologyError::MissingHierarchyMetadata(_))));
    }

    #[tokio::test]
    async fn root_broadcast_reaches_whole_tree() {
        let topo = HierarchicalTopology::new("root");
        topo.connect("root", &AgentMetadata::new("coordinator")).await.unwrap();
        topo.connect("a", &AgentMetadata::new("w").with_hierarchy(1, "root")).await.unwrap();
        topo.connect("b", &AgentMetadata::new("w").with_hierarchy(1, "root")).await.unwrap();
        topo.connect("c", &AgentMetadata::new("w").with_hierarchy(2, "a")).await.unwrap();

        let delivered = topo
            .broadcast("root", Message::broadcast("root", serde_json::json!(1), Utc::now()), &HashSet::new())
            .await;
        assert_eq!(delivered.len(), 3);
        assert!(delivered.contains(&"c".to_string()));
    }

    #[tokio::test]
    async fn non_root_broadcast_only_reaches_own_subtree() {
        let topo = HierarchicalTopology::new("root");
        topo.connect("root", &AgentMetadata::new("coordinator")).await.unwrap();
        topo.connect("a", &AgentMetadata::new("w").with_hierarchy(1, "root")).await.unwrap();
        topo.connect("b", &AgentMetadata::new("w").with_hierarchy(1, "root")).await.unwrap();
        topo.connect("c", &AgentMetadata::new("w").with_hierarchy(2, "a")).await.unwrap();

        let delivered = topo
            .broadcast("a", Message::broadcast("a", serde_json::json!(1), Utc::now()), &HashSet::new())
            .await;
        assert_eq!(delivered, vec!["c".to_string()]);
    }

    #[tokio::test]
    async fn disconnect_prunes_parent_child_links() {
        let topo = HierarchicalTopology::new("root");
        topo.connect("root", &AgentMetadata::new("coordinator")).await.unwrap();
        topo.connect("a", &AgentMetadata::new("w").with_hierarchy(1, "root")).await.unwrap();
        topo.disconnect("a").await.unwrap();
        assert!(topo.neighbors("root").await.is_empty());
    }
}
