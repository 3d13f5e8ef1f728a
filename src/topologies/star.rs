//! Hub-and-spoke topology: one hub, the rest are spokes reachable only
//! through it. Spoke-to-spoke delivery is relayed through the hub;
//! broadcast fans out from the hub to every spoke.

use crate::domain::{AgentMetadata, Message};
use crate::error::TopologyError;
use crate::ports::{Inbox, Topology, TopologySnapshot};
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;

/// A star topology with a fixed hub chosen at construction.
pub struct StarTopology {
    hub_agent_id: String,
    spokes: RwLock<HashSet<String>>,
    hub_connected: RwLock<bool>,
    inbox: Inbox,
}

impl StarTopology {
    /// A topology with no agents yet, hubbed at `hub_agent_id`.
    #[must_use]
    pub fn new(hub_agent_id: impl Into<String>) -> Self {
        Self {
            hub_agent_id: hub_agent_id.into(),
            spokes: RwLock::new(HashSet::new()),
            hub_connected: RwLock::new(false),
            inbox: Inbox::new(),
        }
    }

    /// The id fixed as hub at construction.
    #[must_use]
    pub fn hub_agent_id(&self) -> &str {
        &self.hub_agent_id
    }

    async fn is_connected(&self, agent_id: &str) -> bool {
        if agent_id == self.hub_agent_id {
            *self.hub_connected.read().await
        } else {
            self.spokes.read().await.contains(agent_id)
        }
    }
}

#[async_trait]
impl Topology for StarTopology {
    fn topology_type(&self) -> &'static str {
        "star"
    }

    async fn connect(&self, agent_id: &str, _metadata: &AgentMetadata) -> Result<(), TopologyError> {
        if agent_id == self.hub_agent_id {
            *self.hub_connected.write().await = true;
        } else {
            self.spokes.write().await.insert(agent_id.to_string());
        }
        Ok(())
    }

    async fn disconnect(&self, agent_id: &str) -> Result<(), TopologyError> {
        if agent_id == self.hub_agent_id {
            *self.hub_connected.write().await = false;
        } else {
            self.spokes.write().await.remove(agent_id);
        }
        self.inbox.clear(agent_id).await;
        Ok(())
    }

    async fn route(&self, sender: &str, recipient: &str, message: Message) -> bool {
        if sender == recipient {
            return false;
        }
        if !self.is_connected(sender).await || !self.is_connected(recipient).await {
            return false;
        }
        // Spoke-to-spoke delivery is logically relayed through the hub; the
        // hub itself holds no retained copy since it only forwards.
        self.inbox.push(recipient, message).await;
        true
    }

    async fn broadcast(
        &self,
        sender: &str,
        message: Message,
        exclude: &HashSet<String>,
    ) -> Vec<String> {
        if !self.is_connected(sender).await {
            return Vec::new();
        }
        let mut delivered = Vec::new();
        if *self.hub_connected.read().await && sender != self.hub_agent_id && !exclude.contains(&self.hub_agent_id) {
            self.inbox.push(&self.hub_agent_id, message.clone()).await;
            delivered.push(self.hub_agent_id.clone());
        }
        for spoke in self.spokes.read().await.iter() {
            if spoke == sender || exclude.contains(spoke) {
                continue;
            }
            self.inbox.push(spoke, message.clone()).await;
            delivered.push(spoke.clone());
        }
        delivered
    }

    async fn neighbors(&self, agent_id: &str) -> HashSet<String> {
        if !self.is_connected(agent_id).await {
            return HashSet::new();
        }
        if agent_id == self.hub_agent_id {
            self.spokes.read().await.clone()
        } else {
            let mut out = HashSet::new();
            out.insert(self.hub_agent_id.clone());
            out
        }
    }

    async fn snapshot(&self) -> TopologySnapshot {
        let spokes = self.spokes.read().await.len();
        let hub_connected = *self.hub_connected.read().await;
        let agent_count = spokes + usize::from(hub_connected);
        TopologySnapshot {
            agent_count,
            connection_count: spokes,
            max_hops: Some(2),
        }
    }

    async fn agent_ids(&self) -> Vec<String> {
        let mut out: Vec<String> = self.spokes.read().await.iter().cloned().collect();
        if *self.hub_connected.read().await {
            out.push(self.hub_agent_id.clone());
        }
        out
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
    async fn spoke_to_spoke_relays_through_hub() {
        let topo = StarTopology::new("hub");
        topo.connect("hub", &AgentMetadata::new("coordinator")).await.unwrap();
        topo.connect("s1", &AgentMetadata::new("w")).await.unwrap();
        topo.connect("s2", &AgentMetadata::new("w")).await.unwrap();

        let delivered = topo
            .route("s1", "s2", Message::direct("s1", "s2", serde_json::json!(1), Utc::now()))
            .await;
        assert!(delivered);
        assert_eq!(topo.inbox("s2").await.len(), 1);
    }

    #[tokio::test]
    async fn hub_broadcast_fans_out_to_every_spoke() {
        let topo = StarTopology::new("hub");
        topo.connect("hub", &AgentMetadata::new("coordinator")).await.unwrap();
        for id in ["s1", "s2", "s3"] {
            topo.connect(id, &AgentMetadata::new("w")).await.unwrap();
        }
        let delivered = topo
            .broadcast("hub", Message::broadcast("hub", serde_json::json!(1), Utc::now()), &HashSet::new())
            .await;
        assert_eq!(delivered.len(), 3);
    }
}
