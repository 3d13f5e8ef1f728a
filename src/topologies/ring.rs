//! Ring topology: every agent is connected to the next in a fixed
//! direction. Delivery between two agents may take up to N-1 hops;
//! broadcast traverses the full ring once.

use crate::domain::{AgentMetadata, Message};
use crate::error::TopologyError;
use crate::ports::{Inbox, Topology, TopologySnapshot};
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;

/// A ring topology. Agents are ordered by registration; each is connected
/// to the next (wrapping), forming a single fixed-direction cycle.
#[derive(Default)]
pub struct RingTopology {
    order: RwLock<Vec<String>>,
    inbox: Inbox,
}

impl RingTopology {
    /// An empty ring.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn next_of(&self, agent_id: &str) -> Option<String> {
        let order = self.order.read().await;
        let idx = order.iter().position(|id| id == agent_id)?;
        if order.len() < 2 {
            return None;
        }
        Some(order[(idx + 1) % order.len()].clone())
    }
}

#[async_trait]
impl Topology for RingTopology {
    fn topology_type(&self) -> &'static str {
        "ring"
    }

    async fn connect(&self, agent_id: &str, _metadata: &AgentMetadata) -> Result<(), TopologyError> {
        let mut order = self.order.write().await;
        if !order.iter().any(|id| id == agent_id) {
            order.push(agent_id.to_string());
        }
        Ok(())
    }

    async fn disconnect(&self, agent_id: &str) -> Result<(), TopologyError> {
        self.order.write().await.retain(|id| id != agent_id);
        self.inbox.clear(agent_id).await;
        Ok(())
    }

    async fn route(&self, sender: &str, recipient: &str, message: Message) -> bool {
        if sender == recipient {
            return false;
        }
        let order = self.order.read().await;
        if !order.iter().any(|id| id == sender) || !order.iter().any(|id| id == recipient) {
            return false;
        }
        drop(order);
        // Topologically this traverses up to N-1 hops around the ring; the
        // in-process inbox delivers it directly since no intermediate agent
        // inspects or forwards the payload.
        self.inbox.push(recipient, message).await;
        true
    }

    async fn broadcast(
        &self,
        sender: &str,
        message: Message,
        exclude: &HashSet<String>,
    ) -> Vec<String> {
        let order = self.order.read().await.clone();
        if !order.iter().any(|id| id == sender) {
            return Vec::new();
        }
        let mut delivered = Vec::new();
        for agent_id in &order {
            if agent_id == sender || exclude.contains(agent_id) {
                continue;
            }
            self.inbox.push(agent_id, message.clone()).await;
            delivered.push(agent_id.clone());
        }
        delivered
    }

    async fn neighbors(&self, agent_id: &str) -> HashSet<String> {
        let order = self.order.read().await;
        let Some(idx) = order.iter().position(|id| id == agent_id) else {
            return HashSet::new();
        };
        if order.len() < 2 {
            return HashSet::new();
        }
        let mut out = HashSet::new();
        out.insert(order[(idx + 1) % order.len()].clone());
        out.insert(order[(idx + order.len() - 1) % order.len()].clone());
        out
    }

    async fn snapshot(&self) -> TopologySnapshot {
        let n = self.order.read().await.len();
        TopologySnapshot {
            agent_count: n,
            connection_count: if n < 2 { 0 } else { n },
            max_hops: if n == 0 { None } else { Some(n - 1) },
        }
    }

    async fn agent_ids(&self) -> Vec<String> {
        self.order.read().await.clone()
    }

    async fn inbox(&self, agent_id: &str) -> Vec<Message> {
        self.inbox.peek(agent_id).await
    }
}
