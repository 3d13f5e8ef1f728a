//! The `Topology` interface: connectivity and broadcast semantics shared by
//! Mesh, Hierarchical, Star, Ring, and Adaptive.

use crate::domain::{AgentMetadata, Message};
use crate::error::TopologyError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Aggregate shape returned by [`Topology::snapshot`], used by
/// `SwarmCoordinator::get_topology_info`'s health classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologySnapshot {
    /// Total number of connected agents.
    pub agent_count: usize,
    /// Total number of direct edges this topology maintains.
    pub connection_count: usize,
    /// Worst-case hop count between any two agents, if bounded.
    pub max_hops: Option<usize>,
}

/// Common capability surface every topology implements.
///
/// Implementations hold only agent ids (plus whatever connectivity structure
/// they need) — never full [`crate::domain::Agent`] records. The coordinator
/// exclusively owns the agent registry.
#[async_trait]
pub trait Topology: Send + Sync {
    /// Machine-readable name, e.g. `"mesh"`, `"hierarchical"`.
    fn topology_type(&self) -> &'static str;

    /// Admit `agent_id` into the topology's connectivity structure.
    ///
    /// Hierarchical topologies require `metadata.layer` and `metadata.parent_id`
    /// for every agent other than the configured root.
    async fn connect(&self, agent_id: &str, metadata: &AgentMetadata) -> Result<(), TopologyError>;

    /// Remove `agent_id` from the topology's connectivity structure.
    async fn disconnect(&self, agent_id: &str) -> Result<(), TopologyError>;

    /// Attempt to deliver `message` from `sender` to `recipient`.
    ///
    /// Returns `false` (never an error) when either endpoint is unknown or the
    /// topology has no path between them at this time.
    async fn route(&self, sender: &str, recipient: &str, message: Message) -> bool;

    /// Deliver `message` to every connected agent except `sender` and `exclude`.
    ///
    /// Returns the ids that received it. Never delivers to `sender`.
    async fn broadcast(
        &self,
        sender: &str,
        message: Message,
        exclude: &HashSet<String>,
    ) -> Vec<String>;

    /// Agents directly reachable from `agent_id` under the current topology.
    async fn neighbors(&self, agent_id: &str) -> HashSet<String>;

    /// Aggregate connectivity stats.
    async fn snapshot(&self) -> TopologySnapshot;

    /// Every agent id currently admitted to this topology.
    async fn agent_ids(&self) -> Vec<String>;

    /// Messages currently held in `agent_id`'s inbox (non-destructive read).
    async fn inbox(&self, agent_id: &str) -> Vec<Message>;
}

/// Per-agent message inbox shared by every topology implementation.
///
/// All five topologies deliver by appending to the recipient's inbox rather
/// than implementing a bespoke queue each — the only thing that differs
/// between topologies is *which* agents are reachable from which, not how a
/// delivered message is stored (the Hierarchical note: "routed by
/// storing it in the recipient's inbox field").
#[derive(Debug, Default)]
pub struct Inbox {
    messages: RwLock<HashMap<String, Vec<Message>>>,
}

impl Inbox {
    /// An empty inbox store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(HashMap::new()),
        }
    }

    /// Deliver `message` into `recipient`'s inbox, creating it if needed.
    pub async fn push(&self, recipient: &str, message: Message) {
        self.messages
            .write()
            .await
            .entry(recipient.to_string())
            .or_default()
            .push(message);
    }

    /// Snapshot of everything currently held for `agent_id`.
    pub async fn peek(&self, agent_id: &str) -> Vec<Message> {
        self.messages
            .read()
            .await
            .get(agent_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop any inbox tracked for `agent_id`, e.g. on disconnect.
    pub async fn clear(&self, agent_id: &str) {
        self.messages.write().await.remove(agent_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn push_then_peek_round_trips() {
        let inbox = Inbox::new();
        let msg = Message::direct("a1", "a2", serde_json::json!(1), Utc::now());
        inbox.push("a2", msg).await;
        let got = inbox.peek("a2").await;
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].sender_id, "a1");
    }

    #[tokio::test]
    async fn clear_removes_inbox() {
        let inbox = Inbox::new();
        inbox
            .push("a2", Message::direct("a1", "a2", serde_json::json!(1), Utc::now()))
            .await;
        inbox.clear("a2").await;
        assert!(inbox.peek("a2").await.is_empty());
    }
}
