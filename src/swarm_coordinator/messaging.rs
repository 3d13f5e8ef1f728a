//! Message routing: `send_message`, `broadcast_message`, and the bounded
//! diagnostic `message_history`.

use super::SwarmCoordinator;
use crate::domain::Message;
use crate::error::CoordinatorError;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::collections::HashSet;
use tracing::instrument;

impl SwarmCoordinator {
    async fn push_history(&self, message: Message) {
        let mut history = self.message_history.write().await;
        if history.len() >= self.history_capacity {
            history.pop_front();
        }
        history.push_back(message);
    }

    async fn touch_heartbeat(&self, id: &str) {
        if let Some(agent) = self.agents.write().await.get_mut(id) {
            agent.last_heartbeat = Utc::now();
        }
        let _ = self.heartbeat.record_heartbeat(id, HashMap::new()).await;
    }

    /// Deliver a direct message from `from` to `to` through the active topology.
    ///
    /// Updates `from`'s heartbeat and appends to `message_history`
    /// regardless of delivery outcome once both endpoints are known.
    #[instrument(skip(self, payload), fields(swarm_id = %self.swarm_id))]
    pub async fn send_message(&self, from: &str, to: &str, payload: Value) -> Result<(), CoordinatorError> {
        {
            let agents = self.agents.read().await;
            if !agents.contains_key(from) {
                return Err(CoordinatorError::UnknownAgent(from.to_string()));
            }
            if !agents.contains_key(to) {
                return Err(CoordinatorError::UnknownAgent(to.to_string()));
            }
        }

        self.touch_heartbeat(from).await;
        let message = Message::direct(from, to, payload, Utc::now());
        self.push_history(message.clone()).await;

        let topology = self.topology.read().await.clone();
        if !topology.route(from, to, message).await {
            return Err(CoordinatorError::DeliveryFailed {
                sender: from.to_string(),
                recipient: to.to_string(),
            });
        }
        Ok(())
    }

    /// Fan a message out to every connected agent except `from` and `exclude`.
    ///
    /// Returns the number delivered. Ids in `exclude` that aren't currently
    /// connected are silently ignored, never an error.
    #[instrument(skip(self, payload, exclude), fields(swarm_id = %self.swarm_id))]
    pub async fn broadcast_message(
        &self,
        from: &str,
        payload: Value,
        exclude: HashSet<String>,
    ) -> Result<usize, CoordinatorError> {
        if !self.agents.read().await.contains_key(from) {
            return Err(CoordinatorError::UnknownAgent(from.to_string()));
        }

        self.touch_heartbeat(from).await;
        let message = Message::broadcast(from, payload, Utc::now());
        self.push_history(message.clone()).await;

        let topology = self.topology.read().await.clone();
        let delivered = topology.broadcast(from, message, &exclude).await;
        Ok(delivered.len())
    }

    /// A snapshot of the bounded message history, oldest first.
    pub async fn message_history(&self) -> Vec<Message> {
        self.message_history.read().await.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgentMetadata;
    use crate::swarm_coordinator::SwarmCoordinator;
    use serde_json::json;

    #[tokio::test]
    async fn direct_message_delivers_and_records_history() {
        let coordinator = SwarmCoordinator::with_defaults("swarm1").await;
        coordinator.register_agent("a1", AgentMetadata::new("w")).await.unwrap();
        coordinator.register_agent("a2", AgentMetadata::new("w")).await.unwrap();

        coordinator.send_message("a1", "a2", json!({"hi": 1})).await.unwrap();
        let history = coordinator.message_history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sender_id, "a1");
    }

    #[tokio::test]
    async fn unknown_sender_errors_before_touching_history() {
        let coordinator = SwarmCoordinator::with_defaults("swarm1").await;
        coordinator.register_agent("a2", AgentMetadata::new("w")).await.unwrap();
        let err = coordinator.send_message("ghost", "a2", json!(1)).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::UnknownAgent(id) if id == "ghost"));
        assert!(coordinator.message_history().await.is_empty());
    }

    #[tokio::test]
    async fn broadcast_ignores_unknown_excluded_ids() {
        let coordinator = SwarmCoordinator::with_defaults("swarm1").await;
        coordinator.register_agent("a1", AgentMetadata::new("w")).await.unwrap();
        coordinator.register_agent("a2", AgentMetadata::new("w")).await.unwrap();

        let mut exclude = HashSet::new();
        exclude.insert("ghost".to_string());
        let delivered = coordinator.broadcast_message("a1", json!(1), exclude).await.unwrap();
        assert_eq!(delivered, 1);
    }
}
