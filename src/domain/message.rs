//! Inter-agent message envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminates the purpose of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Point-to-point delivery to one recipient.
    Direct,
    /// Fan-out to every reachable agent except the sender (and any excluded).
    Broadcast,
    /// Synchronizer asking agents for their local copy of a key.
    StateRequest,
    /// An agent's reply to a `StateRequest`.
    StateResponse,
    /// Informational notice that a key's resolved version changed.
    StateUpdate,
    /// A vote cast during a consensus round.
    ConsensusVote,
    /// A liveness signal.
    Heartbeat,
    /// Anything application-defined that doesn't fit the above.
    Custom,
}

/// A single message routed through a topology.
///
/// Messages are not persisted beyond [`crate::swarm_coordinator::SwarmCoordinator`]'s
/// bounded in-memory history; there is no wire format, no disk log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Id of the sending agent.
    pub sender_id: String,
    /// Id of the recipient, absent for broadcasts.
    pub recipient_id: Option<String>,
    /// Opaque application payload.
    pub payload: Value,
    /// Time the message was constructed.
    pub timestamp: DateTime<Utc>,
    /// What kind of message this is.
    pub kind: MessageKind,
}

impl Message {
    /// Build a direct message from `sender` to `recipient`.
    #[must_use]
    pub fn direct(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        payload: Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            sender_id: sender.into(),
            recipient_id: Some(recipient.into()),
            payload,
            timestamp: now,
            kind: MessageKind::Direct,
        }
    }

    /// Build a broadcast message with no fixed recipient.
    #[must_use]
    pub fn broadcast(sender: impl Into<String>, payload: Value, now: DateTime<Utc>) -> Self {
        Self {
            sender_id: sender.into(),
            recipient_id: None,
            payload,
            timestamp: now,
            kind: MessageKind::Broadcast,
        }
    }

    /// Build a message of an explicit `kind`, for the synchronizer/consensus internals.
    #[must_use]
    pub fn with_kind(
        sender: impl Into<String>,
        recipient: Option<String>,
        payload: Value,
        now: DateTime<Utc>,
        kind: MessageKind,
    ) -> Self {
        Self {
            sender_id: sender.into(),
            recipient_id: recipient,
            payload,
            timestamp: now,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_message_carries_recipient() {
        let now = Utc::now();
        let msg = Message::direct("a1", "a2", serde_json::json!({"hi": 1}), now);
        assert_eq!(msg.recipient_id.as_deref(), Some("a2"));
        assert_eq!(msg.kind, MessageKind::Direct);
    }

    #[test]
    fn broadcast_message_has_no_recipient() {
        let now = Utc::now();
        let msg = Message::broadcast("a1", serde_json::json!(null), now);
        assert!(msg.recipient_id.is_none());
        assert_eq!(msg.kind, MessageKind::Broadcast);
    }
}
