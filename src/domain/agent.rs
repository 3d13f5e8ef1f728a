//! Agent registry record.
//!
//! An `Agent` is identified by a unique string id and carries free-form
//! metadata plus the mutable bits the coordinator tracks: current state
//! and last heartbeat time. The coordinator exclusively owns this record;
//! topologies and the heartbeat monitor hold only the id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle state of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Taking on work normally.
    Active,
    /// Registered but not currently assigned work.
    Idle,
    /// Executing a task.
    Busy,
    /// Heartbeat timeout elapsed past the failure threshold.
    Failed,
}

impl AgentState {
    /// Whether `to` is a reachable transition from `self` under the rules.
    ///
    /// `FAILED` is terminal except via heartbeat resurrection, which callers apply
    /// directly rather than through `set_agent_state` (see [`AgentState::can_transition_via_heartbeat`]).
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        use AgentState::{Active, Busy, Failed, Idle};
        match (self, to) {
            (Failed, Failed) => true,
            (Failed, _) => false,
            (_, Failed) => true,
            (Active, Active | Idle | Busy)
            | (Idle, Idle | Active | Busy)
            | (Busy, Busy | Active | Idle) => true,
        }
    }
}

/// Free-form metadata attached to a registered agent.
///
/// `agent_type` is the only field every agent carries; the rest are required
/// only by specific topologies (hierarchical needs `layer`/`parent_id`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetadata {
    /// Logical role, e.g. `"worker"`, `"coordinator"`.
    #[serde(default)]
    pub agent_type: String,
    /// Depth in a hierarchical topology; required for non-root agents there.
    #[serde(default)]
    pub layer: Option<u32>,
    /// Parent agent id in a hierarchical topology; required for non-root agents there.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Declared capabilities, free-form strings.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Any additional keyed attributes not otherwise modeled.
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

impl AgentMetadata {
    /// Build bare metadata carrying only an agent type.
    #[must_use]
    pub fn new(agent_type: impl Into<String>) -> Self {
        Self {
            agent_type: agent_type.into(),
            ..Default::default()
        }
    }

    /// Attach hierarchy placement, returning `self` for chaining.
    #[must_use]
    pub fn with_hierarchy(mut self, layer: u32, parent_id: impl Into<String>) -> Self {
        self.layer = Some(layer);
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// A registered agent and its current lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique id, caller-assigned at registration.
    pub id: String,
    /// Free-form metadata.
    pub metadata: AgentMetadata,
    /// Current lifecycle state.
    pub state: AgentState,
    /// Timestamp of the last recorded heartbeat.
    pub last_heartbeat: DateTime<Utc>,
}

impl Agent {
    /// Construct a freshly-registered agent: `ACTIVE`, heartbeat stamped `now`.
    #[must_use]
    pub fn new(id: impl Into<String>, metadata: AgentMetadata, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            metadata,
            state: AgentState::Active,
            last_heartbeat: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_idle_busy_interchange_freely() {
        use AgentState::{Active, Busy, Idle};
        assert!(Active.can_transition_to(Idle));
        assert!(Idle.can_transition_to(Busy));
        assert!(Busy.can_transition_to(Active));
    }

    #[test]
    fn any_state_can_fail() {
        use AgentState::{Active, Busy, Failed, Idle};
        assert!(Active.can_transition_to(Failed));
        assert!(Idle.can_transition_to(Failed));
        assert!(Busy.can_transition_to(Failed));
    }

    #[test]
    fn failed_is_terminal_to_non_failed() {
        use AgentState::{Active, Busy, Failed, Idle};
        assert!(!Failed.can_transition_to(Active));
        assert!(!Failed.can_transition_to(Idle));
        assert!(!Failed.can_transition_to(Busy));
    }

    #[test]
    fn metadata_builder_sets_hierarchy() {
        let meta = AgentMetadata::new("worker").with_hierarchy(1, "root");
        assert_eq!(meta.layer, Some(1));
        assert_eq!(meta.parent_id.as_deref(), Some("root"));
    }
}
