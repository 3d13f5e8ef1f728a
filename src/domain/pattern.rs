//! Durable execution pattern records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What kind of event a [`Pattern`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// A task ran to completion (success or failure).
    TaskCompletion,
    /// An error was observed during execution.
    ErrorOccurrence,
    /// An agent was invoked for a task.
    AgentUsage,
    /// A human correction was applied to prior output.
    UserCorrection,
}

impl PatternType {
    /// The filename segment used in `<type>_<pattern_id>.json`.
    #[must_use]
    pub const fn file_prefix(self) -> &'static str {
        match self {
            Self::TaskCompletion => "task_completion",
            Self::ErrorOccurrence => "error_occurrence",
            Self::AgentUsage => "agent_usage",
            Self::UserCorrection => "user_correction",
        }
    }
}

/// A single durable execution event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    /// Atomically generated id, format `pat-YYYYMMDD-HHMMSS-NNN`.
    pub pattern_id: String,
    /// What kind of event this is.
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    /// When the event was collected.
    pub timestamp: DateTime<Utc>,
    /// Type-specific payload.
    pub data: Value,
    /// Free-form context (task id, goal id, caller-supplied tags, ...).
    pub context: Value,
}
