//! Hook registration types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle phase a [`Hook`] runs at, relative to the task it instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    /// Before the task runs.
    Pre,
    /// After the task completes (success or failure).
    Post,
    /// When the task raises an error.
    Error,
}

/// Execution priority within a phase; higher priority runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPriority {
    /// Runs last among hooks for the same (phase, event_type).
    Low,
    /// Default priority.
    Normal,
    /// Runs first among hooks for the same (phase, event_type).
    High,
}

/// A caller-registered function invoked at a labeled phase of task execution.
///
/// `handler` is an opaque callback id or identifier string rather than a function
/// pointer: the registry dispatches by name through [`crate::ports::HookHandler`],
/// keeping `Hook` itself `Clone` and serializable for inspection/logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hook {
    /// Unique name; registration is rejected on collision.
    pub name: String,
    /// Phase this hook runs at.
    pub phase: HookPhase,
    /// Priority within its phase.
    pub priority: HookPriority,
    /// Event type this hook matches, e.g. `"task_complete"`, `"task_failed"`.
    pub event_type: String,
    /// Identifier resolved to a handler by the registry's owner.
    pub handler: String,
}

/// Outcome of a single hook invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookResult {
    /// Name of the hook that produced this result.
    pub hook_name: String,
    /// Whether the hook ran to completion without error.
    pub success: bool,
    /// Error text, if `success` is `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the hook was abandoned for exceeding its share of the phase budget.
    #[serde(default)]
    pub timed_out: bool,
    /// Arbitrary data the hook chose to report.
    #[serde(default)]
    pub metadata: Value,
}

impl HookResult {
    /// A successful, on-time result with no metadata.
    #[must_use]
    pub fn ok(hook_name: impl Into<String>) -> Self {
        Self {
            hook_name: hook_name.into(),
            success: true,
            error: None,
            timed_out: false,
            metadata: Value::Null,
        }
    }

    /// A failed result carrying the captured error text.
    #[must_use]
    pub fn failed(hook_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            hook_name: hook_name.into(),
            success: false,
            error: Some(error.into()),
            timed_out: false,
            metadata: Value::Null,
        }
    }

    /// A result for a hook abandoned after exceeding its phase time budget.
    #[must_use]
    pub fn timed_out(hook_name: impl Into<String>) -> Self {
        Self {
            hook_name: hook_name.into(),
            success: false,
            error: Some("hook exceeded its phase time budget".to_string()),
            timed_out: true,
            metadata: Value::Null,
        }
    }
}
