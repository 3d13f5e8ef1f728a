//! Wires [`PatternCollector`] into [`HookRegistry`] as the `post_task`/
//! `on_error` pattern-collection hooks named in the config surface
//! A hook failing here is swallowed, never propagated
//! to the surrounding task.

use crate::config::HooksConfig;
use crate::domain::{Hook, HookPhase, HookPriority, HookResult};
use crate::error::HookError;
use crate::pattern_collector::PatternCollector;
use crate::ports::HookHandler;
use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

/// `hook.handler` id routed to [`PatternCollector::collect_task_completion`]
/// or [`PatternCollector::collect_error_occurrence`] depending on which
/// phase invoked it.
pub const PATTERN_COLLECTION_HANDLER: &str = "pattern_collection";

/// [`HookHandler`] backing the pattern-collection hooks registered by
/// [`register_pattern_hooks`]. Dispatches on `hook.event_type` rather than
/// phase, since a `HookRegistry` is wired to exactly one handler.
pub struct PatternCollectionHandler {
    collector: std::sync::Arc<PatternCollector>,
}

impl PatternCollectionHandler {
    /// A handler writing through `collector`.
    #[must_use]
    pub fn new(collector: std::sync::Arc<PatternCollector>) -> Self {
        Self { collector }
    }
}

#[async_trait]
impl HookHandler for PatternCollectionHandler {
    async fn handle(&self, hook: &Hook, context: &Value) -> Result<Value, String> {
        if hook.handler != PATTERN_COLLECTION_HANDLER {
            return Ok(Value::Null);
        }

        let result = match hook.event_type.as_str() {
            "task_complete" => {
                let task_type = context.get("task_type").and_then(Value::as_str).unwrap_or("unknown");
                let agent = context.get("agent").and_then(Value::as_str).unwrap_or("unknown");
                let duration_ms = context.get("duration_ms").and_then(Value::as_u64).unwrap_or(0);
                let success = context.get("success").and_then(Value::as_bool).unwrap_or(true);
                self.collector
                    .collect_task_completion(task_type, agent, duration_ms, success, context.clone())
                    .await
                    .map_err(|err| err.to_string())
            }
            "task_failed" => {
                let error_type = context.get("error_type").and_then(Value::as_str).unwrap_or("unknown");
                let error_message = context.get("error_message").and_then(Value::as_str).unwrap_or("");
                let resolution = context.get("resolution").cloned();
                self.collector
                    .collect_error_occurrence(error_type, error_message, context.clone(), resolution)
                    .await
                    .map_err(|err| err.to_string())
            }
            other => {
                warn!(event_type = other, "pattern_collection hook fired for an unhandled event type");
                return Ok(Value::Null);
            }
        };

        result.map(|pattern_id| serde_json::json!({"pattern_id": pattern_id}))
    }
}

fn parse_priority(value: &str) -> HookPriority {
    match value {
        "high" => HookPriority::High,
        "low" => HookPriority::Low,
        _ => HookPriority::Normal,
    }
}

/// Register the `post_task`/`on_error` pattern-collection hooks named in
/// `config`, skipping either whose `enabled` toggle is off.
///
/// Returns the names registered, for callers that want to `unregister`
/// them later. A duplicate name (re-registration) is reported as a
/// [`HookError`] rather than silently ignored, matching every other
/// `register` call in this crate.
pub async fn register_pattern_hooks(
    registry: &crate::hook_registry::HookRegistry,
    config: &HooksConfig,
) -> Result<Vec<String>, HookError> {
    let mut registered = Vec::new();

    if config.post_task.pattern_collection.enabled {
        let name = "post_task::pattern_collection".to_string();
        registry
            .register(Hook {
                name: name.clone(),
                phase: HookPhase::Post,
                priority: parse_priority(&config.post_task.pattern_collection.priority),
                event_type: "task_complete".to_string(),
                handler: PATTERN_COLLECTION_HANDLER.to_string(),
            })
            .await?;
        registered.push(name);
    }

    if config.on_error.pattern_collection.enabled {
        let name = "on_error::pattern_collection".to_string();
        registry
            .register(Hook {
                name: name.clone(),
                phase: HookPhase::Error,
                priority: parse_priority(&config.on_error.pattern_collection.priority),
                event_type: "task_failed".to_string(),
                handler: PATTERN_COLLECTION_HANDLER.to_string(),
            })
            .await?;
        registered.push(name);
    }

    Ok(registered)
}

/// Hook failure never alters the phase's reported outcome: a
/// caller inspecting [`HookResult::success`] on a pattern-collection hook
/// decides nothing about the surrounding task from it.
#[must_use]
pub fn is_advisory_only(result: &HookResult) -> bool {
    result.hook_name.ends_with("::pattern_collection")
}
