//! Phase/priority-ordered hook execution with graceful degradation.

use crate::domain::{Hook, HookPhase, HookResult};
use crate::error::HookError;
use crate::ports::HookHandler;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Registry of [`Hook`]s, grouped by `(phase, event_type)` and dispatched
/// through a single constructor-injected [`HookHandler`].
pub struct HookRegistry {
    hooks: RwLock<HashMap<(HookPhase, String), Vec<Hook>>>,
    names: RwLock<HashSet<String>>,
    handler: Arc<dyn HookHandler>,
    phase_timeout: Duration,
}

impl HookRegistry {
    /// A registry dispatching through `handler`, budgeting `phase_timeout_ms`
    /// for the total time spent running one phase's matching hooks.
    #[must_use]
    pub fn new(handler: Arc<dyn HookHandler>, phase_timeout_ms: u64) -> Self {
        Self {
            hooks: RwLock::new(HashMap::new()),
            names: RwLock::new(HashSet::new()),
            handler,
            phase_timeout: Duration::from_millis(phase_timeout_ms),
        }
    }

    /// Add `hook` to its `(phase, event_type)` bucket, sorted by priority
    /// (highest first) with registration order breaking ties.
    #[instrument(skip(self, hook), fields(name = %hook.name))]
    pub async fn register(&self, hook: Hook) -> Result<(), HookError> {
        let mut names = self.names.write().await;
        if !names.insert(hook.name.clone()) {
            return Err(HookError::DuplicateName(hook.name));
        }
        let key = (hook.phase, hook.event_type.clone());
        let mut hooks = self.hooks.write().await;
        let bucket = hooks.entry(key).or_default();
        bucket.push(hook);
        bucket.sort_by(|a, b| b.priority.cmp(&a.priority));
        info!(total = bucket.len(), "hook registered");
        Ok(())
    }

    /// Remove the hook named `name` from whichever bucket holds it.
    pub async fn unregister(&self, name: &str) -> Result<(), HookError> {
        if !self.names.write().await.remove(name) {
            return Err(HookError::NotFound(name.to_string()));
        }
        let mut hooks = self.hooks.write().await;
        for bucket in hooks.values_mut() {
            bucket.retain(|h| h.name != name);
        }
        hooks.retain(|_, bucket| !bucket.is_empty());
        Ok(())
    }

    /// Run every hook matching `(phase, event_type)`, in priority order,
    /// within a shared `phase_timeout` budget for the whole call.
    ///
    /// A hook that errors is recorded `success=false` and execution
    /// continues; a hook that can't start before the budget is exhausted is
    /// recorded `timed_out=true` without ever being invoked.
    #[instrument(skip(self, context), fields(phase = ?phase, event_type))]
    pub async fn invoke(&self, phase: HookPhase, event_type: &str, context: Value) -> Vec<HookResult> {
        let hooks = {
            let guard = self.hooks.read().await;
            guard
                .get(&(phase, event_type.to_string()))
                .cloned()
                .unwrap_or_default()
        };

        if hooks.is_empty() {
            debug!("no hooks registered for this phase/event_type");
            return Vec::new();
        }

        let deadline = Instant::now() + self.phase_timeout;
        let mut results = Vec::with_capacity(hooks.len());

        for hook in &hooks {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(hook_name = %hook.name, "hook abandoned, phase budget exhausted");
                results.push(HookResult::timed_out(&hook.name));
                continue;
            }

            match tokio::time::timeout(remaining, self.handler.handle(hook, &context)).await {
                Ok(Ok(metadata)) => {
                    let mut result = HookResult::ok(&hook.name);
                    result.metadata = metadata;
                    results.push(result);
                }
                Ok(Err(error)) => {
                    warn!(hook_name = %hook.name, %error, "hook reported failure");
                    results.push(HookResult::failed(&hook.name, error));
                }
                Err(_) => {
                    warn!(hook_name = %hook.name, "hook abandoned, exceeded phase budget mid-run");
                    results.push(HookResult::timed_out(&hook.name));
                }
            }
        }

        results
    }
}
