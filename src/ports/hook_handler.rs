//! The `HookHandler` interface [`crate::hook_registry::HookRegistry`]
//! dispatches to by a hook's opaque `handler` id.

use crate::domain::Hook;
use async_trait::async_trait;
use serde_json::Value;

/// Executes the side effect a registered [`Hook`] names.
///
/// A single handler is constructor-injected into the registry (mirroring
/// how callers wire up their own action dispatch); it is responsible for
/// interpreting `hook.handler` however the embedding application needs to.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Run `hook` with `context`, returning arbitrary result metadata or an
    /// error string captured verbatim into the resulting `HookResult`.
    async fn handle(&self, hook: &Hook, context: &Value) -> Result<Value, String>;
}

/// A handler that always succeeds with no metadata; used where no real
/// side effect is wired up (tests, or hooks that exist purely for ordering).
#[derive(Debug, Default)]
pub struct NoopHookHandler;

#[async_trait]
impl HookHandler for NoopHookHandler {
    async fn handle(&self, _hook: &Hook, _context: &Value) -> Result<Value, String> {
        Ok(Value::Null)
    }
}
