//! Convergent synchronization of a shared key across live agents.
//!
//! Broadcasts a request, collects responses up to a deadline, resolves any
//! disagreement via [`ConflictResolver`], and persists the winner.

use crate::conflict_resolver::{ConflictResolver, ResolutionStrategy};
use crate::domain::{Message, MessageKind, StateVersion};
use crate::error::SyncError;
use crate::ports::{MemoryProvider, Topology};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

fn namespaced_key(swarm_id: &str, key: &str) -> String {
    format!("{swarm_id}::{key}")
}

/// Orchestrates `synchronize_state`/`delta_sync`/`get_state` over a
/// [`Topology`] (for broadcast/inbox) and a [`MemoryProvider`] (for
/// persistence), resolving disagreement through a [`ConflictResolver`].
///
/// Holds the active topology behind a lock so `set_topology` can follow
/// [`crate::swarm_coordinator::SwarmCoordinator::switch_topology`] without
/// the synchronizer itself knowing about topology switches.
pub struct StateSynchronizer {
    synchronizer_agent_id: String,
    topology: RwLock<Arc<dyn Topology>>,
    memory: Arc<dyn MemoryProvider>,
    resolver: ConflictResolver,
    poll_interval: Duration,
    request_counter: AtomicU64,
    in_flight: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl StateSynchronizer {
    /// A synchronizer identified by `synchronizer_agent_id` (the sender id
    /// used on its own broadcasts, and the inbox it polls for responses).
    #[must_use]
    pub fn new(
        synchronizer_agent_id: impl Into<String>,
        topology: Arc<dyn Topology>,
        memory: Arc<dyn MemoryProvider>,
    ) -> Self {
        Self {
            synchronizer_agent_id: synchronizer_agent_id.into(),
            topology: RwLock::new(topology),
            memory,
            resolver: ConflictResolver::new(),
            poll_interval: Duration::from_millis(10),
            request_counter: AtomicU64::new(0),
            in_flight: RwLock::new(HashMap::new()),
        }
    }

    /// Swap the topology this synchronizer broadcasts through, e.g. after
    /// the coordinator migrates to a new one.
    pub async fn set_topology(&self, topology: Arc<dyn Topology>) {
        *self.topology.write().await = topology;
    }

    /// The id this synchronizer connects into a topology under, and sends
    /// its own broadcasts as. Topologies must `connect` it like any other
    /// agent for `synchronize_state` to receive responses.
    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.synchronizer_agent_id
    }

    /// Single-writer fast path: stamp `value` as the next
    /// version for `key`, broadcast an informational update, and persist.
    ///
    /// Unlike [`Self::synchronize_state`], this never gathers responses or
    /// resolves conflicts — it always succeeds once the value is persisted,
    /// even if some topology recipients are unreachable.
    #[instrument(skip(self, value), fields(swarm_id, key))]
    pub async fn local_update(
        &self,
        swarm_id: &str,
        key: &str,
        value: Value,
    ) -> Result<StateVersion, SyncError> {
        let namespaced = namespaced_key(swarm_id, key);
        let prior = self.memory.get(&namespaced).await?;
        let version = prior.map_or(1, |p| p.version + 1);
        let state_version = StateVersion::new(key, value, version, &self.synchronizer_agent_id, Utc::now());

        let topology = self.topology.read().await.clone();
        let update = Message::with_kind(
            &self.synchronizer_agent_id,
            None,
            json!({"key": key, "value": state_version.value, "version": version}),
            Utc::now(),
            MessageKind::StateUpdate,
        );
        topology
            .broadcast(&self.synchronizer_agent_id, update, &HashSet::new())
            .await;

        self.memory.put(&namespaced, state_version.clone()).await?;
        Ok(state_version)
    }

    async fn lock_for(&self, namespaced: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.in_flight.read().await.get(namespaced) {
            return lock.clone();
        }
        self.in_flight
            .write()
            .await
            .entry(namespaced.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Reconcile `key` across every agent currently live in the topology.
    ///
    /// Serializes with any other in-flight `synchronize_state` for the same
    /// `(swarm_id, key)` pair; unrelated keys and swarms proceed concurrently.
    #[instrument(skip(self), fields(swarm_id, key))]
    pub async fn synchronize_state(
        &self,
        swarm_id: &str,
        key: &str,
        timeout: Duration,
    ) -> Result<(), SyncError> {
        let namespaced = namespaced_key(swarm_id, key);
        let lock = self.lock_for(&namespaced).await;
        let _guard = lock.lock().await;

        let topology = self.topology.read().await.clone();
        let live_agents: Vec<String> = topology
            .agent_ids()
            .await
            .into_iter()
            .filter(|id| id != &self.synchronizer_agent_id)
            .collect();
        let n_live = live_agents.len();
        let required = ((n_live + 1) / 2).max(1);

        let request_id = format!(
            "{key}-{}",
            self.request_counter.fetch_add(1, Ordering::Relaxed)
        );
        let request = Message::with_kind(
            &self.synchronizer_agent_id,
            None,
            json!({"key": key, "request_id": request_id}),
            Utc::now(),
            MessageKind::StateRequest,
        );
        topology
            .broadcast(&self.synchronizer_agent_id, request, &HashSet::new())
            .await;

        let responses = self
            .collect_responses(&topology, &request_id, n_live, timeout)
            .await;

        if responses.len() < required {
            if responses.is_empty() {
                warn!(swarm_id, key, "synchronize_state timed out with no responses");
                return Err(SyncError::Timeout(
                    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                ));
            }
            return Err(SyncError::InsufficientResponses(responses.len(), required));
        }

        let resolved = self.resolve(key, &responses)?;
        let max_version = responses.values().map(|v| v.version).max().unwrap_or(0);

        let mut final_version = resolved;
        final_version.key = key.to_string();
        final_version.version = max_version + 1;
        final_version.origin_agent_id = self.synchronizer_agent_id.clone();
        final_version.timestamp = Utc::now();

        let update = Message::with_kind(
            &self.synchronizer_agent_id,
            None,
            json!({"key": key, "value": final_version.value, "version": final_version.version}),
            Utc::now(),
            MessageKind::StateUpdate,
        );
        topology
            .broadcast(&self.synchronizer_agent_id, update, &HashSet::new())
            .await;

        self.memory.put(&namespaced, final_version).await?;
        info!(swarm_id, key, responses = responses.len(), "state synchronized");
        Ok(())
    }

    async fn collect_responses(
        &self,
        topology: &Arc<dyn Topology>,
        request_id: &str,
        n_live: usize,
        timeout: Duration,
    ) -> HashMap<String, StateVersion> {
        let deadline = Instant::now() + timeout;
        let mut responses: HashMap<String, StateVersion> = HashMap::new();

        loop {
            let inbox = topology.inbox(&self.synchronizer_agent_id).await;
            for msg in &inbox {
                if msg.kind != MessageKind::StateResponse {
                    continue;
                }
                let Some(rid) = msg.payload.get("request_id").and_then(Value::as_str) else {
                    continue;
                };
                if rid != request_id {
                    continue;
                }
                if let Some(version_json) = msg.payload.get("version") {
                    if let Ok(version) = serde_json::from_value::<StateVersion>(version_json.clone()) {
                        responses.entry(msg.sender_id.clone()).or_insert(version);
                    }
                }
            }

            if responses.len() >= n_live || Instant::now() >= deadline {
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }

        responses
    }

    fn resolve(
        &self,
        key: &str,
        responses: &HashMap<String, StateVersion>,
    ) -> Result<StateVersion, SyncError> {
        let conflicting = self.resolver.detect_conflicts(responses);
        if conflicting.is_empty() {
            return Ok(responses
                .values()
                .next()
                .cloned()
                .expect("responses is non-empty, checked by caller"));
        }
        let conflicts: Vec<StateVersion> = responses.values().cloned().collect();
        Ok(self
            .resolver
            .resolve(key, &conflicts, ResolutionStrategy::Lww, Utc::now())?)
    }

    /// Every persisted version of `swarm_id`'s keyspace with `version > since_version`.
    pub async fn delta_sync(
        &self,
        swarm_id: &str,
        since_version: u64,
    ) -> Result<Vec<StateVersion>, SyncError> {
        let prefix = format!("{swarm_id}::");
        let mut versions: Vec<StateVersion> = self
            .memory
            .list_since(since_version)
            .await?
            .into_iter()
            .filter(|v| v.key.starts_with(&prefix))
            .collect();
        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }

    /// The currently persisted version for `key` within `swarm_id`, if any.
    pub async fn get_state(
        &self,
        swarm_id: &str,
        key: &str,
    ) -> Result<Option<StateVersion>, SyncError> {
        self.memory.get(&namespaced_key(swarm_id, key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgentMetadata;
    use crate::ports::InMemoryProvider;
    use crate::topologies::MeshTopology;

    async fn synced_mesh(agents: &[&str]) -> Arc<MeshTopology> {
        let topo = Arc::new(MeshTopology::new());
        for id in agents {
            topo.connect(id, &AgentMetadata::new("worker")).await.unwrap();
        }
        topo
    }

    #[tokio::test]
    async fn no_live_agents_times_out() {
        let topo = synced_mesh(&[]).await;
        let memory = Arc::new(InMemoryProvider::new());
        let sync = StateSynchronizer::new("__sync__", topo, memory);
        let err = sync
            .synchronize_state("swarm1", "k", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Timeout(_)));
    }

    #[tokio::test]
    async fn agreeing_responses_persist_without_conflict() {
        let topo = synced_mesh(&["a1", "a2", "__sync__"]).await;
        let memory = Arc::new(InMemoryProvider::new());
        let sync = Arc::new(StateSynchronizer::new(
            "__sync__",
            topo.clone() as Arc<dyn Topology>,
            memory.clone(),
        ));

        let responder = {
            let topo = topo.clone();
            tokio::spawn(async move {
                // Wait for the broadcast request, then answer for both agents.
                loop {
                    let inbox = topo.inbox("a1").await;
                    if let Some(req) = inbox.iter().find(|m| m.kind == MessageKind::StateRequest) {
                        let request_id = req.payload["request_id"].as_str().unwrap().to_string();
                        let version = StateVersion::new("k", json!(42), 1, "a1", Utc::now());
                        for agent in ["a1", "a2"] {
                            let resp = Message::with_kind(
                                agent,
                                Some("__sync__".to_string()),
                                json!({"request_id": request_id, "version": version}),
                                Utc::now(),
                                MessageKind::StateResponse,
                            );
                            topo.route(agent, "__sync__", resp).await;
                        }
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
        };

        sync.synchronize_state("swarm1", "k", Duration::from_millis(500))
            .await
            .unwrap();
        responder.await.unwrap();

        let stored = sync.get_state("swarm1", "k").await.unwrap().unwrap();
        assert_eq!(stored.value, json!(42));
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn delta_sync_filters_by_swarm_and_version() {
        let topo = synced_mesh(&[]).await;
        let memory = Arc::new(InMemoryProvider::new());
        let sync = StateSynchronizer::new("__sync__", topo, memory.clone());

        memory
            .put("swarm1::a", StateVersion::new("a", json!(1), 1, "a1", Utc::now()))
            .await
            .unwrap();
        memory
            .put("swarm1::b", StateVersion::new("b", json!(2), 2, "a1", Utc::now()))
            .await
            .unwrap();
        memory
            .put("swarm2::c", StateVersion::new("c", json!(3), 3, "a1", Utc::now()))
            .await
            .unwrap();

        let delta = sync.delta_sync("swarm1", 1).await.unwrap();
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].key, "b");
    }

    #[tokio::test]
    async fn local_update_bumps_version_on_each_call() {
        let topo = synced_mesh(&[]).await;
        let memory = Arc::new(InMemoryProvider::new());
        let sync = StateSynchronizer::new("__sync__", topo, memory);

        let first = sync.local_update("swarm1", "k", json!(1)).await.unwrap();
        assert_eq!(first.version, 1);
        let second = sync.local_update("swarm1", "k", json!(2)).await.unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(second.value, json!(2));
    }
}
