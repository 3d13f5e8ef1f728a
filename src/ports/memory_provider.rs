//! The `MemoryProvider` interface [`crate::state_synchronizer::StateSynchronizer`]
//! persists resolved state through. Deliberately opaque to
//! this crate's core — the contract is `put`/`get`/`list_since`; any backing
//! store (SQLite, a KV store, a remote service) can satisfy it.

use crate::domain::StateVersion;
use crate::error::SyncError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Durable storage for resolved [`StateVersion`]s.
#[async_trait]
pub trait MemoryProvider: Send + Sync {
    /// Persist `version` under `key`, overwriting whatever was there.
    async fn put(&self, key: &str, version: StateVersion) -> Result<(), SyncError>;

    /// Fetch the currently persisted version for `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<StateVersion>, SyncError>;

    /// Every persisted version with `version > since_version`, ascending by version.
    ///
    /// Used by `delta_sync`; this is a query over the full keyspace, not a
    /// single key, so implementations typically keep an auxiliary log.
    async fn list_since(&self, since_version: u64) -> Result<Vec<StateVersion>, SyncError>;
}

/// A process-local [`MemoryProvider`] backed by an in-memory map.
///
/// This is the default provider used when no durable backend is configured;
/// it satisfies the full contract (including `list_since`) but loses all
/// state on process restart, consistent with the non-goal of
/// persistent cross-process replication.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    state: RwLock<BTreeMap<String, StateVersion>>,
}

impl InMemoryProvider {
    /// An empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryProvider for InMemoryProvider {
    async fn put(&self, key: &str, version: StateVersion) -> Result<(), SyncError> {
        self.state.write().await.insert(key.to_string(), version);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StateVersion>, SyncError> {
        Ok(self.state.read().await.get(key).cloned())
    }

    async fn list_since(&self, since_version: u64) -> Result<Vec<StateVersion>, SyncError> {
        let mut versions: Vec<StateVersion> = self
            .state
            .read()
            .await
            .values()
            .filter(|v| v.version > since_version)
            .cloned()
            .collect();
        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }
}
