//! Versioned, convergent shared state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The CRDT merge strategy encoded in [`StateVersionMetadata::crdt_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrdtType {
    /// Numeric value; merges by summation.
    Counter,
    /// Set of values; merges by union.
    Set,
    /// Keyed map; merges by per-key LWW.
    Map,
    /// Opaque scalar; merges identically to plain LWW.
    Register,
}

/// Metadata carried alongside a [`StateVersion`]'s value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateVersionMetadata {
    /// Per-agent logical clock, used by the vector-clock resolution strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_clock: Option<HashMap<String, u64>>,
    /// CRDT merge discipline for this key, used by the crdt resolution strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crdt_type: Option<CrdtType>,
}

/// A single versioned observation of a shared key.
///
/// Invariant: for a given `(key, origin_agent_id)`, the `(version, timestamp)`
/// pair is monotonically non-decreasing — enforced by callers
/// ([`crate::state_synchronizer::StateSynchronizer`]), not by this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateVersion {
    /// The shared key this version observes.
    pub key: String,
    /// The observed value.
    pub value: Value,
    /// Monotonic integer version, scoped per key per synchronizer.
    pub version: u64,
    /// Time this version was produced.
    pub timestamp: DateTime<Utc>,
    /// Id of the agent that produced (or, after merge, synthesized) this version.
    pub origin_agent_id: String,
    /// Strategy-specific metadata.
    pub metadata: StateVersionMetadata,
}

impl StateVersion {
    /// Construct a version with no CRDT/vector-clock metadata (plain LWW candidate).
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        value: Value,
        version: u64,
        origin_agent_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            version,
            timestamp: now,
            origin_agent_id: origin_agent_id.into(),
            metadata: StateVersionMetadata::default(),
        }
    }
}

/// Id used as `origin_agent_id` on versions synthesized by a CRDT merge,
/// since no single agent originated them.
pub const MERGED_ORIGIN: &str = "__merged__";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_version_has_no_metadata() {
        let v = StateVersion::new("k", serde_json::json!(1), 1, "a1", Utc::now());
        assert!(v.metadata.vector_clock.is_none());
        assert!(v.metadata.crdt_type.is_none());
    }
}
