//! Convergent resolution of conflicting [`StateVersion`]s: Last-Write-Wins,
//! Vector-Clock dominance, and CRDT merge.

use crate::domain::{CrdtType, StateVersion, StateVersionMetadata, MERGED_ORIGIN};
use crate::error::ConflictError;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::instrument;

/// Which of the three convergence disciplines `resolve` should apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    /// Greatest timestamp wins; ties broken by version, then origin id.
    Lww,
    /// Causal dominance via per-agent vector clocks, falling back to LWW.
    Vector,
    /// Type-specific CRDT merge (counter/set/map/register).
    Crdt,
}

/// Stateless resolver: every method is a pure function over its arguments.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictResolver;

impl ConflictResolver {
    /// A resolver; carries no state of its own.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Resolve `conflicts` (all observations of `key`) to a single winning
    /// version, per `strategy`.
    ///
    /// Errors with `InvalidInput` when `conflicts` is empty, when a member
    /// disagrees on `key`, or when the `crdt` strategy hits an unknown or
    /// inconsistent `crdt_type`.
    #[instrument(skip(self, conflicts), fields(key, strategy = ?strategy, n = conflicts.len()))]
    pub fn resolve(
        &self,
        key: &str,
        conflicts: &[StateVersion],
        strategy: ResolutionStrategy,
        now: DateTime<Utc>,
    ) -> Result<StateVersion, ConflictError> {
        if conflicts.is_empty() {
            return Err(ConflictError::InvalidInput(format!(
                "no conflicting versions supplied for key {key}"
            )));
        }
        if conflicts.iter().any(|v| v.key != key) {
            return Err(ConflictError::InvalidInput(format!(
                "conflict set contains entries disagreeing on key {key}"
            )));
        }

        match strategy {
            ResolutionStrategy::Lww => Ok(lww_winner(conflicts).clone()),
            ResolutionStrategy::Vector => Ok(resolve_vector(conflicts)),
            ResolutionStrategy::Crdt => resolve_crdt(key, conflicts, now),
        }
    }

    /// Every key that appears with differing `value` or `version` across
    /// two or more of the given per-agent observations.
    #[must_use]
    pub fn detect_conflicts(&self, states: &HashMap<String, StateVersion>) -> Vec<String> {
        let mut by_key: HashMap<&str, Vec<&StateVersion>> = HashMap::new();
        for version in states.values() {
            by_key.entry(version.key.as_str()).or_default().push(version);
        }

        let mut conflicting: Vec<String> = by_key
            .into_iter()
            .filter_map(|(key, versions)| {
                let first = versions[0];
                let differs = versions
                    .iter()
                    .any(|v| v.value != first.value || v.version != first.version);
                (versions.len() >= 2 && differs).then(|| key.to_string())
            })
            .collect();
        conflicting.sort();
        conflicting
    }
}

/// Greatest timestamp wins; ties by greater version; further ties by
/// greater (lexicographically last) `origin_agent_id`.
fn lww_winner(conflicts: &[StateVersion]) -> &StateVersion {
    conflicts
        .iter()
        .max_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.version.cmp(&b.version))
                .then_with(|| a.origin_agent_id.cmp(&b.origin_agent_id))
        })
        .expect("conflicts is non-empty, checked by caller")
}

fn vector_clock_of(v: &StateVersion) -> HashMap<String, u64> {
    v.metadata.vector_clock.clone().unwrap_or_default()
}

/// `a` causally dominates `b`: at least as far ahead on every agent's
/// counter, and strictly ahead on at least one.
fn dominates(a: &StateVersion, b: &StateVersion) -> bool {
    let ca = vector_clock_of(a);
    let cb = vector_clock_of(b);
    let ids: HashSet<&String> = ca.keys().chain(cb.keys()).collect();
    let mut strictly_ahead = false;
    for id in ids {
        let av = ca.get(id).copied().unwrap_or(0);
        let bv = cb.get(id).copied().unwrap_or(0);
        if av < bv {
            return false;
        }
        if av > bv {
            strictly_ahead = true;
        }
    }
    strictly_ahead
}

fn resolve_vector(conflicts: &[StateVersion]) -> StateVersion {
    for candidate in conflicts {
        let dominates_all = conflicts
            .iter()
            .all(|other| std::ptr::eq(other, candidate) || dominates(candidate, other));
        if dominates_all {
            return candidate.clone();
        }
    }
    // No single element dominates every other: all concurrent, fall back to LWW.
    lww_winner(conflicts).clone()
}

fn resolve_crdt(
    key: &str,
    conflicts: &[StateVersion],
    now: DateTime<Utc>,
) -> Result<StateVersion, ConflictError> {
    let crdt_type = conflicts[0].metadata.crdt_type.ok_or_else(|| {
        ConflictError::InvalidInput(format!("key {key} has no crdt_type metadata"))
    })?;
    if conflicts
        .iter()
        .any(|v| v.metadata.crdt_type != Some(crdt_type))
    {
        return Err(ConflictError::InvalidInput(format!(
            "key {key} has conflicting crdt_type metadata across inputs"
        )));
    }

    match crdt_type {
        CrdtType::Counter => merge_counter(key, conflicts, now),
        CrdtType::Set => Ok(merge_set(key, conflicts, now)),
        CrdtType::Map => Ok(merge_map(key, conflicts, now)),
        CrdtType::Register => Ok(lww_winner(conflicts).clone()),
    }
}

fn next_version(conflicts: &[StateVersion]) -> u64 {
    conflicts.iter().map(|v| v.version).max().unwrap_or(0) + 1
}

fn merge_counter(
    key: &str,
    conflicts: &[StateVersion],
    now: DateTime<Utc>,
) -> Result<StateVersion, ConflictError> {
    let mut sum = 0.0_f64;
    for v in conflicts {
        sum += v.value.as_f64().ok_or_else(|| {
            ConflictError::InvalidInput(format!("counter value for key {key} is not numeric"))
        })?;
    }
    Ok(StateVersion {
        key: key.to_string(),
        value: json!(sum),
        version: next_version(conflicts),
        timestamp: now,
        origin_agent_id: MERGED_ORIGIN.to_string(),
        metadata: StateVersionMetadata {
            crdt_type: Some(CrdtType::Counter),
            ..Default::default()
        },
    })
}

fn merge_set(key: &str, conflicts: &[StateVersion], now: DateTime<Utc>) -> StateVersion {
    let mut merged: Vec<Value> = Vec::new();
    for v in conflicts {
        if let Some(arr) = v.value.as_array() {
            for item in arr {
                if !merged.contains(item) {
                    merged.push(item.clone());
                }
            }
        }
    }
    merged.sort_by_key(serde_json::Value::to_string);
    StateVersion {
        key: key.to_string(),
        value: Value::Array(merged),
        version: next_version(conflicts),
        timestamp: now,
        origin_agent_id: MERGED_ORIGIN.to_string(),
        metadata: StateVersionMetadata {
            crdt_type: Some(CrdtType::Set),
            ..Default::default()
        },
    }
}

fn merge_map(key: &str, conflicts: &[StateVersion], now: DateTime<Utc>) -> StateVersion {
    let mut by_timestamp: Vec<&StateVersion> = conflicts.iter().collect();
    by_timestamp.sort_by_key(|v| v.timestamp);

    let mut result = serde_json::Map::new();
    for v in by_timestamp {
        if let Some(obj) = v.value.as_object() {
            for (k, val) in obj {
                result.insert(k.clone(), val.clone());
            }
        }
    }
    StateVersion {
        key: key.to_string(),
        value: Value::Object(result),
        version: next_version(conflicts),
        timestamp: now,
        origin_agent_id: MERGED_ORIGIN.to_string(),
        metadata: StateVersionMetadata {
            crdt_type: Some(CrdtType::Map),
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn version(
        value: Value,
        version: u64,
        origin: &str,
        timestamp: DateTime<Utc>,
    ) -> StateVersion {
        StateVersion::new("k", value, version, origin, timestamp)
    }

    #[test]
    fn lww_picks_greatest_timestamp() {
        let resolver = ConflictResolver::new();
        let t0 = Utc::now();
        let older = version(json!(1), 1, "a1", t0);
        let newer = version(json!(2), 1, "a2", t0 + chrono::Duration::seconds(1));
        let result = resolver
            .resolve("k", &[older, newer.clone()], ResolutionStrategy::Lww, t0)
            .unwrap();
        assert_eq!(result.value, newer.value);
    }

    #[test]
    fn empty_conflict_set_is_invalid_input() {
        let resolver = ConflictResolver::new();
        let err = resolver
            .resolve("k", &[], ResolutionStrategy::Lww, Utc::now())
            .unwrap_err();
        assert!(matches!(err, ConflictError::InvalidInput(_)));
    }

    #[test]
    fn disagreeing_keys_are_invalid_input() {
        let resolver = ConflictResolver::new();
        let mut wrong_key = version(json!(1), 1, "a1", Utc::now());
        wrong_key.key = "other".to_string();
        let err = resolver
            .resolve("k", &[wrong_key], ResolutionStrategy::Lww, Utc::now())
            .unwrap_err();
        assert!(matches!(err, ConflictError::InvalidInput(_)));
    }

    #[test]
    fn vector_clock_dominance_wins_regardless_of_timestamp() {
        let resolver = ConflictResolver::new();
        let t0 = Utc::now();
        let mut a = version(json!("a"), 1, "a1", t0);
        a.metadata.vector_clock = Some(HashMap::from([("a1".to_string(), 2), ("a2".to_string(), 1)]));
        let mut b = version(json!("b"), 1, "a2", t0 + chrono::Duration::seconds(10));
        b.metadata.vector_clock = Some(HashMap::from([("a1".to_string(), 1), ("a2".to_string(), 1)]));

        let result = resolver
            .resolve("k", &[a.clone(), b], ResolutionStrategy::Vector, t0)
            .unwrap();
        assert_eq!(result.origin_agent_id, a.origin_agent_id);
    }

    #[test]
    fn vector_clock_all_concurrent_falls_back_to_lww() {
        let resolver = ConflictResolver::new();
        let t0 = Utc::now();
        let mut a = version(json!("a"), 1, "a1", t0);
        a.metadata.vector_clock = Some(HashMap::from([("a1".to_string(), 2), ("a2".to_string(), 0)]));
        let mut b = version(json!("b"), 1, "a2", t0 + chrono::Duration::seconds(10));
        b.metadata.vector_clock = Some(HashMap::from([("a1".to_string(), 0), ("a2".to_string(), 2)]));

        let result = resolver
            .resolve("k", &[a, b.clone()], ResolutionStrategy::Vector, t0)
            .unwrap();
        // Concurrent (neither dominates); LWW picks the later timestamp.
        assert_eq!(result.origin_agent_id, b.origin_agent_id);
    }

    #[test]
    fn crdt_counter_merge_sums_and_bumps_version() {
        let resolver = ConflictResolver::new();
        let t0 = Utc::now();
        let mk = |val: i64, ver: u64, origin: &str| {
            let mut v = version(json!(val), ver, origin, t0);
            v.metadata.crdt_type = Some(CrdtType::Counter);
            v
        };
        let conflicts = vec![mk(100, 3, "a1"), mk(50, 2, "a2"), mk(25, 5, "a3")];
        let result = resolver
            .resolve("k", &conflicts, ResolutionStrategy::Crdt, t0)
            .unwrap();
        assert_eq!(result.value, json!(175.0));
        assert_eq!(result.version, 6);
        assert_eq!(result.origin_agent_id, MERGED_ORIGIN);
    }

    #[test]
    fn crdt_unknown_type_is_invalid_input() {
        let resolver = ConflictResolver::new();
        let v = version(json!(1), 1, "a1", Utc::now());
        let err = resolver
            .resolve("k", &[v], ResolutionStrategy::Crdt, Utc::now())
            .unwrap_err();
        assert!(matches!(err, ConflictError::InvalidInput(_)));
    }

    #[test]
    fn crdt_set_merge_unions_values() {
        let resolver = ConflictResolver::new();
        let t0 = Utc::now();
        let mk = |items: Vec<i64>, origin: &str| {
            let mut v = version(json!(items), 1, origin, t0);
            v.metadata.crdt_type = Some(CrdtType::Set);
            v
        };
        let conflicts = vec![mk(vec![1, 2], "a1"), mk(vec![2, 3], "a2")];
        let result = resolver
            .resolve("k", &conflicts, ResolutionStrategy::Crdt, t0)
            .unwrap();
        let arr = result.value.as_array().unwrap();
        assert_eq!(arr.len(), 3);
    }

    #[test]
    fn detect_conflicts_finds_keys_with_differing_values() {
        let resolver = ConflictResolver::new();
        let t0 = Utc::now();
        let mut states = HashMap::new();
        states.insert("a1".to_string(), version(json!(1), 1, "a1", t0));
        states.insert("a2".to_string(), version(json!(2), 1, "a2", t0));
        let conflicting = resolver.detect_conflicts(&states);
        assert_eq!(conflicting, vec!["k".to_string()]);
    }

    #[test]
    fn detect_conflicts_ignores_agreeing_agents() {
        let resolver = ConflictResolver::new();
        let t0 = Utc::now();
        let mut states = HashMap::new();
        states.insert("a1".to_string(), version(json!(1), 1, "a1", t0));
        states.insert("a2".to_string(), version(json!(1), 1, "a2", t0));
        assert!(resolver.detect_conflicts(&states).is_empty());
    }

    proptest! {
        #[test]
        fn counter_merge_is_commutative_under_shuffle(
            mut values in prop::collection::vec(-1000i64..1000, 1..8)
        ) {
            let resolver = ConflictResolver::new();
            let t0 = Utc::now();
            let build = |vals: &[i64]| -> Vec<StateVersion> {
                vals.iter().enumerate().map(|(i, v)| {
                    let mut sv = version(json!(*v), 1, &format!("a{i}"), t0);
                    sv.metadata.crdt_type = Some(CrdtType::Counter);
                    sv
                }).collect()
            };
            let original = resolver.resolve("k", &build(&values), ResolutionStrategy::Crdt, t0).unwrap();

            values.reverse();
            let shuffled = resolver.resolve("k", &build(&values), ResolutionStrategy::Crdt, t0).unwrap();

            prop_assert_eq!(original.value, shuffled.value);
        }
    }
}
