//! Heartbeat records and derived health states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single liveness signal from an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    /// Id of the reporting agent.
    pub agent_id: String,
    /// Time the heartbeat was recorded.
    pub timestamp: DateTime<Utc>,
    /// Optional free-form attributes attached by the caller.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Derived (never stored) liveness classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// `elapsed < interval`.
    Healthy,
    /// `interval <= elapsed < 2 * interval`.
    Degraded,
    /// `2 * interval <= elapsed < failure_threshold * interval`.
    Critical,
    /// `elapsed >= failure_threshold * interval`.
    Failed,
}

impl HealthState {
    /// Derive the health state from elapsed milliseconds since the last heartbeat.
    ///
    /// `interval_ms = 0` is treated as `1` so the windows never divide by zero or
    /// collapse to an infinite `DEGRADED` band.
    #[must_use]
    pub fn from_elapsed(elapsed_ms: i64, interval_ms: u64, failure_threshold: f64) -> Self {
        let interval_ms = interval_ms.max(1) as f64;
        let elapsed_ms = elapsed_ms as f64;
        if elapsed_ms < interval_ms {
            Self::Healthy
        } else if elapsed_ms < 2.0 * interval_ms {
            Self::Degraded
        } else if elapsed_ms < failure_threshold * interval_ms {
            Self::Critical
        } else {
            Self::Failed
        }
    }

    /// Ordering used by `get_unhealthy_agents(min_state)`: `Healthy < Degraded < Critical < Failed`.
    #[must_use]
    pub const fn severity(self) -> u8 {
        match self {
            Self::Healthy => 0,
            Self::Degraded => 1,
            Self::Critical => 2,
            Self::Failed => 3,
        }
    }
}
