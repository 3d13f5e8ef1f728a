//! Per-agent liveness tracking with a background health checker.

use crate::domain::{HealthState, HeartbeatRecord};
use crate::error::HeartbeatError;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Default ring-buffer depth per agent.
pub const DEFAULT_HISTORY_SIZE: usize = 100;

/// Default check cadence for the background checker.
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 1000;

/// Per-agent monitoring parameters, defaulted at [`HeartbeatMonitor::new`]
/// and overridable per agent at [`HeartbeatMonitor::start_monitoring`].
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    /// Expected gap between heartbeats.
    pub interval_ms: u64,
    /// Multiplier on `interval_ms` marking the FAILED boundary.
    pub failure_threshold: f64,
    /// Ring buffer capacity for heartbeat history.
    pub history_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            failure_threshold: 3.0,
            history_size: DEFAULT_HISTORY_SIZE,
        }
    }
}

struct AgentEntry {
    config: MonitorConfig,
    history: VecDeque<HeartbeatRecord>,
    last_heartbeat: DateTime<Utc>,
    last_emitted_state: HealthState,
}

impl AgentEntry {
    fn new(config: MonitorConfig, now: DateTime<Utc>) -> Self {
        Self {
            config,
            history: VecDeque::with_capacity(config.history_size),
            last_heartbeat: now,
            last_emitted_state: HealthState::Healthy,
        }
    }

    fn push(&mut self, record: HeartbeatRecord) {
        if self.history.len() == self.config.history_size {
            self.history.pop_front();
        }
        self.last_heartbeat = record.timestamp;
        self.history.push_back(record);
    }

    fn health_at(&self, now: DateTime<Utc>) -> HealthState {
        let elapsed = (now - self.last_heartbeat).num_milliseconds();
        HealthState::from_elapsed(elapsed, self.config.interval_ms, self.config.failure_threshold)
    }
}

/// Callback invoked on a health-state transition: `(agent_id, from, to)`.
pub type TransitionCallback = Arc<dyn Fn(&str, HealthState, HealthState) + Send + Sync>;

/// Registered transition callbacks, keyed by the states they fire on.
#[derive(Default, Clone)]
pub struct AlertConfig {
    /// Fired when an agent transitions into DEGRADED.
    pub on_degraded: Vec<TransitionCallback>,
    /// Fired when an agent transitions into CRITICAL.
    pub on_critical: Vec<TransitionCallback>,
    /// Fired when an agent transitions into FAILED.
    pub on_failed: Vec<TransitionCallback>,
    /// Fired when an agent recovers to HEALTHY from any other state.
    pub on_recovered: Vec<TransitionCallback>,
}

impl std::fmt::Debug for AlertConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertConfig")
            .field("on_degraded", &self.on_degraded.len())
            .field("on_critical", &self.on_critical.len())
            .field("on_failed", &self.on_failed.len())
            .field("on_recovered", &self.on_recovered.len())
            .finish()
    }
}

struct Shared {
    default_config: MonitorConfig,
    agents: RwLock<HashMap<String, AgentEntry>>,
    alerts: RwLock<AlertConfig>,
}

/// Tracks heartbeats for a population of agents and classifies liveness,
/// running one background checker task per [`HeartbeatMonitor`] instance.
pub struct HeartbeatMonitor {
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
    checker: RwLock<Option<JoinHandle<()>>>,
}

impl HeartbeatMonitor {
    /// A monitor with the given defaults; the background checker is started
    /// immediately at `check_interval_ms`.
    #[must_use]
    pub fn new(default_config: MonitorConfig, check_interval_ms: u64) -> Self {
        let shared = Arc::new(Shared {
            default_config,
            agents: RwLock::new(HashMap::new()),
            alerts: RwLock::new(AlertConfig::default()),
        });
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let checker = spawn_checker(shared.clone(), check_interval_ms, shutdown_rx);
        Self {
            shared,
            shutdown_tx,
            checker: RwLock::new(Some(checker)),
        }
    }

    /// Begin tracking `agent_id`, optionally overriding the default interval
    /// and failure threshold.
    #[instrument(skip(self))]
    pub async fn start_monitoring(
        &self,
        agent_id: &str,
        interval_ms: Option<u64>,
        failure_threshold: Option<f64>,
    ) -> Result<(), HeartbeatError> {
        let mut agents = self.shared.agents.write().await;
        if agents.contains_key(agent_id) {
            return Err(HeartbeatError::AlreadyMonitored(agent_id.to_string()));
        }
        let mut config = self.shared.default_config;
        if let Some(i) = interval_ms {
            config.interval_ms = i;
        }
        if let Some(f) = failure_threshold {
            config.failure_threshold = f;
        }
        agents.insert(agent_id.to_string(), AgentEntry::new(config, Utc::now()));
        info!(agent_id, interval_ms = config.interval_ms, "started monitoring agent");
        Ok(())
    }

    /// Stop tracking `agent_id`, discarding its history.
    pub async fn stop_monitoring(&self, agent_id: &str) -> Result<(), HeartbeatError> {
        self.shared
            .agents
            .write()
            .await
            .remove(agent_id)
            .map(|_| ())
            .ok_or_else(|| HeartbeatError::NotMonitored(agent_id.to_string()))
    }

    /// Record a liveness signal, resetting `agent_id` to HEALTHY.
    ///
    /// If the agent's previously emitted state was not HEALTHY, fires the
    /// `on_recovered` callbacks once.
    #[instrument(skip(self, metadata))]
    pub async fn record_heartbeat(
        &self,
        agent_id: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), HeartbeatError> {
        let now = Utc::now();
        let previous_state;
        {
            let mut agents = self.shared.agents.write().await;
            let entry = agents
                .get_mut(agent_id)
                .ok_or_else(|| HeartbeatError::NotMonitored(agent_id.to_string()))?;
            previous_state = entry.last_emitted_state;
            entry.push(HeartbeatRecord {
                agent_id: agent_id.to_string(),
                timestamp: now,
                metadata,
            });
            entry.last_emitted_state = HealthState::Healthy;
        }

        if previous_state != HealthState::Healthy {
            let alerts = self.shared.alerts.read().await;
            for cb in &alerts.on_recovered {
                cb(agent_id, previous_state, HealthState::Healthy);
            }
        }
        Ok(())
    }

    /// The agent's current health classification, derived from elapsed time
    /// since its last heartbeat — not the last state a callback fired for.
    pub async fn check_agent_health(&self, agent_id: &str) -> Result<HealthState, HeartbeatError> {
        let agents = self.shared.agents.read().await;
        let entry = agents
            .get(agent_id)
            .ok_or_else(|| HeartbeatError::NotMonitored(agent_id.to_string()))?;
        Ok(entry.health_at(Utc::now()))
    }

    /// Every monitored agent whose current health is at least as severe as `min_state`.
    pub async fn get_unhealthy_agents(&self, min_state: HealthState) -> Vec<String> {
        let now = Utc::now();
        let agents = self.shared.agents.read().await;
        agents
            .iter()
            .filter(|(_, entry)| entry.health_at(now).severity() >= min_state.severity())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Heartbeat history for `agent_id`, optionally restricted to `[since, until]`.
    pub async fn get_heartbeat_history(
        &self,
        agent_id: &str,
        time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<HeartbeatRecord>, HeartbeatError> {
        let agents = self.shared.agents.read().await;
        let entry = agents
            .get(agent_id)
            .ok_or_else(|| HeartbeatError::NotMonitored(agent_id.to_string()))?;
        let records = entry.history.iter().filter(|r| match time_range {
            Some((since, until)) => r.timestamp >= since && r.timestamp <= until,
            None => true,
        });
        Ok(records.cloned().collect())
    }

    /// Replace the registered transition callbacks.
    pub async fn configure_alerts(&self, alerts: AlertConfig) {
        *self.shared.alerts.write().await = alerts;
    }

    /// Stop the background checker task gracefully; subsequent calls are a no-op.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.checker.write().await.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

fn spawn_checker(
    shared: Arc<Shared>,
    check_interval_ms: u64,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(check_interval_ms.max(1)));
        interval.tick().await; // skip the immediate first tick

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    check_all_transitions(&shared).await;
                }
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }
    })
}

async fn check_all_transitions(shared: &Arc<Shared>) {
    let now = Utc::now();
    let mut transitions: Vec<(String, HealthState, HealthState)> = Vec::new();

    {
        let mut agents = shared.agents.write().await;
        for (agent_id, entry) in agents.iter_mut() {
            let current = entry.health_at(now);
            if current != entry.last_emitted_state {
                transitions.push((agent_id.clone(), entry.last_emitted_state, current));
                entry.last_emitted_state = current;
            }
        }
    }

    if transitions.is_empty() {
        return;
    }
    let alerts = shared.alerts.read().await;
    for (agent_id, from, to) in transitions {
        warn!(agent_id, ?from, ?to, "heartbeat health transition");
        let callbacks = match to {
            HealthState::Degraded => &alerts.on_degraded,
            HealthState::Critical => &alerts.on_critical,
            HealthState::Failed => &alerts.on_failed,
            HealthState::Healthy => &alerts.on_recovered,
        };
        for cb in callbacks {
            cb(&agent_id, from, to);
        }
    }
}
