//! Black-box end-to-end scenarios A-F from spec §8, driven entirely
//! through the public `SwarmCoordinator`/`ConsensusManager`/
//! `HeartbeatMonitor`/`ConflictResolver` surface.

use chrono::Utc;
use moai_flow::conflict_resolver::{ConflictResolver, ResolutionStrategy};
use moai_flow::consensus::{ByzantineStrategy, ConsensusManager, GossipStrategy};
use moai_flow::domain::{
    AgentMetadata, AgentState, ConsensusDecision, CrdtType, Proposal, StateVersion, StateVersionMetadata,
};
use moai_flow::heartbeat_monitor::{HeartbeatMonitor, MonitorConfig};
use moai_flow::swarm_coordinator::TopologySwitchOptions;
use moai_flow::SwarmCoordinator;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Scenario A — Mesh broadcast counts.
#[tokio::test]
async fn scenario_a_mesh_broadcast_counts() {
    let coordinator = SwarmCoordinator::with_defaults("swarm-a").await;
    for id in ["a1", "a2", "a3", "a4"] {
        coordinator.register_agent(id, AgentMetadata::new("worker")).await.unwrap();
    }

    let mut exclude = std::collections::HashSet::new();
    exclude.insert("a3".to_string());
    let delivered = coordinator.broadcast_message("a1", json!({"hi": 1}), exclude).await.unwrap();
    assert_eq!(delivered, 2);
}

/// Scenario B — Topology migration preserves state.
#[tokio::test]
async fn scenario_b_topology_migration_preserves_state() {
    let coordinator = SwarmCoordinator::with_defaults("swarm-b").await;
    coordinator.switch_topology("adaptive", TopologySwitchOptions::default()).await.unwrap();

    coordinator.register_agent("a1", AgentMetadata::new("worker")).await.unwrap();
    for (i, id) in ["a2", "a3", "a4", "a5", "a6"].iter().enumerate() {
        let metadata = AgentMetadata::new("worker").with_hierarchy(1, "a1");
        let _ = i;
        coordinator.register_agent(id, metadata).await.unwrap();
    }
    assert_eq!(coordinator.get_topology_info().await.agent_count, 6);

    coordinator.set_agent_state("a3", AgentState::Busy).await.unwrap();

    coordinator
        .switch_topology(
            "hierarchical",
            TopologySwitchOptions { root_agent_id: Some("a1".to_string()), hub_agent_id: None },
        )
        .await
        .unwrap();

    let info = coordinator.get_topology_info().await;
    assert_eq!(info.topology_type, "hierarchical");
    assert_eq!(info.agent_count, 6);
    let status = coordinator.get_agent_status("a3").await.unwrap();
    assert_eq!(status.agent.state, AgentState::Busy);
}

/// Scenario C — CRDT counter merge.
#[test]
fn scenario_c_crdt_counter_merge() {
    let resolver = ConflictResolver::new();
    let now = Utc::now();
    let conflicts = vec![
        counter_version("requests", 100, 3, "a1", now),
        counter_version("requests", 50, 2, "a2", now),
        counter_version("requests", 25, 5, "a3", now),
    ];

    let resolved = resolver.resolve("requests", &conflicts, ResolutionStrategy::Crdt, now).unwrap();
    assert_eq!(resolved.value, json!(175));
    assert_eq!(resolved.version, 6);
}

fn counter_version(
    key: &str,
    value: i64,
    version: u64,
    origin: &str,
    now: chrono::DateTime<Utc>,
) -> StateVersion {
    StateVersion {
        key: key.to_string(),
        value: json!(value),
        version,
        timestamp: now,
        origin_agent_id: origin.to_string(),
        metadata: StateVersionMetadata { vector_clock: None, crdt_type: Some(CrdtType::Counter) },
    }
}

/// Scenario D — Gossip convergence with a strong initial majority.
#[tokio::test]
async fn scenario_d_gossip_convergence() {
    let strategy = GossipStrategy::default();
    let mut votes = HashMap::new();
    for i in 0..7 {
        votes.insert(format!("a{i}"), "for".to_string());
    }
    for i in 7..10 {
        votes.insert(format!("a{i}"), "against".to_string());
    }
    let participants: Vec<String> = votes.keys().cloned().collect();
    let proposal = Proposal::with_votes("p1", json!({}), Utc::now(), votes);

    let manager = ConsensusManager::new();
    manager.register(Arc::new(strategy)).await;
    let result = manager
        .propose(&proposal, &participants, Duration::from_secs(1), Some("gossip"))
        .await
        .unwrap();

    assert_eq!(result.decision, ConsensusDecision::Approved);
    assert_eq!(result.metadata["winning_option"], json!("for"));
    assert_eq!(result.metadata["converged"], json!(true));
    let rounds = result.metadata["rounds_executed"].as_u64().unwrap();
    assert!(rounds <= 3, "expected convergence within 3 rounds, got {rounds}");
}

/// Scenario E — Byzantine consensus tolerating crashes.
#[tokio::test]
async fn scenario_e_byzantine_tolerates_crashes() {
    // N = 3f+1 = 7, f = 2; two configured members never respond.
    let strategy = ByzantineStrategy::new(2);
    let mut votes = HashMap::new();
    for i in 0..5 {
        votes.insert(format!("a{i}"), "approve".to_string());
    }
    for i in 5..7 {
        votes.insert(format!("a{i}"), "no_response".to_string());
    }
    let participants: Vec<String> = (0..7).map(|i| format!("a{i}")).collect();
    let proposal = Proposal::with_votes("p1", json!({"op": "promote"}), Utc::now(), votes);

    let result = strategy.propose(&proposal, &participants, Duration::from_millis(500)).await.unwrap();
    assert_eq!(result.decision, ConsensusDecision::Approved);
    assert_eq!(result.votes_for, 5);
    assert!(result.metadata.get("primary").is_some());
}

/// Scenario F — Heartbeat transitions and recovery.
#[tokio::test]
async fn scenario_f_heartbeat_transitions() {
    let monitor = HeartbeatMonitor::new(
        MonitorConfig { interval_ms: 100, failure_threshold: 3.0, history_size: 10 },
        u64::MAX, // disable the background checker; we poll check_agent_health directly
    );
    monitor.start_monitoring("a1", None, None).await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(monitor.check_agent_health("a1").await.unwrap(), moai_flow::domain::HealthState::Degraded);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(monitor.check_agent_health("a1").await.unwrap(), moai_flow::domain::HealthState::Critical);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(monitor.check_agent_health("a1").await.unwrap(), moai_flow::domain::HealthState::Failed);

    monitor.record_heartbeat("a1", HashMap::new()).await.unwrap();
    assert_eq!(monitor.check_agent_health("a1").await.unwrap(), moai_flow::domain::HealthState::Healthy);
    monitor.shutdown().await;
}
