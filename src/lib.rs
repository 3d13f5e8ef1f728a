//! moai_flow — multi-agent swarm coordination runtime.
//!
//! A [`SwarmCoordinator`](swarm_coordinator::SwarmCoordinator) registers
//! agents, routes messages, and dispatches to one of five network
//! [`topologies`]. Coordinated decisions run through a
//! [`ConsensusManager`](consensus::ConsensusManager) over three
//! interchangeable algorithms (Byzantine, Raft, Gossip); shared state
//! converges through a [`ConflictResolver`](conflict_resolver::ConflictResolver)
//! and [`StateSynchronizer`](state_synchronizer::StateSynchronizer). Agent
//! liveness is tracked by [`HeartbeatMonitor`](heartbeat_monitor::HeartbeatMonitor),
//! and every finished task can fire hooks through
//! [`HookRegistry`](hook_registry::HookRegistry), with pattern collection
//! persisted by [`PatternCollector`](pattern_collector::PatternCollector).

pub mod config;
pub mod conflict_resolver;
pub mod consensus;
pub mod domain;
pub mod error;
pub mod heartbeat_monitor;
pub mod hook_registry;
pub mod logging;
pub mod pattern_collector;
pub mod pattern_hooks;
pub mod ports;
pub mod state_synchronizer;
pub mod swarm_coordinator;
pub mod topologies;

pub use config::{Config, ConfigLoader};
pub use conflict_resolver::{ConflictResolver, ResolutionStrategy};
pub use consensus::ConsensusManager;
pub use heartbeat_monitor::HeartbeatMonitor;
pub use hook_registry::HookRegistry;
pub use pattern_collector::PatternCollector;
pub use state_synchronizer::StateSynchronizer;
pub use swarm_coordinator::SwarmCoordinator;
