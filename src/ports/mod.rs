//! Pluggable interfaces: the capability sets topologies, consensus
//! strategies, and memory providers implement.

pub mod consensus_strategy;
pub mod hook_handler;
pub mod memory_provider;
pub mod topology;

pub use consensus_strategy::{intended_vote, ConsensusStrategy, DEFAULT_VOTE};
pub use hook_handler::{HookHandler, NoopHookHandler};
pub use memory_provider::{InMemoryProvider, MemoryProvider};
pub use topology::{Inbox, Topology, TopologySnapshot};
