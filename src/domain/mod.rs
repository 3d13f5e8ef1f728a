//! Domain models for the swarm coordination runtime.
//!
//! Pure data types with small inherent methods; no infrastructure concerns
//! (no locking, no I/O, no tracing).

pub mod agent;
pub mod heartbeat;
pub mod hook;
pub mod message;
pub mod pattern;
pub mod proposal;
pub mod state_version;

pub use agent::{Agent, AgentMetadata, AgentState};
pub use heartbeat::{HealthState, HeartbeatRecord};
pub use hook::{Hook, HookPhase, HookPriority, HookResult};
pub use message::{Message, MessageKind};
pub use pattern::{Pattern, PatternType};
pub use proposal::{ConsensusDecision, ConsensusResult, ParticipantVote, Proposal};
pub use state_version::{CrdtType, StateVersion, StateVersionMetadata, MERGED_ORIGIN};
