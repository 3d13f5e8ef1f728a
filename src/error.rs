//! Error types for the swarm coordination runtime.
//!
//! Each component owns a dedicated `thiserror` enum rather than a single
//! crate-wide error type, so callers can match on the exact variant their
//! component contract promises (see the error taxonomy).

use thiserror::Error;

/// Errors raised by a [`crate::ports::Topology`] implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// Neither endpoint, or the lone endpoint, of an operation is connected.
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    /// An operation tried to connect or route an agent to itself.
    #[error("self connection is not permitted: {0}")]
    SelfConnection(String),

    /// Hierarchical topologies require `layer`/`parent_id` metadata for non-root agents.
    #[error("agent {0} is missing hierarchy metadata (layer/parent_id)")]
    MissingHierarchyMetadata(String),

    /// `switch_topology` was called with options the target topology rejects.
    #[error("invalid topology options: {0}")]
    InvalidOptions(String),
}

/// Errors raised by [`crate::swarm_coordinator::SwarmCoordinator`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// `register_agent` called with an id that is already registered.
    #[error("agent already exists: {0}")]
    AgentAlreadyExists(String),

    /// The referenced agent id has no registry entry.
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    /// Registration metadata failed validation (e.g. missing hierarchy fields).
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// `set_agent_state` attempted a transition the state machine forbids.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// Prior state.
        from: String,
        /// Requested state.
        to: String,
    },

    /// The active topology rejected a routing or connection request.
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// `switch_topology` named an unrecognized type or omitted a required
    /// root/hub id.
    #[error("invalid topology options: {0}")]
    InvalidOptions(String),

    /// `send_message` named two known agents but the topology still refused
    /// delivery (e.g. the pair has no path under the active topology).
    #[error("topology failed to deliver from {sender} to {recipient}")]
    DeliveryFailed {
        /// Sending agent id.
        sender: String,
        /// Intended recipient agent id.
        recipient: String,
    },

    /// The heartbeat monitor rejected a liveness operation.
    #[error(transparent)]
    Heartbeat(#[from] HeartbeatError),

    /// The consensus manager rejected or could not decide a proposal.
    #[error(transparent)]
    Consensus(#[from] ConsensusError),

    /// The synchronizer's local fast-path update failed to persist.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Errors raised by [`crate::consensus::ConsensusManager`] and its strategies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// Fewer live participants than the algorithm's quorum rule requires.
    #[error("no quorum: {0} participants, {1} required")]
    NoQuorum(usize, usize),

    /// The strategy did not decide within its deadline.
    #[error("consensus timed out after {0}ms")]
    Timeout(u64),

    /// `request_consensus` named a strategy not in the registry.
    #[error("unknown consensus strategy: {0}")]
    UnknownStrategy(String),

    /// The proposal was structurally invalid for the selected strategy.
    #[error("invalid proposal: {0}")]
    InvalidProposal(String),
}

/// Errors raised by [`crate::conflict_resolver::ConflictResolver::resolve`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictError {
    /// The conflict set was empty, internally inconsistent, or named an unknown CRDT type.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Errors raised by [`crate::state_synchronizer::StateSynchronizer`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// No resolution was reached before the deadline.
    #[error("synchronization timed out after {0}ms")]
    Timeout(u64),

    /// Fewer than half of the live agents responded before the deadline.
    #[error("insufficient responses: {0} of {1} required")]
    InsufficientResponses(usize, usize),

    /// The memory provider failed to persist or read a version.
    #[error("memory provider failure: {0}")]
    MemoryProviderFailure(String),

    /// Conflict resolution rejected the collected responses.
    #[error(transparent)]
    Conflict(#[from] ConflictError),
}

/// Errors raised by [`crate::heartbeat_monitor::HeartbeatMonitor`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatError {
    /// `start_monitoring` called for an agent already under monitoring.
    #[error("agent already monitored: {0}")]
    AlreadyMonitored(String),

    /// An operation referenced an agent with no monitoring entry.
    #[error("agent not monitored: {0}")]
    NotMonitored(String),
}

/// Errors raised by [`crate::hook_registry::HookRegistry`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    /// `register` called with a name already present in the registry.
    #[error("duplicate hook name: {0}")]
    DuplicateName(String),

    /// `unregister` referenced a name with no registered hook.
    #[error("hook not found: {0}")]
    NotFound(String),
}

/// Errors raised by [`crate::pattern_collector::PatternCollector`].
#[derive(Error, Debug)]
pub enum PatternError {
    /// Writing or reading a pattern file failed.
    #[error("pattern I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A pattern record could not be serialized.
    #[error("pattern serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while loading and validating [`crate::config::Config`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration value was present but out of its valid range.
    #[error("invalid value for {field}: {value}")]
    InvalidValue {
        /// Dotted config key.
        field: String,
        /// Offending value, rendered for display.
        value: String,
    },

    /// A required configuration field was absent.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// The configuration file could not be read.
    #[error("I/O error reading config: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_error_display() {
        let err = TopologyError::UnknownAgent("a1".to_string());
        assert_eq!(err.to_string(), "unknown agent: a1");
    }

    #[test]
    fn coordinator_error_wraps_topology_error() {
        let err: CoordinatorError = TopologyError::SelfConnection("a1".to_string()).into();
        assert!(matches!(err, CoordinatorError::Topology(_)));
        assert_eq!(
            err.to_string(),
            "self connection is not permitted: a1"
        );
    }

    #[test]
    fn consensus_error_no_quorum_display() {
        let err = ConsensusError::NoQuorum(1, 4);
        assert_eq!(err.to_string(), "no quorum: 1 participants, 4 required");
    }

    #[test]
    fn sync_error_wraps_conflict_error() {
        let err: SyncError = ConflictError::InvalidInput("empty set".to_string()).into();
        assert!(matches!(err, SyncError::Conflict(_)));
    }

    #[test]
    fn hook_error_equality() {
        let a = HookError::DuplicateName("pre-hook".to_string());
        let b = HookError::DuplicateName("pre-hook".to_string());
        assert_eq!(a, b);
    }
}
