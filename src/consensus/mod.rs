//! Pluggable consensus: [`ConsensusManager`] plus the three interchangeable
//! strategies it can delegate to.

pub mod byzantine;
pub mod gossip;
pub mod manager;
pub mod raft;

pub use byzantine::ByzantineStrategy;
pub use gossip::GossipStrategy;
pub use manager::ConsensusManager;
pub use raft::RaftStrategy;
