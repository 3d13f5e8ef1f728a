//! Concrete [`crate::ports::Topology`] implementations: Mesh,
//! Hierarchical, Star, Ring, and the threshold-driven Adaptive wrapper.

pub mod adaptive;
pub mod hierarchical;
pub mod mesh;
pub mod ring;
pub mod star;

pub use adaptive::AdaptiveTopology;
pub use hierarchical::HierarchicalTopology;
pub use mesh::MeshTopology;
pub use ring::RingTopology;
pub use star::StarTopology;
