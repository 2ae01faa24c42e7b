//! Cluster topology, membership, and the peer registration/merge sequence.

pub mod http_client;
pub mod registrar;
pub mod topology;

pub use http_client::HttpPeerClient;
pub use registrar::{NullPeerClient, PeerClient, Registrar};
pub use topology::ClusterTopology;
