//! Peer RPC contract boundary and the join/merge/persist sequence.

use std::sync::Arc;

use async_trait::async_trait;
use ovo_core::{Command, MetaCounter, MetaObject, Node, OvoError, TopologyNode};
use tracing::{info, warn};

use super::topology::ClusterTopology;
use crate::config::ServerConf;

/// The peer RPC contract. Transport (HTTP/JSON, or anything else) is out of
/// core scope; only this boundary and the retry/timeout behavior around it
/// are in scope.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Registers `self_node` with `peer` and returns the peer's topology.
    async fn register_node(&self, peer: &Node, self_node: &TopologyNode) -> Result<Vec<TopologyNode>, OvoError>;

    /// Applies a replicated command at `peer`.
    async fn apply(&self, peer: &Node, cmd: Command) -> Result<(), OvoError>;

    /// Synchronous read forward for a key the local node does not own --
    /// the front door issues this directly rather than via the
    /// replication queue.
    async fn forward_get(&self, peer: &Node, key: &str) -> Result<MetaObject, OvoError>;

    /// Synchronous increment forward for a counter hash the local node does
    /// not own. Unlike object mutations, `increment` must hand the caller
    /// back the post-increment value, so it cannot go through the
    /// fire-and-forget outbound queue the way `Put`/`Delete` do.
    async fn forward_increment(&self, peer: &Node, delta: MetaCounter) -> Result<MetaCounter, OvoError>;
}

/// An in-process test double that records every call instead of doing
/// network I/O. Used by the integration tests exercising the partitioner
/// and outbound queue without a real transport.
#[derive(Default)]
pub struct NullPeerClient {
    pub registrations: parking_lot::Mutex<Vec<String>>,
    pub applied: parking_lot::Mutex<Vec<Command>>,
    pub fail_peers: parking_lot::Mutex<std::collections::HashSet<String>>,
    /// Stands in for the peer's own counter namespace, so
    /// `forward_increment` can be exercised by tests without a real
    /// transport.
    counters: parking_lot::Mutex<std::collections::HashMap<String, MetaCounter>>,
}

impl NullPeerClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call to `peer` fail, to exercise retry/failure-counting.
    pub fn fail(&self, peer: &str) {
        self.fail_peers.lock().insert(peer.to_string());
    }
}

#[async_trait]
impl PeerClient for NullPeerClient {
    async fn register_node(&self, peer: &Node, _self_node: &TopologyNode) -> Result<Vec<TopologyNode>, OvoError> {
        if self.fail_peers.lock().contains(&peer.name) {
            return Err(OvoError::PeerFailure(peer.name.clone()));
        }
        self.registrations.lock().push(peer.name.clone());
        Ok(Vec::new())
    }

    async fn apply(&self, peer: &Node, cmd: Command) -> Result<(), OvoError> {
        if self.fail_peers.lock().contains(&peer.name) {
            return Err(OvoError::PeerFailure(peer.name.clone()));
        }
        self.applied.lock().push(cmd);
        Ok(())
    }

    async fn forward_get(&self, peer: &Node, _key: &str) -> Result<MetaObject, OvoError> {
        if self.fail_peers.lock().contains(&peer.name) {
            return Err(OvoError::PeerFailure(peer.name.clone()));
        }
        Err(OvoError::NotFound)
    }

    async fn forward_increment(&self, peer: &Node, delta: MetaCounter) -> Result<MetaCounter, OvoError> {
        if self.fail_peers.lock().contains(&peer.name) {
            return Err(OvoError::PeerFailure(peer.name.clone()));
        }
        let mut counters = self.counters.lock();
        let entry = counters.entry(delta.key.clone()).or_insert_with(|| MetaCounter { value: 0, ..delta.clone() });
        entry.value += delta.value;
        Ok(entry.clone())
    }
}

/// Drives the startup join sequence: contact every seed peer, merge
/// returned topologies, drop unreachable peers, then persist.
pub struct Registrar {
    topology: Arc<ClusterTopology>,
    client: Arc<dyn PeerClient>,
}

impl Registrar {
    #[must_use]
    pub fn new(topology: Arc<ClusterTopology>, client: Arc<dyn PeerClient>) -> Self {
        Self { topology, client }
    }

    /// Contacts every seed peer and merges the cluster's view. Persists the
    /// merged topology to `conf_path` once all peers have been probed.
    pub async fn join(&self, seeds: &[Node], conf: &mut ServerConf, conf_path: &str) {
        let current_name = self.topology.current_name();
        let Some(self_node) = self.topology.get_topology_node(&current_name) else {
            warn!("registrar: current node missing from topology, skipping join");
            return;
        };

        for peer in seeds {
            if peer.name == current_name {
                continue;
            }
            match self.client.register_node(peer, &self_node).await {
                Ok(remote_topology) => {
                    info!(peer = %peer.name, "registered with peer");
                    self.topology.merge(&remote_topology);
                }
                Err(err) => {
                    warn!(peer = %peer.name, error = %err, "peer unreachable during join, removing");
                    self.topology.remove_node(&peer.name);
                }
            }
        }

        conf.topology.nodes = self.topology.snapshot();
        if let Err(err) = conf.save(conf_path) {
            warn!(error = %err, "failed to persist merged topology");
        }
    }
}
