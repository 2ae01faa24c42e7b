//! `ovo` server: a concurrent in-memory key-value store with TTL expiry,
//! atomic counters, and peer-to-peer hash-range partitioning/replication.
//!
//! [`ServerState`] wires the individually-testable pieces -- the
//! concurrent collection, the background cleaner, cluster topology, the
//! inbound/outbound replication queues, and the partitioner -- into the
//! shared state the `axum` front door (see [`network`]) runs against.

pub mod cluster;
pub mod config;
pub mod network;
pub mod partition;
pub mod storage;
pub mod time;

use std::sync::Arc;
use std::time::Duration;

use ovo_core::{Node, TopologyNode};
use tokio::sync::watch;
use tracing::info;

use cluster::{ClusterTopology, HttpPeerClient, PeerClient, Registrar};
use config::ServerConf;
use network::{AppState, NetworkConfig, ShutdownController};
use partition::{InboundQueue, OutboundQueue, Partitioner};
use storage::{Cleaner, ConcurrentCollection, DashMapCollection};

/// Number of shards the inbound replication queue hashes keys across.
/// Chosen to bound per-shard contention without one task per key.
const INBOUND_SHARD_COUNT: usize = 16;

/// Everything a running `ovo` node owns: the local collection, the cluster
/// view, the replication queues, and the partitioner that ties them
/// together. Built once at startup by [`ServerState::bootstrap`] and then
/// shared (via `AppState`) with every request handler.
pub struct ServerState {
    pub collection: Arc<DashMapCollection>,
    pub topology: Arc<ClusterTopology>,
    pub outbound: Arc<OutboundQueue>,
    pub inbound: Arc<InboundQueue>,
    pub partitioner: Arc<Partitioner>,
    pub peer_client: Arc<dyn PeerClient>,
    pub cleaner: Cleaner,
    pub shutdown_tx: watch::Sender<bool>,
}

impl ServerState {
    /// Assembles a node's storage, topology, and replication machinery from
    /// a loaded [`ServerConf`], and runs the startup join sequence against
    /// any seed peers already present in the persisted topology.
    ///
    /// `conf` is the node's own view of the cluster at rest; `conf_path` is
    /// where the merged topology is persisted back after the join
    /// sequence. `cleaner_period` controls how often the background sweep
    /// checks for expired keys; the sweep is additionally nudged early
    /// whenever a shorter TTL is inserted.
    pub async fn bootstrap(mut conf: ServerConf, conf_path: &str, cleaner_period: Duration) -> Self {
        let current_name = conf.server_node.node.name.clone();
        let topology = ClusterTopology::new(conf.server_node.clone());
        for node in &conf.topology.nodes {
            if node.node.name != current_name {
                topology.add_node(node.clone());
            }
        }

        let collection = DashMapCollection::new();
        let cleaner = Cleaner::start(Arc::clone(&collection), cleaner_period);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let peer_client: Arc<dyn PeerClient> = Arc::new(HttpPeerClient::default());
        let outbound = OutboundQueue::new(Arc::clone(&peer_client), Arc::clone(&topology), shutdown_rx.clone());
        let inbound = InboundQueue::start(Arc::clone(&collection), INBOUND_SHARD_COUNT, shutdown_rx);
        let partitioner = Arc::new(Partitioner::new(current_name.clone(), Arc::clone(&topology), Arc::clone(&outbound)));

        let seeds: Vec<Node> = conf.topology.nodes.iter().map(|tn| tn.node.clone()).filter(|n| n.name != current_name).collect();
        if !seeds.is_empty() {
            let registrar = Registrar::new(Arc::clone(&topology), Arc::clone(&peer_client));
            registrar.join(&seeds, &mut conf, conf_path).await;
        }

        info!(node = %current_name, peers = seeds.len(), "server state bootstrapped");

        Self { collection, topology, outbound, inbound, partitioner, peer_client, cleaner, shutdown_tx }
    }

    /// Builds the shared request state handed to every `axum` handler.
    #[must_use]
    pub fn app_state(&self, network_config: NetworkConfig, shutdown: Arc<ShutdownController>) -> AppState {
        AppState {
            collection: Arc::clone(&self.collection) as _,
            topology: Arc::clone(&self.topology),
            outbound: Arc::clone(&self.outbound),
            inbound: Arc::clone(&self.inbound),
            partitioner: Arc::clone(&self.partitioner),
            peer_client: Arc::clone(&self.peer_client),
            shutdown,
            config: Arc::new(network_config),
            start_time: std::time::Instant::now(),
        }
    }

    /// Signals the cleaner and replication queues to stop, and waits for
    /// the cleaner's background task to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        self.cleaner.shutdown().await;
    }
}
