//! The ordered, retryable outbound replication pipeline.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use ovo_core::{Command, Node};
use tokio::sync::{mpsc, watch};
use tracing::warn;

use crate::cluster::{ClusterTopology, PeerClient};

/// Default retry budget per command.
pub const DEFAULT_RETRIES: u32 = 3;
/// Default consecutive-failure threshold before a peer is marked `Failed`.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
/// Per-destination channel capacity. `enqueue` never blocks: a full
/// channel drops the command and logs, which still satisfies "never drops
/// without noting failure".
const CHANNEL_CAPACITY: usize = 1024;

pub struct OutboundQueue {
    senders: DashMap<String, mpsc::Sender<Command>>,
    failures: DashMap<String, u32>,
    client: Arc<dyn PeerClient>,
    topology: Arc<ClusterTopology>,
    retries: u32,
    failure_threshold: u32,
    shutdown_rx: watch::Receiver<bool>,
}

impl OutboundQueue {
    #[must_use]
    pub fn new(client: Arc<dyn PeerClient>, topology: Arc<ClusterTopology>, shutdown_rx: watch::Receiver<bool>) -> Arc<Self> {
        Self::with_limits(client, topology, shutdown_rx, DEFAULT_RETRIES, DEFAULT_FAILURE_THRESHOLD)
    }

    #[must_use]
    pub fn with_limits(
        client: Arc<dyn PeerClient>,
        topology: Arc<ClusterTopology>,
        shutdown_rx: watch::Receiver<bool>,
        retries: u32,
        failure_threshold: u32,
    ) -> Arc<Self> {
        Arc::new(Self {
            senders: DashMap::new(),
            failures: DashMap::new(),
            client,
            topology,
            retries,
            failure_threshold,
            shutdown_rx,
        })
    }

    /// Non-blocking enqueue. Creates the per-destination dispatcher task
    /// lazily on first use.
    pub fn enqueue(self: &Arc<Self>, dest: Node, cmd: Command) {
        let sender = self
            .senders
            .entry(dest.name.clone())
            .or_insert_with(|| self.spawn_dispatcher(dest.clone()))
            .clone();

        if sender.try_send(cmd).is_err() {
            warn!(peer = %dest.name, "outbound channel full, command dropped");
            metrics::counter!("ovo_outbound_dropped_total", "peer" => dest.name.clone()).increment(1);
        } else {
            metrics::gauge!("ovo_outbound_queue_depth", "peer" => dest.name.clone()).set(sender.max_capacity() as f64 - sender.capacity() as f64);
        }
    }

    fn spawn_dispatcher(self: &Arc<Self>, dest: Node) -> mpsc::Sender<Command> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let this = Arc::clone(self);
        tokio::spawn(this.dispatch_loop(dest, rx));
        tx
    }

    async fn dispatch_loop(self: Arc<Self>, dest: Node, mut rx: mpsc::Receiver<Command>) {
        let mut shutdown = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                maybe_cmd = rx.recv() => {
                    match maybe_cmd {
                        Some(cmd) => self.dispatch(&dest, cmd).await,
                        None => break,
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn dispatch(&self, dest: &Node, mut cmd: Command) {
        for attempt in 0..=self.retries {
            match self.client.apply(dest, cmd.clone()).await {
                Ok(()) => {
                    self.failures.insert(dest.name.clone(), 0);
                    return;
                }
                Err(err) => {
                    cmd.attempts += 1;
                    if attempt < self.retries {
                        let backoff = Duration::from_millis(100 * 2u64.pow(attempt));
                        warn!(peer = %dest.name, attempt, error = %err, "retrying replicated command");
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        let consecutive = {
            let mut entry = self.failures.entry(dest.name.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        warn!(peer = %dest.name, attempts = cmd.attempts, "command dropped after exhausting retry budget");
        metrics::counter!("ovo_peer_failures_total", "peer" => dest.name.clone()).increment(1);
        if consecutive >= self.failure_threshold {
            warn!(peer = %dest.name, consecutive, "peer marked failed after consecutive replication failures");
            self.topology.mark_failed(&dest.name);
        }
    }

    #[must_use]
    pub fn consecutive_failures(&self, peer: &str) -> u32 {
        self.failures.get(peer).map_or(0, |v| *v)
    }
}

#[cfg(test)]
mod tests {
    use ovo_core::{CommandPayload, MetaUpdateObject, NodeState, OpCode, TopologyNode};

    use super::*;
    use crate::cluster::NullPeerClient;

    fn node(name: &str) -> Node {
        Node {
            name: name.into(),
            host: "127.0.0.1".into(),
            api_host: "127.0.0.1".into(),
            port: 8080,
            ext_host: "127.0.0.1".into(),
            hash_range: vec![0],
            state: NodeState::Active,
        }
    }

    fn put_cmd(key: &str) -> Command {
        Command::new(OpCode::Put, CommandPayload::Object(MetaUpdateObject { key: key.into(), ..Default::default() }))
    }

    #[tokio::test]
    async fn successful_dispatch_resets_failure_count() {
        let (_tx, rx) = watch::channel(false);
        let topology = ClusterTopology::new(TopologyNode::new(node("self"), 0));
        let client = Arc::new(NullPeerClient::new());
        let queue = OutboundQueue::new(client.clone(), topology, rx);

        queue.enqueue(node("peer"), put_cmd("a"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(client.applied.lock().len(), 1);
        assert_eq!(queue.consecutive_failures("peer"), 0);
    }

    #[tokio::test]
    async fn exhausted_retries_mark_peer_failed_at_threshold() {
        let (_tx, rx) = watch::channel(false);
        let topology = ClusterTopology::new(TopologyNode::new(node("self"), 0));
        topology.add_node(TopologyNode::new(node("peer"), 0));
        let client = Arc::new(NullPeerClient::new());
        client.fail("peer");
        let queue = OutboundQueue::with_limits(client, Arc::clone(&topology), rx, 0, 1);

        queue.enqueue(node("peer"), put_cmd("a"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(topology.get_node("peer").unwrap().state, NodeState::Failed);
    }
}
