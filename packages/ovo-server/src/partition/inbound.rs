//! Serialized application of replicated commands received from peers.

use std::sync::Arc;

use ovo_core::Command;
use tokio::sync::{mpsc, watch};
use tracing::warn;

use super::apply::apply_command;
use crate::storage::DashMapCollection;

/// Default shard count. Commands for the same key always land on the same
/// shard (so per-key arrival order is preserved); independent keys
/// parallelize across shards.
pub const DEFAULT_SHARDS: usize = 64;
const SHARD_CHANNEL_CAPACITY: usize = 256;

pub struct InboundQueue {
    shards: Vec<mpsc::Sender<Command>>,
}

impl InboundQueue {
    #[must_use]
    pub fn start(collection: Arc<DashMapCollection>, shard_count: usize, shutdown_rx: watch::Receiver<bool>) -> Arc<Self> {
        let shard_count = shard_count.max(1);
        let mut shards = Vec::with_capacity(shard_count);

        for _ in 0..shard_count {
            let (tx, rx) = mpsc::channel(SHARD_CHANNEL_CAPACITY);
            shards.push(tx);
            let collection = Arc::clone(&collection);
            let shutdown_rx = shutdown_rx.clone();
            tokio::spawn(Self::shard_loop(collection, rx, shutdown_rx));
        }

        Arc::new(Self { shards })
    }

    /// Routes `cmd` to the shard owning its key. Non-blocking: a full shard
    /// channel drops the command and logs. Inbound application is
    /// best-effort: errors are logged, never propagated back to the peer.
    pub fn submit(&self, cmd: Command) {
        let idx = shard_index(cmd.key(), self.shards.len());
        if self.shards[idx].try_send(cmd).is_err() {
            warn!("inbound shard channel full, command dropped");
        }
    }

    async fn shard_loop(collection: Arc<DashMapCollection>, mut rx: mpsc::Receiver<Command>, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                maybe_cmd = rx.recv() => {
                    match maybe_cmd {
                        Some(cmd) => {
                            if let Err(err) = apply_command(&*collection, &cmd) {
                                warn!(op_code = ?cmd.op_code, key = cmd.key(), error = %err, "replicated command application failed");
                            }
                        }
                        None => break,
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

fn shard_index(key: &str, shard_count: usize) -> usize {
    let mut hash: u64 = 1469598103934665603; // FNV-1a offset basis
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(1099511628211);
    }
    (hash as usize) % shard_count
}

#[cfg(test)]
mod tests {
    use ovo_core::{CommandPayload, MetaUpdateObject, OpCode};

    use super::*;

    #[test]
    fn shard_index_is_deterministic_and_stable_per_key() {
        let a = shard_index("same-key", 64);
        let b = shard_index("same-key", 64);
        assert_eq!(a, b);
    }

    #[test]
    fn shard_index_stays_in_bounds() {
        for key in ["a", "bb", "ccc", ""] {
            assert!(shard_index(key, 8) < 8);
        }
    }

    #[tokio::test]
    async fn submitted_put_is_applied_to_the_collection() {
        let (_tx, rx) = watch::channel(false);
        let collection = DashMapCollection::new();
        let queue = InboundQueue::start(Arc::clone(&collection), 4, rx);

        queue.submit(Command::new(
            OpCode::Put,
            CommandPayload::Object(MetaUpdateObject { key: "a".into(), data: vec![1, 2], ..Default::default() }),
        ));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(collection.get("a").unwrap().data, vec![1, 2]);
    }

    #[tokio::test]
    async fn same_key_commands_apply_in_arrival_order() {
        let (_tx, rx) = watch::channel(false);
        let collection = DashMapCollection::new();
        let queue = InboundQueue::start(Arc::clone(&collection), 4, rx);

        for i in 0..5 {
            queue.submit(Command::new(
                OpCode::Put,
                CommandPayload::Object(MetaUpdateObject { key: "k".into(), data: vec![i], ..Default::default() }),
            ));
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(collection.get("k").unwrap().data, vec![4]);
    }
}
