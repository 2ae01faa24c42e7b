//! Server side of the peer RPC contract: `RegisterNode` and `Apply`, the
//! two calls a peer's `HttpPeerClient` makes against this node.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use ovo_core::{Command, TopologyNode};

use super::AppState;

/// `POST /ovo/cluster/register` -- the peer announces itself; we merge it
/// into our topology and hand back our current view.
pub async fn register_node_handler(State(state): State<AppState>, Json(peer_node): Json<TopologyNode>) -> Json<Vec<TopologyNode>> {
    state.topology.add_node(peer_node);
    Json(state.topology.snapshot())
}

/// `POST /ovo/cluster/apply` -- applies a replicated command received from
/// a peer by routing it onto the sharded inbound queue, which preserves
/// per-key arrival order and never blocks the caller on application.
pub async fn apply_command_handler(State(state): State<AppState>, Json(cmd): Json<Command>) -> StatusCode {
    state.inbound.submit(cmd);
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use tokio::sync::watch;

    use super::*;
    use crate::cluster::{ClusterTopology, NullPeerClient};
    use crate::network::{NetworkConfig, ShutdownController};
    use crate::partition::{InboundQueue, OutboundQueue, Partitioner};
    use crate::storage::DashMapCollection;
    use ovo_core::{CommandPayload, MetaUpdateObject, Node, NodeState, OpCode};

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

    fn state() -> AppState {
        let topology = ClusterTopology::new(TopologyNode::new(node("self"), 0));
        let collection = DashMapCollection::new();
        let (_tx, rx) = watch::channel(false);
        let peer_client = Arc::new(NullPeerClient::new());
        let outbound = OutboundQueue::new(peer_client.clone(), Arc::clone(&topology), rx.clone());
        let inbound = InboundQueue::start(Arc::clone(&collection), 4, rx);
        let partitioner = Arc::new(Partitioner::new("self", Arc::clone(&topology), Arc::clone(&outbound)));

        AppState {
            collection,
            topology,
            outbound,
            inbound,
            partitioner,
            peer_client,
            shutdown: Arc::new(ShutdownController::new()),
            config: Arc::new(NetworkConfig::default()),
            start_time: Instant::now(),
        }
    }

    #[tokio::test]
    async fn register_node_adds_peer_and_returns_snapshot() {
        let state = state();
        let Json(snapshot) = register_node_handler(State(state.clone()), Json(TopologyNode::new(node("peer"), 0))).await;
        assert_eq!(snapshot.len(), 2);
        assert!(state.topology.get_node("peer").is_some());
    }

    #[tokio::test]
    async fn apply_command_applies_to_local_collection() {
        let state = state();
        let cmd = Command::new(OpCode::Put, CommandPayload::Object(MetaUpdateObject { key: "a".into(), data: vec![1], ..Default::default() }));
        let status = apply_command_handler(State(state.clone()), Json(cmd)).await;
        assert_eq!(status, StatusCode::OK);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(state.collection.get("a").unwrap().data, vec![1]);
    }
}
