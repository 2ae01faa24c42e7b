//! Full put -> partition -> replicate -> drain flow across two in-process
//! nodes, wiring the partitioner, outbound queue, and inbound queue
//! together instead of exercising each in isolation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ovo_core::{Command, CommandPayload, MetaCounter, MetaObject, MetaUpdateObject, Node, NodeState, OpCode, OvoError, TopologyNode};
use ovo_server::cluster::{ClusterTopology, PeerClient};
use ovo_server::partition::{InboundQueue, OutboundQueue, Partitioner};
use ovo_server::storage::{ConcurrentCollection, DashMapCollection};
use tokio::sync::watch;

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

/// Forwards directly into a peer's inbound queue/collection instead of
/// going over the network, so the two-node flow stays in-process.
struct LoopbackPeerClient {
    inbound: Arc<InboundQueue>,
    collection: Arc<DashMapCollection>,
}

#[async_trait]
impl PeerClient for LoopbackPeerClient {
    async fn register_node(&self, _peer: &Node, _self_node: &TopologyNode) -> Result<Vec<TopologyNode>, OvoError> {
        Ok(Vec::new())
    }

    async fn apply(&self, _peer: &Node, cmd: Command) -> Result<(), OvoError> {
        self.inbound.submit(cmd);
        Ok(())
    }

    async fn forward_get(&self, _peer: &Node, key: &str) -> Result<MetaObject, OvoError> {
        self.collection.get(key).ok_or(OvoError::NotFound)
    }

    async fn forward_increment(&self, _peer: &Node, delta: MetaCounter) -> Result<MetaCounter, OvoError> {
        Ok(self.collection.increment(&delta))
    }
}

#[tokio::test]
async fn put_on_owner_replicates_to_twin_and_drains_into_its_collection() {
    let collection_a = DashMapCollection::new();
    let collection_b = DashMapCollection::new();

    let (_tx_a, rx_a) = watch::channel(false);
    let (_tx_b, rx_b) = watch::channel(false);

    let inbound_b = InboundQueue::start(Arc::clone(&collection_b), 4, rx_b);

    let mut topo_node_a = TopologyNode::new(node("a"), 0);
    topo_node_a.twins = vec!["b".into()];
    let topology_a = ClusterTopology::new(topo_node_a);
    topology_a.add_node(TopologyNode::new(node("b"), 0));

    let client_a: Arc<dyn PeerClient> = Arc::new(LoopbackPeerClient { inbound: Arc::clone(&inbound_b), collection: Arc::clone(&collection_b) });
    let outbound_a = OutboundQueue::new(client_a, Arc::clone(&topology_a), rx_a);
    let partitioner_a = Partitioner::new("a", Arc::clone(&topology_a), Arc::clone(&outbound_a));

    let payload = CommandPayload::Object(MetaUpdateObject { key: "k".into(), data: vec![9, 9], ..Default::default() });
    partitioner_a
        .route_mutation(0, OpCode::Put, payload, || collection_a.put(MetaObject::new("k", vec![9, 9], "", 0, 0)))
        .unwrap();

    assert_eq!(collection_a.get("k").unwrap().data, vec![9, 9]);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(collection_b.get("k").unwrap().data, vec![9, 9], "twin never received the replicated put");
}

#[tokio::test]
async fn replicated_put_preserves_ttl_on_the_twin() {
    let collection_a = DashMapCollection::new();
    let collection_b = DashMapCollection::new();

    let (_tx_a, rx_a) = watch::channel(false);
    let (_tx_b, rx_b) = watch::channel(false);

    let inbound_b = InboundQueue::start(Arc::clone(&collection_b), 4, rx_b);

    let mut topo_node_a = TopologyNode::new(node("a"), 0);
    topo_node_a.twins = vec!["b".into()];
    let topology_a = ClusterTopology::new(topo_node_a);
    topology_a.add_node(TopologyNode::new(node("b"), 0));

    let client_a: Arc<dyn PeerClient> = Arc::new(LoopbackPeerClient { inbound: Arc::clone(&inbound_b), collection: Arc::clone(&collection_b) });
    let outbound_a = OutboundQueue::new(client_a, Arc::clone(&topology_a), rx_a);
    let partitioner_a = Partitioner::new("a", Arc::clone(&topology_a), Arc::clone(&outbound_a));

    let payload = CommandPayload::Object(MetaUpdateObject { key: "k".into(), data: vec![1], ttl: 1, ..Default::default() });
    partitioner_a
        .route_mutation(0, OpCode::Put, payload, || collection_a.put(MetaObject::new("k", vec![1], "", 0, 1)))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(collection_b.get("k").unwrap().ttl, 1, "twin's replicated entry lost the original TTL");

    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert!(collection_b.get("k").is_none(), "twin's replicated entry should expire like the owner's");
}

#[tokio::test]
async fn exhausted_retries_against_a_twin_mark_it_failed() {
    let (_tx_a, rx_a) = watch::channel(false);

    let mut topo_node_a = TopologyNode::new(node("a"), 0);
    topo_node_a.twins = vec!["b".into()];
    let topology_a = ClusterTopology::new(topo_node_a);
    topology_a.add_node(TopologyNode::new(node("b"), 0));

    let failing = Arc::new(ovo_server::cluster::NullPeerClient::new());
    failing.fail("b");
    let outbound_a = OutboundQueue::with_limits(failing, Arc::clone(&topology_a), rx_a, 0, 1);
    let partitioner_a = Partitioner::new("a", Arc::clone(&topology_a), Arc::clone(&outbound_a));

    let collection_a = DashMapCollection::new();
    let payload = CommandPayload::Object(MetaUpdateObject { key: "k".into(), ..Default::default() });
    partitioner_a.route_mutation(0, OpCode::Put, payload, || collection_a.put(MetaObject::new("k", vec![], "", 0, 0))).unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(topology_a.get_node("b").unwrap().state, NodeState::Failed);
}

#[tokio::test]
async fn read_on_non_owner_forwards_to_the_deterministic_owner() {
    let collection_remote = DashMapCollection::new();
    collection_remote.put(MetaObject::new("k", vec![5, 5], "", 0, 0)).unwrap();

    let (_tx_local, rx_local) = watch::channel(false);
    let (_tx_remote, rx_remote) = watch::channel(false);
    let inbound_remote = InboundQueue::start(Arc::clone(&collection_remote), 4, rx_remote);

    let topology_local = ClusterTopology::new(TopologyNode::new(node("local"), 0));
    let mut remote = node("remote");
    remote.hash_range = vec![8];
    topology_local.add_node(TopologyNode::new(remote, 0));

    let client: Arc<dyn PeerClient> = Arc::new(LoopbackPeerClient { inbound: inbound_remote, collection: Arc::clone(&collection_remote) });
    let outbound_local = OutboundQueue::new(client.clone(), Arc::clone(&topology_local), rx_local);
    let partitioner_local = Partitioner::new("local", Arc::clone(&topology_local), outbound_local);

    match partitioner_local.route_read(8) {
        ovo_server::partition::ReadRoute::Forward(owner) => {
            let found = client.forward_get(&owner, "k").await.unwrap();
            assert_eq!(found.data, vec![5, 5]);
        }
        other => panic!("expected a forward route, got {other:?}"),
    }
}
