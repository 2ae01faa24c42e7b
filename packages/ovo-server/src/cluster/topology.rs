//! The cluster topology runtime structure.

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use ovo_core::{Node, NodeState, TopologyNode};

/// `node_name -> TopologyNode`, plus a lock-free pointer to the current
/// node's name. Reads never block writers and vice versa, matching the
/// `DashMap`/`ArcSwap` pattern used for membership views elsewhere in the
/// stack.
pub struct ClusterTopology {
    nodes: DashMap<String, TopologyNode>,
    current: ArcSwap<String>,
}

impl ClusterTopology {
    #[must_use]
    pub fn new(current_node: TopologyNode) -> Arc<Self> {
        let name = current_node.node.name.clone();
        let nodes = DashMap::new();
        nodes.insert(name.clone(), current_node);
        Arc::new(Self { nodes, current: ArcSwap::from_pointee(name) })
    }

    pub fn add_node(&self, node: TopologyNode) {
        self.nodes.entry(node.node.name.clone()).or_insert(node);
    }

    pub fn remove_node(&self, name: &str) {
        self.nodes.remove(name);
    }

    #[must_use]
    pub fn get_node(&self, name: &str) -> Option<Node> {
        self.nodes.get(name).map(|e| e.node.clone())
    }

    #[must_use]
    pub fn get_topology_node(&self, name: &str) -> Option<TopologyNode> {
        self.nodes.get(name).map(|e| e.value().clone())
    }

    #[must_use]
    pub fn current_name(&self) -> String {
        (**self.current.load()).clone()
    }

    pub fn set_current(&self, name: impl Into<String>) {
        self.current.store(Arc::new(name.into()));
    }

    /// Union of node sets, preferring the higher `update_date` on conflict,
    /// and preserving our own entry unchanged. Dangling twin/stepbrother
    /// names (referring to nodes absent after the merge) are dropped.
    pub fn merge(&self, incoming: &[TopologyNode]) {
        let current = self.current_name();
        for node in incoming {
            if node.node.name == current {
                continue;
            }
            let should_replace = match self.nodes.get(&node.node.name) {
                Some(existing) => node.update_date > existing.update_date,
                None => true,
            };
            if should_replace {
                self.nodes.insert(node.node.name.clone(), node.clone());
            }
        }
        self.drop_dangling_names();
    }

    fn drop_dangling_names(&self) {
        let names: HashSet<String> = self.nodes.iter().map(|e| e.key().clone()).collect();
        for mut entry in self.nodes.iter_mut() {
            entry.twins.retain(|t| names.contains(t));
            entry.stepbrothers.retain(|s| names.contains(s));
        }
    }

    /// Marks `name` as `Failed`. No-op if the node is unknown.
    pub fn mark_failed(&self, name: &str) {
        if let Some(mut entry) = self.nodes.get_mut(name) {
            entry.node.state = NodeState::Failed;
        }
    }

    /// All Active nodes whose `hash_range` contains `h`, plus their
    /// declared twins and stepbrothers. Dangling names are
    /// silently skipped defensively, even though merge is expected to have
    /// already removed them.
    #[must_use]
    pub fn nodes_for_hash(&self, hash: i32) -> Vec<Node> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();

        for entry in &self.nodes {
            let tn = entry.value();
            if !tn.node.is_active_owner(hash) {
                continue;
            }
            if seen.insert(tn.node.name.clone()) {
                result.push(tn.node.clone());
            }
            for sibling in tn.twins.iter().chain(tn.stepbrothers.iter()) {
                if let Some(sibling_tn) = self.nodes.get(sibling) {
                    if seen.insert(sibling_tn.node.name.clone()) {
                        result.push(sibling_tn.node.clone());
                    }
                }
            }
        }
        result
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<TopologyNode> {
        self.nodes.iter().map(|e| e.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, range: Vec<i32>, state: NodeState) -> Node {
        Node {
            name: name.into(),
            host: "127.0.0.1".into(),
            api_host: "127.0.0.1".into(),
            port: 8080,
            ext_host: "127.0.0.1".into(),
            hash_range: range,
            state,
        }
    }

    #[test]
    fn nodes_for_hash_returns_only_active_owners() {
        let current = TopologyNode::new(node("n1", vec![0, 1, 2], NodeState::Active), 0);
        let topo = ClusterTopology::new(current);
        topo.add_node(TopologyNode::new(node("n2", vec![0, 1, 2], NodeState::Failed), 0));

        let owners = topo.nodes_for_hash(1);
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].name, "n1");
    }

    #[test]
    fn nodes_for_hash_includes_twins() {
        let mut n1 = TopologyNode::new(node("n1", vec![0, 1], NodeState::Active), 0);
        n1.twins = vec!["n1b".to_string()];
        let topo = ClusterTopology::new(n1);
        topo.add_node(TopologyNode::new(node("n1b", vec![0, 1], NodeState::Active), 0));

        let mut owners: Vec<String> = topo.nodes_for_hash(0).into_iter().map(|n| n.name).collect();
        owners.sort();
        assert_eq!(owners, vec!["n1".to_string(), "n1b".to_string()]);
    }

    #[test]
    fn merge_prefers_higher_update_date_and_preserves_own_entry() {
        let current = TopologyNode::new(node("self", vec![0], NodeState::Active), 100);
        let topo = ClusterTopology::new(current.clone());

        let stale_self = TopologyNode { update_date: 999, ..current.clone() };
        topo.merge(&[stale_self]);
        assert_eq!(topo.get_topology_node("self").unwrap().update_date, current.update_date);

        let mut older = TopologyNode::new(node("peer", vec![1], NodeState::Active), 10);
        topo.merge(&[older.clone()]);
        older.update_date = 5;
        older.node.state = NodeState::Inactive;
        topo.merge(&[older]);
        assert_eq!(topo.get_node("peer").unwrap().state, NodeState::Active);
    }

    #[test]
    fn merge_drops_dangling_twin_names() {
        let mut current = TopologyNode::new(node("self", vec![0], NodeState::Active), 0);
        current.twins = vec!["ghost".to_string()];
        let topo = ClusterTopology::new(current);
        topo.merge(&[]);
        assert!(topo.get_topology_node("self").unwrap().twins.is_empty());
    }

    #[test]
    fn mark_failed_flips_state() {
        let current = TopologyNode::new(node("self", vec![0], NodeState::Active), 0);
        let topo = ClusterTopology::new(current);
        topo.add_node(TopologyNode::new(node("peer", vec![1], NodeState::Active), 0));
        topo.mark_failed("peer");
        assert_eq!(topo.get_node("peer").unwrap().state, NodeState::Failed);
    }
}
