//! Cluster domain types: nodes, liveness state, and topology entries.

use serde::{Deserialize, Serialize};

/// Liveness state of a peer as tracked by the local topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    Active,
    Inactive,
    Failed,
}

/// A single cluster member: address plus the hash ranges it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub host: String,
    pub api_host: String,
    pub port: u16,
    pub ext_host: String,
    /// The set of opaque partition-hash values this node owns.
    pub hash_range: Vec<i32>,
    pub state: NodeState,
}

impl Node {
    #[must_use]
    pub fn is_active_owner(&self, hash: i32) -> bool {
        self.state == NodeState::Active && self.hash_range.contains(&hash)
    }
}

/// Wraps a `Node` with lifecycle timestamps and replica-sibling relations.
///
/// `twins` are peers sharing this node's hash range (synchronous-intent
/// replicas); `stepbrothers` are backup peers that hold a replica for
/// takeover but do not own the range themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub node: Node,
    pub start_date: i64,
    pub update_date: i64,
    #[serde(default)]
    pub twins: Vec<String>,
    #[serde(default)]
    pub stepbrothers: Vec<String>,
}

impl TopologyNode {
    #[must_use]
    pub fn new(node: Node, now_millis: i64) -> Self {
        Self {
            node,
            start_date: now_millis,
            update_date: now_millis,
            twins: Vec::new(),
            stepbrothers: Vec::new(),
        }
    }
}
