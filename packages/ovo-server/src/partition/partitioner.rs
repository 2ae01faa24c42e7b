//! The decision unit for every mutation and read initiated locally.
//!
//! `Partitioner` classifies a hash against the topology and either applies
//! a mutation to the local collection and fans it out to twins/
//! stepbrothers, or enqueues it to a single deterministic remote owner.
//! Reads are classified the same way but resolved with a synchronous
//! forward RPC rather than the replication queue.

use ovo_core::{Command, CommandPayload, Node, OpCode, OvoError};

use crate::cluster::ClusterTopology;
use crate::partition::outbound::OutboundQueue;

/// The owner set for a hash, split into the roles the partitioner cares
/// about. Pure function of the topology at the instant of classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub current_is_owner: bool,
    /// Owners other than the current node, reachable as twins.
    pub twins: Vec<Node>,
    pub stepbrothers: Vec<Node>,
    /// Set only when the current node is not an owner: the single
    /// deterministically chosen remote owner (first Active, ties broken
    /// lexicographically by name).
    pub forward_owner: Option<Node>,
}

impl Classification {
    #[must_use]
    pub fn has_owner(&self) -> bool {
        self.current_is_owner || self.forward_owner.is_some()
    }
}

pub struct Partitioner {
    current_node: String,
    topology: std::sync::Arc<ClusterTopology>,
    outbound: std::sync::Arc<OutboundQueue>,
}

impl Partitioner {
    #[must_use]
    pub fn new(current_node: impl Into<String>, topology: std::sync::Arc<ClusterTopology>, outbound: std::sync::Arc<OutboundQueue>) -> Self {
        Self { current_node: current_node.into(), topology, outbound }
    }

    /// Computes `nodes_for_hash(h)` and splits it by role relative to the
    /// current node.
    ///
    /// "If the current node is both an owner and a stepbrother for the
    /// same range, the owner role wins" -- `nodes_for_hash` already
    /// returns the current node once (as an owner) when it owns the
    /// range, so there is nothing further to special-case here; a node
    /// never appears in its own stepbrothers list because `merge` only
    /// admits distinct peer names.
    #[must_use]
    pub fn classify(&self, hash: i32) -> Classification {
        let owners = self.topology.nodes_for_hash(hash);
        let current_is_owner = owners.iter().any(|n| n.name == self.current_node);

        if current_is_owner {
            let declared_stepbrothers: std::collections::HashSet<String> =
                self.topology.get_topology_node(&self.current_node).map(|tn| tn.stepbrothers.into_iter().collect()).unwrap_or_default();

            let mut twins = Vec::new();
            let mut stepbrothers = Vec::new();
            for other in owners.into_iter().filter(|n| n.name != self.current_node) {
                if declared_stepbrothers.contains(&other.name) {
                    stepbrothers.push(other);
                } else {
                    // Either a declared twin, or a peer that simply shares
                    // the hash range without an explicit relation -- both
                    // get synchronous-intent replication.
                    twins.push(other);
                }
            }
            return Classification { current_is_owner: true, twins, stepbrothers, forward_owner: None };
        }

        if owners.is_empty() {
            return Classification::default();
        }

        let mut candidates: Vec<&Node> = owners.iter().collect();
        candidates.sort_by(|a, b| a.name.cmp(&b.name));
        let forward_owner = candidates.into_iter().next().cloned();
        Classification { current_is_owner: false, twins: Vec::new(), stepbrothers: Vec::new(), forward_owner }
    }

    /// Routes a mutation: applies locally and replicates to twins/
    /// stepbrothers if the current node owns `hash`; otherwise enqueues to
    /// the deterministic remote owner and returns immediately -- the
    /// front door reports success as soon as the command is queued.
    ///
    /// `local_apply` performs the actual collection mutation and its
    /// `Result` is surfaced to the caller unchanged when the current node
    /// is the owner; validation/CAS errors must reach the REST layer.
    pub fn route_mutation(
        &self,
        hash: i32,
        op_code: OpCode,
        payload: CommandPayload,
        local_apply: impl FnOnce() -> Result<(), OvoError>,
    ) -> Result<(), OvoError> {
        let classification = self.classify(hash);

        if classification.current_is_owner {
            local_apply()?;
            let cmd = Command::new(op_code, payload);
            for twin in &classification.twins {
                self.outbound.enqueue(twin.clone(), cmd.clone());
            }
            for stepbrother in &classification.stepbrothers {
                self.outbound.enqueue(stepbrother.clone(), cmd.clone().with_backup());
            }
            return Ok(());
        }

        match classification.forward_owner {
            Some(owner) => {
                let cmd = Command::new(op_code, payload).with_target(owner.name.clone());
                self.outbound.enqueue(owner, cmd);
                Ok(())
            }
            None => Err(OvoError::NoOwner),
        }
    }
}

/// Where a read for `hash` should be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadRoute {
    Local,
    Forward(Node),
    NoOwner,
}

impl Partitioner {
    #[must_use]
    pub fn route_read(&self, hash: i32) -> ReadRoute {
        let classification = self.classify(hash);
        if classification.current_is_owner {
            ReadRoute::Local
        } else if let Some(owner) = classification.forward_owner {
            ReadRoute::Forward(owner)
        } else {
            ReadRoute::NoOwner
        }
    }
}
