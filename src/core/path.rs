//! Cable path value
//!
//! A `CablePath` is the persisted result of one trace: an ordered list of
//! hops, each a list of node references, plus completeness, activity and
//! split flags. The flat `_nodes` membership list is derived from the hops and
//! never set independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::node::{NodeKind, NodeRef};
use crate::core::topology::TopologySource;
use crate::entities::termination::{HasLink, IsPassthrough, TerminationKind};

/// A traced cable path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PersistedPath", into = "PersistedPath")]
pub struct CablePath {
    /// Row ID once stored
    pub id: Option<i64>,

    /// When the path was computed
    pub traced_at: Option<DateTime<Utc>>,

    pub is_complete: bool,
    pub is_active: bool,
    pub is_split: bool,

    path: Vec<Vec<NodeRef>>,
    nodes: Vec<NodeRef>,
}

/// On-disk and wire form
#[derive(Serialize, Deserialize)]
struct PersistedPath {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<i64>,

    path: Vec<Vec<NodeRef>>,
    is_complete: bool,
    is_active: bool,
    is_split: bool,

    #[serde(rename = "_nodes", default)]
    nodes: Vec<NodeRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    traced_at: Option<DateTime<Utc>>,
}

impl From<PersistedPath> for CablePath {
    fn from(p: PersistedPath) -> Self {
        let mut path = CablePath::new(p.path, p.is_complete, p.is_active, p.is_split);
        path.id = p.id;
        path.traced_at = p.traced_at;
        path
    }
}

impl From<CablePath> for PersistedPath {
    fn from(p: CablePath) -> Self {
        PersistedPath {
            id: p.id,
            path: p.path,
            is_complete: p.is_complete,
            is_active: p.is_active,
            is_split: p.is_split,
            nodes: p.nodes,
            traced_at: p.traced_at,
        }
    }
}

impl CablePath {
    pub fn new(path: Vec<Vec<NodeRef>>, is_complete: bool, is_active: bool, is_split: bool) -> Self {
        let nodes = path.iter().flatten().copied().collect();
        Self {
            id: None,
            traced_at: None,
            is_complete,
            is_active,
            is_split,
            path,
            nodes,
        }
    }

    /// Ordered hops
    pub fn path(&self) -> &[Vec<NodeRef>] {
        &self.path
    }

    /// Every node of every hop, in order
    pub fn nodes(&self) -> &[NodeRef] {
        &self.nodes
    }

    pub fn contains(&self, node: NodeRef) -> bool {
        self.nodes.contains(&node)
    }

    /// Terminations the path was traced from
    pub fn origins(&self) -> &[NodeRef] {
        self.path.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Terminations (or sinks) the path ends on; empty unless complete
    pub fn destinations(&self) -> &[NodeRef] {
        if !self.is_complete {
            return &[];
        }
        self.path.last().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn origin_kind(&self) -> Option<NodeKind> {
        self.origins().first().map(|n| n.kind)
    }

    pub fn destination_kind(&self) -> Option<NodeKind> {
        self.destinations().first().map(|n| n.kind)
    }

    /// Number of termination-link-termination segments
    pub fn segment_count(&self) -> usize {
        self.path.len() / 3
    }

    /// IDs of every cable in the path, in order
    pub fn cable_ids(&self) -> Vec<u64> {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Cable)
            .map(|n| n.id)
            .collect()
    }

    /// Total length in metres and whether it is definitive
    ///
    /// Each link hop contributes its longest known link. The total is only
    /// definitive when every link in the path has a known length; otherwise it
    /// is a lower bound.
    pub fn total_length<T: TopologySource + ?Sized>(&self, topology: &T) -> (f64, bool) {
        let mut total = 0.0;
        let mut definitive = true;

        for hop in &self.path {
            if !hop.iter().all(|n| n.is_link()) {
                continue;
            }
            let mut hop_length: f64 = 0.0;
            for node in hop {
                match topology.link(*node).ok().and_then(|l| l.length_meters()) {
                    Some(length) => hop_length = hop_length.max(length),
                    None => definitive = false,
                }
            }
            total += hop_length;
        }

        (total, definitive)
    }

    /// Candidate next terminations where a split path stopped
    pub fn split_nodes<T: TopologySource + ?Sized>(&self, topology: &T) -> Vec<NodeRef> {
        if !self.is_split {
            return Vec::new();
        }
        let Some(last) = self.path.last() else {
            return Vec::new();
        };

        let mut nodes: Vec<NodeRef> = Vec::new();
        for node in last {
            let candidates: Vec<NodeRef> = match node.termination_kind() {
                Some(TerminationKind::RearPort) => topology
                    .mappings_for_rear_port(node.id, None)
                    .iter()
                    .map(|m| m.front_node())
                    .collect(),
                Some(TerminationKind::FrontPort) => topology
                    .mappings_for_front_port(node.id, None)
                    .iter()
                    .map(|m| m.rear_node())
                    .collect(),
                Some(TerminationKind::CircuitTermination) => {
                    match topology.circuit_peer(*node) {
                        Ok(Some(peer)) => vec![peer.termination()],
                        _ => Vec::new(),
                    }
                }
                _ => Vec::new(),
            };
            for candidate in candidates {
                if !nodes.contains(&candidate) {
                    nodes.push(candidate);
                }
            }
        }
        nodes
    }

    /// Pass-through nodes in the path that have no link attached
    pub fn asymmetric_nodes<T: TopologySource + ?Sized>(&self, topology: &T) -> Vec<NodeRef> {
        let mut nodes = Vec::new();
        for hop in &self.path {
            let passthrough = hop
                .first()
                .and_then(|n| n.termination_kind())
                .is_some_and(|k| k.is_passthrough());
            if !passthrough {
                continue;
            }
            for node in hop {
                let unlinked = topology
                    .termination(*node)
                    .map(|t| t.link().is_none())
                    .unwrap_or(false);
                if unlinked {
                    nodes.push(*node);
                }
            }
        }
        nodes
    }

    /// Whether the path ends on a sink reached through a circuit
    pub fn ends_on_sink(&self) -> bool {
        self.path
            .last()
            .and_then(|hop| hop.first())
            .and_then(|n| n.termination_kind())
            .is_some_and(|k| k.is_sink())
    }
}
