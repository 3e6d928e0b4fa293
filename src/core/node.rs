//! Path node references
//!
//! Every hop of a cable path is a list of node references. A reference is a
//! `(kind, id)` pair compiled to the opaque string form `"<kind>:<id>"`, e.g.
//! `interface:12` or `cable:3`. The compiled form is what gets persisted and
//! indexed; it round-trips losslessly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::termination::TerminationKind;

/// Kind of a path node: a termination, or one of the two link kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Termination(TerminationKind),
    Cable,
    WirelessLink,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Termination(kind) => kind.as_str(),
            NodeKind::Cable => "cable",
            NodeKind::WirelessLink => "wirelesslink",
        }
    }

    /// Whether this kind is a link (cable or wireless link)
    pub fn is_link(&self) -> bool {
        matches!(self, NodeKind::Cable | NodeKind::WirelessLink)
    }

    pub fn termination_kind(&self) -> Option<TerminationKind> {
        match self {
            NodeKind::Termination(kind) => Some(*kind),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NodeKind {
    type Err = NodeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cable" => Ok(NodeKind::Cable),
            "wirelesslink" => Ok(NodeKind::WirelessLink),
            other => other
                .parse::<TerminationKind>()
                .map(NodeKind::Termination)
                .map_err(|_| NodeParseError::UnknownKind(other.to_string())),
        }
    }
}

impl From<TerminationKind> for NodeKind {
    fn from(kind: TerminationKind) -> Self {
        NodeKind::Termination(kind)
    }
}

/// Errors parsing a compiled node reference
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeParseError {
    #[error("Malformed node reference '{0}' (expected <kind>:<id>)")]
    Malformed(String),

    #[error("Unknown node kind: {0}")]
    UnknownKind(String),

    #[error("Invalid node id in '{0}'")]
    InvalidId(String),
}

/// Reference to a node in the topology, by kind and ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeRef {
    pub kind: NodeKind,
    pub id: u64,
}

impl NodeRef {
    pub fn new(kind: NodeKind, id: u64) -> Self {
        Self { kind, id }
    }

    pub fn termination(kind: TerminationKind, id: u64) -> Self {
        Self::new(NodeKind::Termination(kind), id)
    }

    pub fn cable(id: u64) -> Self {
        Self::new(NodeKind::Cable, id)
    }

    pub fn wireless_link(id: u64) -> Self {
        Self::new(NodeKind::WirelessLink, id)
    }

    pub fn interface(id: u64) -> Self {
        Self::termination(TerminationKind::Interface, id)
    }

    pub fn front_port(id: u64) -> Self {
        Self::termination(TerminationKind::FrontPort, id)
    }

    pub fn rear_port(id: u64) -> Self {
        Self::termination(TerminationKind::RearPort, id)
    }

    pub fn circuit_termination(id: u64) -> Self {
        Self::termination(TerminationKind::CircuitTermination, id)
    }

    pub fn termination_kind(&self) -> Option<TerminationKind> {
        self.kind.termination_kind()
    }

    pub fn is_link(&self) -> bool {
        self.kind.is_link()
    }
}

/// Compile a `(kind, id)` pair to its string form
pub fn compile_path_node(kind: NodeKind, id: u64) -> String {
    format!("{}:{}", kind, id)
}

/// Split a compiled node string back into `(kind, id)`
pub fn decompile_path_node(repr: &str) -> Result<(NodeKind, u64), NodeParseError> {
    let (kind, id) = repr
        .split_once(':')
        .ok_or_else(|| NodeParseError::Malformed(repr.to_string()))?;
    let kind: NodeKind = kind.parse()?;
    let id: u64 = id
        .parse()
        .map_err(|_| NodeParseError::InvalidId(repr.to_string()))?;
    Ok((kind, id))
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", compile_path_node(self.kind, self.id))
    }
}

impl std::str::FromStr for NodeRef {
    type Err = NodeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = decompile_path_node(s.trim())?;
        Ok(NodeRef { kind, id })
    }
}

impl TryFrom<String> for NodeRef {
    type Error = NodeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeRef> for String {
    fn from(node: NodeRef) -> Self {
        node.to_string()
    }
}
