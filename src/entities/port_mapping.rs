//! Port mapping entity - front port position to rear port position

use serde::{Deserialize, Serialize};

use crate::core::node::NodeRef;

/// Assignment of one front-port position to one rear-port position within a device
///
/// A port may carry several mappings, one per position pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<u64>,

    pub front_port: u64,

    #[serde(default = "default_position")]
    pub front_port_position: u16,

    pub rear_port: u64,

    #[serde(default = "default_position")]
    pub rear_port_position: u16,
}

fn default_position() -> u16 {
    1
}

impl PortMapping {
    pub fn new(front_port: u64, front_port_position: u16, rear_port: u64, rear_port_position: u16) -> Self {
        Self {
            device: None,
            front_port,
            front_port_position,
            rear_port,
            rear_port_position,
        }
    }

    pub fn front_node(&self) -> NodeRef {
        NodeRef::front_port(self.front_port)
    }

    pub fn rear_node(&self) -> NodeRef {
        NodeRef::rear_port(self.rear_port)
    }
}
