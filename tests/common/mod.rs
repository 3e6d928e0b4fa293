//! Shared test helpers for integration tests
//!
//! Topology fixtures for the reference scenarios, plus helpers to run the
//! binary against topology files in a temp directory.

#![allow(dead_code)]

use std::path::PathBuf;

use assert_cmd::cargo;
use assert_cmd::Command;
use tempfile::TempDir;

use cabletrace::core::node::NodeRef;
use cabletrace::core::topology::{Topology, TopologyDocument};

/// Helper to get a cabletrace command
pub fn cabletrace() -> Command {
    Command::new(cargo::cargo_bin!("cabletrace"))
}

/// Build a topology from inline YAML
pub fn topology(yaml: &str) -> Topology {
    let doc: TopologyDocument = serde_yml::from_str(yaml).unwrap();
    Topology::from_document(doc).unwrap()
}

/// Write a topology file into a fresh temp directory
pub fn write_topology(yaml: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("topology.yaml");
    std::fs::write(&path, yaml).unwrap();
    (tmp, path)
}

/// Hops from nested slices
pub fn hops(nodes: &[&[NodeRef]]) -> Vec<Vec<NodeRef>> {
    nodes.iter().map(|hop| hop.to_vec()).collect()
}

pub fn iface(id: u64) -> NodeRef {
    NodeRef::interface(id)
}

pub fn fp(id: u64) -> NodeRef {
    NodeRef::front_port(id)
}

pub fn rp(id: u64) -> NodeRef {
    NodeRef::rear_port(id)
}

pub fn cable(id: u64) -> NodeRef {
    NodeRef::cable(id)
}

/// IF1 - C1 - IF2 on a 1C1P cable
pub const DIRECT: &str = r#"
terminations:
  - { kind: interface, id: 1, name: eth0 }
  - { kind: interface, id: 2, name: eth1 }
cables:
  - { id: 1, profile: single-1c1p, status: connected, a_terminations: ["interface:1"], b_terminations: ["interface:2"], length: 3, length_unit: m }
"#;

/// IF1 - C1 - FP1 ↔ RP1 - C3 (1C2P) - RP2 ↔ FP2 - C2 - IF2
pub fn passthrough(c3_status: &str) -> String {
    format!(
        r#"
terminations:
  - {{ kind: interface, id: 1 }}
  - {{ kind: interface, id: 2 }}
  - {{ kind: frontport, id: 1, device: 10 }}
  - {{ kind: rearport, id: 1, device: 10, positions: 2 }}
  - {{ kind: frontport, id: 2, device: 20 }}
  - {{ kind: rearport, id: 2, device: 20, positions: 2 }}
port_mappings:
  - {{ front_port: 1, front_port_position: 1, rear_port: 1, rear_port_position: 1 }}
  - {{ front_port: 2, front_port_position: 1, rear_port: 2, rear_port_position: 1 }}
cables:
  - {{ id: 1, a_terminations: ["interface:1"], b_terminations: ["frontport:1"] }}
  - {{ id: 3, profile: single-1c2p, status: {c3_status}, a_terminations: ["rearport:1"], b_terminations: ["rearport:2"] }}
  - {{ id: 2, a_terminations: ["frontport:2"], b_terminations: ["interface:2"] }}
"#
    )
}

/// IF1, IF2 on side A and IF3, IF4 on side B of one 2C1P trunk
pub const TRUNK_2C1P: &str = r#"
terminations:
  - { kind: interface, id: 1 }
  - { kind: interface, id: 2 }
  - { kind: interface, id: 3 }
  - { kind: interface, id: 4 }
cables:
  - { id: 1, profile: trunk-2c1p, a_terminations: ["interface:1", "interface:2"], b_terminations: ["interface:3", "interface:4"] }
"#;

/// IF1..IF4 - C1..C4 - FP1..FP4, FPi ↔ RP1 position i, RP1 - C5 (1C4P to 4C1P) - IF5..IF8
pub const BREAKOUT_1X4: &str = r#"
terminations:
  - { kind: interface, id: 1 }
  - { kind: interface, id: 2 }
  - { kind: interface, id: 3 }
  - { kind: interface, id: 4 }
  - { kind: interface, id: 5 }
  - { kind: interface, id: 6 }
  - { kind: interface, id: 7 }
  - { kind: interface, id: 8 }
  - { kind: frontport, id: 1, device: 10 }
  - { kind: frontport, id: 2, device: 10 }
  - { kind: frontport, id: 3, device: 10 }
  - { kind: frontport, id: 4, device: 10 }
  - { kind: rearport, id: 1, device: 10, positions: 4 }
port_mappings:
  - { front_port: 1, rear_port: 1, rear_port_position: 1 }
  - { front_port: 2, rear_port: 1, rear_port_position: 2 }
  - { front_port: 3, rear_port: 1, rear_port_position: 3 }
  - { front_port: 4, rear_port: 1, rear_port_position: 4 }
cables:
  - { id: 1, a_terminations: ["interface:1"], b_terminations: ["frontport:1"] }
  - { id: 2, a_terminations: ["interface:2"], b_terminations: ["frontport:2"] }
  - { id: 3, a_terminations: ["interface:3"], b_terminations: ["frontport:3"] }
  - { id: 4, a_terminations: ["interface:4"], b_terminations: ["frontport:4"] }
  - id: 5
    profile: breakout-1c4p-4c1p
    a_terminations: ["rearport:1"]
    b_terminations: ["interface:5", "interface:6", "interface:7", "interface:8"]
"#;

/// IF1 - C1 - CT_A, with CT_Z bound to provider network PN1
pub const CIRCUIT_PROVIDER_NETWORK: &str = r#"
terminations:
  - { kind: interface, id: 1 }
  - { kind: circuittermination, id: 1, circuit: { circuit: 7, side: A } }
  - { kind: circuittermination, id: 2, circuit: { circuit: 7, side: Z, bound_to: "providernetwork:1" } }
  - { kind: providernetwork, id: 1, name: Transit }
cables:
  - { id: 1, a_terminations: ["interface:1"], b_terminations: ["circuittermination:1"] }
"#;

/// IF1 - C1 - CT_A ... CT_Z - C2 - IF2
pub const CIRCUIT_END_TO_END: &str = r#"
terminations:
  - { kind: interface, id: 1 }
  - { kind: interface, id: 2 }
  - { kind: circuittermination, id: 1, circuit: { circuit: 7, side: A } }
  - { kind: circuittermination, id: 2, circuit: { circuit: 7, side: Z } }
cables:
  - { id: 1, a_terminations: ["interface:1"], b_terminations: ["circuittermination:1"] }
  - { id: 2, a_terminations: ["circuittermination:2"], b_terminations: ["interface:2"] }
"#;
