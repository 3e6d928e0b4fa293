//! End-to-end tracing scenarios

mod common;

use cabletrace::core::node::NodeRef;
use cabletrace::core::profiles::ProfileError;
use cabletrace::core::topology::{Topology, TopologyDocument, TopologyError};
use cabletrace::core::tracer::{trace, TraceConfig, TraceError};
use cabletrace::entities::termination::TerminationKind;
use common::*;

fn trace_from(yaml: &str, origins: &[NodeRef]) -> cabletrace::core::path::CablePath {
    let topo = topology(yaml);
    trace(&topo, origins, &TraceConfig::default())
        .unwrap()
        .unwrap()
}

fn ct(id: u64) -> NodeRef {
    NodeRef::circuit_termination(id)
}

// ============================================================================
// Reference scenarios
// ============================================================================

#[test]
fn test_direct_cable() {
    let path = trace_from(DIRECT, &[iface(1)]);
    assert_eq!(path.path(), hops(&[&[iface(1)], &[cable(1)], &[iface(2)]]));
    assert!(path.is_complete);
    assert!(path.is_active);
    assert!(!path.is_split);
}

#[test]
fn test_passthrough_via_1c2p_trunk() {
    let path = trace_from(&passthrough("connected"), &[iface(1)]);
    assert_eq!(
        path.path(),
        hops(&[
            &[iface(1)],
            &[cable(1)],
            &[fp(1)],
            &[rp(1)],
            &[cable(3)],
            &[rp(2)],
            &[fp(2)],
            &[cable(2)],
            &[iface(2)],
        ])
    );
    assert!(path.is_complete);
    assert!(path.is_active);
    assert!(!path.is_split);
    assert_eq!(path.segment_count(), 3);
    assert_eq!(path.cable_ids(), vec![1, 3, 2]);
}

#[test]
fn test_passthrough_traced_from_far_end() {
    let path = trace_from(&passthrough("connected"), &[iface(2)]);
    assert_eq!(path.origins(), &[iface(2)]);
    assert_eq!(path.destinations(), &[iface(1)]);
    assert!(path.is_complete);
}

#[test]
fn test_trunk_2c1p_fan_out() {
    let topo = topology(TRUNK_2C1P);
    let config = TraceConfig::default();

    let first = trace(&topo, &[iface(1)], &config).unwrap().unwrap();
    assert_eq!(first.path(), hops(&[&[iface(1)], &[cable(1)], &[iface(3)]]));

    let second = trace(&topo, &[iface(2)], &config).unwrap().unwrap();
    assert_eq!(second.path(), hops(&[&[iface(2)], &[cable(1)], &[iface(4)]]));

    let back = trace(&topo, &[iface(4)], &config).unwrap().unwrap();
    assert_eq!(back.path(), hops(&[&[iface(4)], &[cable(1)], &[iface(2)]]));
}

#[test]
fn test_breakout_1x4() {
    let path = trace_from(BREAKOUT_1X4, &[iface(1)]);
    assert_eq!(
        path.path(),
        hops(&[
            &[iface(1)],
            &[cable(1)],
            &[fp(1)],
            &[rp(1)],
            &[cable(5)],
            &[iface(5)],
        ])
    );
    assert!(path.is_complete);
}

#[test]
fn test_breakout_positions_follow_front_port() {
    let path = trace_from(BREAKOUT_1X4, &[iface(3)]);
    assert_eq!(path.destinations(), &[iface(7)]);
}

#[test]
fn test_breakout_traced_from_fan_out_side() {
    let path = trace_from(BREAKOUT_1X4, &[iface(6)]);
    assert_eq!(
        path.path(),
        hops(&[
            &[iface(6)],
            &[cable(5)],
            &[rp(1)],
            &[fp(2)],
            &[cable(2)],
            &[iface(2)],
        ])
    );
    assert!(path.is_complete);
}

#[test]
fn test_circuit_to_provider_network() {
    let path = trace_from(CIRCUIT_PROVIDER_NETWORK, &[iface(1)]);
    assert_eq!(
        path.path(),
        hops(&[
            &[iface(1)],
            &[cable(1)],
            &[ct(1)],
            &[ct(2)],
            &[NodeRef::termination(TerminationKind::ProviderNetwork, 1)],
        ])
    );
    assert!(path.is_complete);
    assert!(path.ends_on_sink());
}

#[test]
fn test_broken_mid_trace_is_complete_but_inactive() {
    let path = trace_from(&passthrough("planned"), &[iface(1)]);
    assert_eq!(path.path().len(), 9);
    assert!(path.is_complete);
    assert!(!path.is_active);
}

// ============================================================================
// Edge cases
// ============================================================================

#[test]
fn test_circuit_end_to_end() {
    let path = trace_from(CIRCUIT_END_TO_END, &[iface(1)]);
    assert_eq!(
        path.path(),
        hops(&[
            &[iface(1)],
            &[cable(1)],
            &[ct(1)],
            &[ct(2)],
            &[cable(2)],
            &[iface(2)],
        ])
    );
    assert!(path.is_complete);
    assert!(!path.ends_on_sink());
}

#[test]
fn test_circuit_to_site_follows_policy() {
    let yaml = r#"
terminations:
  - { kind: interface, id: 1 }
  - { kind: circuittermination, id: 1, circuit: { circuit: 3, side: A } }
  - { kind: circuittermination, id: 2, circuit: { circuit: 3, side: Z, bound_to: "site:4" } }
  - { kind: site, id: 4 }
cables:
  - { id: 1, a_terminations: ["interface:1"], b_terminations: ["circuittermination:1"] }
"#;
    let topo = topology(yaml);

    let default = trace(&topo, &[iface(1)], &TraceConfig::default())
        .unwrap()
        .unwrap();
    assert_eq!(default.path().len(), 5);
    assert!(!default.is_complete);
    assert!(default.destinations().is_empty());

    let config = TraceConfig {
        sink_paths_complete: true,
        ..Default::default()
    };
    let lenient = trace(&topo, &[iface(1)], &config).unwrap().unwrap();
    assert!(lenient.is_complete);
    assert_eq!(
        lenient.destinations(),
        &[NodeRef::termination(TerminationKind::Site, 4)]
    );
}

#[test]
fn test_unmapped_front_port_ends_incomplete() {
    let yaml = r#"
terminations:
  - { kind: interface, id: 1 }
  - { kind: frontport, id: 1 }
cables:
  - { id: 1, a_terminations: ["interface:1"], b_terminations: ["frontport:1"] }
"#;
    let path = trace_from(yaml, &[iface(1)]);
    assert_eq!(path.path(), hops(&[&[iface(1)], &[cable(1)], &[fp(1)]]));
    assert!(!path.is_complete);
    assert!(!path.is_split);
}

#[test]
fn test_rear_port_without_position_splits() {
    // Entering a multi-position rear port straight from an interface leaves
    // no position to pick a front port with
    let yaml = r#"
terminations:
  - { kind: interface, id: 1 }
  - { kind: rearport, id: 1, device: 1, positions: 2 }
  - { kind: frontport, id: 1, device: 1 }
  - { kind: frontport, id: 2, device: 1 }
port_mappings:
  - { front_port: 1, rear_port: 1, rear_port_position: 1 }
  - { front_port: 2, rear_port: 1, rear_port_position: 2 }
cables:
  - { id: 1, a_terminations: ["interface:1"], b_terminations: ["rearport:1"] }
"#;
    let topo = topology(yaml);
    let path = trace(&topo, &[iface(1)], &TraceConfig::default())
        .unwrap()
        .unwrap();
    assert_eq!(path.path(), hops(&[&[iface(1)], &[cable(1)], &[rp(1)]]));
    assert!(path.is_split);
    assert!(!path.is_complete);
    assert_eq!(path.split_nodes(&topo), vec![fp(1), fp(2)]);
}

/// IF1 - C1 - FP1 on position 2 of RP1, RP1 - C3 - RP2, with RP2 position 1
/// going to FP2 - IF2 and position 2 to FP3 - IF3
fn stacked_panels(profile: &str) -> String {
    format!(
        r#"
terminations:
  - {{ kind: interface, id: 1 }}
  - {{ kind: interface, id: 2 }}
  - {{ kind: interface, id: 3 }}
  - {{ kind: frontport, id: 1, device: 1 }}
  - {{ kind: rearport, id: 1, device: 1, positions: 2 }}
  - {{ kind: rearport, id: 2, device: 2, positions: 2 }}
  - {{ kind: frontport, id: 2, device: 2 }}
  - {{ kind: frontport, id: 3, device: 2 }}
port_mappings:
  - {{ front_port: 1, rear_port: 1, rear_port_position: 2 }}
  - {{ front_port: 2, rear_port: 2, rear_port_position: 1 }}
  - {{ front_port: 3, rear_port: 2, rear_port_position: 2 }}
cables:
  - {{ id: 1, a_terminations: ["interface:1"], b_terminations: ["frontport:1"] }}
  - {{ id: 3, profile: {profile}, a_terminations: ["rearport:1"], b_terminations: ["rearport:2"] }}
  - {{ id: 2, a_terminations: ["frontport:2"], b_terminations: ["interface:2"] }}
  - {{ id: 4, a_terminations: ["frontport:3"], b_terminations: ["interface:3"] }}
"#
    )
}

#[test]
fn test_single_position_profile_rejected_between_stacked_rear_ports() {
    let doc: TopologyDocument = serde_yml::from_str(&stacked_panels("single-1c1p")).unwrap();
    let err = Topology::from_document(doc).unwrap_err();
    assert!(matches!(
        err,
        TopologyError::Profile(ProfileError::PortPositionMismatch {
            expected: 1,
            actual: 2,
            ..
        })
    ));
}

#[test]
fn test_stacked_position_survives_profiled_trunk() {
    let path = trace_from(&stacked_panels("single-1c2p"), &[iface(1)]);
    assert_eq!(
        path.path(),
        hops(&[
            &[iface(1)],
            &[cable(1)],
            &[fp(1)],
            &[rp(1)],
            &[cable(3)],
            &[rp(2)],
            &[fp(3)],
            &[cable(4)],
            &[iface(3)],
        ])
    );
    assert!(path.is_complete);
    assert!(!path.is_split);
}

#[test]
fn test_nested_fan_out_onto_different_cables_splits() {
    // FP2 nests RP1 inside RP2, so two positions are stacked when RP3
    // fans position 1 out to FP3 and FP4 on separate cables
    let yaml = r#"
terminations:
  - { kind: interface, id: 1 }
  - { kind: interface, id: 3 }
  - { kind: interface, id: 4 }
  - { kind: frontport, id: 1, device: 1 }
  - { kind: rearport, id: 1, device: 1, positions: 2 }
  - { kind: frontport, id: 2, device: 2 }
  - { kind: rearport, id: 2, device: 2, positions: 2 }
  - { kind: rearport, id: 3, device: 3, positions: 2 }
  - { kind: frontport, id: 3, device: 3 }
  - { kind: frontport, id: 4, device: 3 }
port_mappings:
  - { front_port: 1, rear_port: 1, rear_port_position: 1 }
  - { front_port: 2, rear_port: 2, rear_port_position: 1 }
  - { front_port: 3, rear_port: 3, rear_port_position: 1 }
  - { front_port: 4, rear_port: 3, rear_port_position: 1 }
cables:
  - { id: 1, a_terminations: ["interface:1"], b_terminations: ["frontport:1"] }
  - { id: 2, a_terminations: ["rearport:1"], b_terminations: ["frontport:2"] }
  - { id: 3, a_terminations: ["rearport:2"], b_terminations: ["rearport:3"] }
  - { id: 4, a_terminations: ["frontport:3"], b_terminations: ["interface:3"] }
  - { id: 5, a_terminations: ["frontport:4"], b_terminations: ["interface:4"] }
"#;
    let path = trace_from(yaml, &[iface(1)]);
    assert_eq!(path.path().len(), 9);
    assert_eq!(path.path().last().unwrap(), &vec![rp(3)]);
    assert!(path.is_split);
    assert!(!path.is_complete);
}

/// RP1 position 1 fans out to FP3 and FP4; FP3 is cabled to `{fp3_peer}`
/// and FP4 has no cable
fn half_cabled_fan_out(fp3_peer: &str, extra: &str) -> String {
    format!(
        r#"
terminations:
  - {{ kind: interface, id: 1 }}
  - {{ kind: interface, id: 3 }}
  - {{ kind: frontport, id: 1, device: 1 }}
  - {{ kind: rearport, id: 1, device: 1, positions: 2 }}
  - {{ kind: rearport, id: 2, device: 2, positions: 2 }}
  - {{ kind: frontport, id: 3, device: 2 }}
  - {{ kind: frontport, id: 4, device: 2 }}
  - {{ kind: frontport, id: 5, device: 5 }}
  - {{ kind: rearport, id: 5, device: 5 }}
port_mappings:
  - {{ front_port: 1, rear_port: 1, rear_port_position: 1 }}
  - {{ front_port: 3, rear_port: 2, rear_port_position: 1 }}
  - {{ front_port: 4, rear_port: 2, rear_port_position: 1 }}
  - {{ front_port: 5, rear_port: 5 }}
cables:
  - {{ id: 1, a_terminations: ["interface:1"], b_terminations: ["frontport:1"] }}
  - {{ id: 2, a_terminations: ["rearport:1"], b_terminations: ["rearport:2"] }}
  - {{ id: 3, a_terminations: ["frontport:3"], b_terminations: ["{fp3_peer}"] }}
{extra}"#
    )
}

#[test]
fn test_uncabled_termination_in_set_splits_path() {
    let yaml = half_cabled_fan_out(
        "frontport:5",
        "  - { id: 4, a_terminations: [\"rearport:5\"], b_terminations: [\"interface:3\"] }\n",
    );
    let path = trace_from(&yaml, &[iface(1)]);
    assert_eq!(
        path.path(),
        hops(&[
            &[iface(1)],
            &[cable(1)],
            &[fp(1)],
            &[rp(1)],
            &[cable(2)],
            &[rp(2)],
            &[fp(3), fp(4)],
            &[cable(3)],
            &[fp(5)],
            &[rp(5)],
            &[cable(4)],
            &[iface(3)],
        ])
    );
    assert!(path.is_split);
    assert!(!path.is_complete);
}

#[test]
fn test_split_in_final_segment_can_still_complete() {
    let path = trace_from(&half_cabled_fan_out("interface:3", ""), &[iface(1)]);
    assert_eq!(path.path().len(), 9);
    assert_eq!(path.destinations(), &[iface(3)]);
    assert!(path.is_split);
    assert!(path.is_complete);
}

#[test]
fn test_far_terminations_of_mixed_kinds_split() {
    // FP3 and FP4 reach an interface and a rear port over separate cables
    let yaml = r#"
terminations:
  - { kind: interface, id: 1 }
  - { kind: interface, id: 3 }
  - { kind: frontport, id: 1, device: 1 }
  - { kind: rearport, id: 1, device: 1, positions: 2 }
  - { kind: rearport, id: 2, device: 2, positions: 2 }
  - { kind: frontport, id: 3, device: 2 }
  - { kind: frontport, id: 4, device: 2 }
  - { kind: rearport, id: 9, device: 9 }
port_mappings:
  - { front_port: 1, rear_port: 1, rear_port_position: 1 }
  - { front_port: 3, rear_port: 2, rear_port_position: 1 }
  - { front_port: 4, rear_port: 2, rear_port_position: 1 }
cables:
  - { id: 1, a_terminations: ["interface:1"], b_terminations: ["frontport:1"] }
  - { id: 2, a_terminations: ["rearport:1"], b_terminations: ["rearport:2"] }
  - { id: 3, a_terminations: ["frontport:3"], b_terminations: ["interface:3"] }
  - { id: 4, a_terminations: ["frontport:4"], b_terminations: ["rearport:9"] }
"#;
    let path = trace_from(yaml, &[iface(1)]);
    assert_eq!(path.path().len(), 8);
    assert_eq!(path.path().last().unwrap(), &vec![cable(3), cable(4)]);
    assert!(path.is_split);
    assert!(!path.is_complete);
}

#[test]
fn test_circuit_back_onto_traced_cable_splits() {
    // Circuit 8 starts and ends on C2
    let yaml = r#"
terminations:
  - { kind: interface, id: 1 }
  - { kind: circuittermination, id: 1, circuit: { circuit: 7, side: A } }
  - { kind: circuittermination, id: 2, circuit: { circuit: 7, side: Z } }
  - { kind: circuittermination, id: 3, circuit: { circuit: 8, side: A } }
  - { kind: circuittermination, id: 4, circuit: { circuit: 8, side: Z } }
cables:
  - { id: 1, a_terminations: ["interface:1"], b_terminations: ["circuittermination:1"] }
  - { id: 2, a_terminations: ["circuittermination:2", "circuittermination:4"], b_terminations: ["circuittermination:3"] }
"#;
    let path = trace_from(yaml, &[iface(1)]);
    assert_eq!(
        path.path(),
        hops(&[
            &[iface(1)],
            &[cable(1)],
            &[ct(1)],
            &[ct(2)],
            &[cable(2)],
            &[ct(3)],
        ])
    );
    assert!(path.is_split);
    assert!(!path.is_complete);
}

#[test]
fn test_circuit_without_far_side_is_incomplete() {
    let yaml = r#"
terminations:
  - { kind: interface, id: 1 }
  - { kind: circuittermination, id: 1, circuit: { circuit: 7, side: A } }
cables:
  - { id: 1, a_terminations: ["interface:1"], b_terminations: ["circuittermination:1"] }
"#;
    let path = trace_from(yaml, &[iface(1)]);
    assert_eq!(path.path(), hops(&[&[iface(1)], &[cable(1)], &[ct(1)]]));
    assert!(!path.is_complete);
    assert!(!path.is_split);
}

#[test]
fn test_legacy_multi_termination_cable_pairs_in_order() {
    let yaml = r#"
terminations:
  - { kind: interface, id: 1 }
  - { kind: interface, id: 2 }
  - { kind: interface, id: 3 }
  - { kind: interface, id: 4 }
cables:
  - { id: 1, a_terminations: ["interface:1", "interface:2"], b_terminations: ["interface:3", "interface:4"] }
"#;
    let path = trace_from(yaml, &[iface(1), iface(2)]);
    assert_eq!(
        path.path(),
        hops(&[&[iface(1), iface(2)], &[cable(1)], &[iface(3), iface(4)]])
    );
    assert!(path.is_complete);
}

#[test]
fn test_path_length_sums_longest_cable_per_hop() {
    let yaml = r#"
terminations:
  - { kind: interface, id: 1 }
  - { kind: interface, id: 2 }
  - { kind: frontport, id: 1, device: 1 }
  - { kind: rearport, id: 1, device: 1 }
  - { kind: rearport, id: 2, device: 2 }
  - { kind: frontport, id: 2, device: 2 }
port_mappings:
  - { front_port: 1, rear_port: 1 }
  - { front_port: 2, rear_port: 2 }
cables:
  - { id: 1, a_terminations: ["interface:1"], b_terminations: ["frontport:1"], length: 2, length_unit: m }
  - { id: 2, a_terminations: ["rearport:1"], b_terminations: ["rearport:2"], length: 1, length_unit: km }
  - { id: 3, a_terminations: ["frontport:2"], b_terminations: ["interface:2"], length: 300, length_unit: cm }
"#;
    let topo = topology(yaml);
    let path = trace(&topo, &[iface(1)], &TraceConfig::default())
        .unwrap()
        .unwrap();
    assert!(path.is_complete);
    let (length, definitive) = path.total_length(&topo);
    assert!((length - 1005.0).abs() < 1e-9);
    assert!(definitive);
}

#[test]
fn test_mixed_kinds_across_origins_rejected() {
    let topo = topology(DIRECT);
    let err = trace(
        &topo,
        &[iface(1), NodeRef::front_port(9)],
        &TraceConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, TraceError::InvalidOrigin { .. }));
}

#[test]
fn test_node_refs_round_trip_through_strings() {
    for kind in TerminationKind::all() {
        let node = NodeRef::termination(*kind, 42);
        let compiled = node.to_string();
        assert_eq!(compiled.parse::<NodeRef>().unwrap(), node);
    }
    assert_eq!("cable:7".parse::<NodeRef>().unwrap(), cable(7));
    assert_eq!(
        "wirelesslink:7".parse::<NodeRef>().unwrap(),
        NodeRef::wireless_link(7)
    );
}
