//! Link entities - cables and wireless links
//!
//! A cable joins one or more terminations on side A to one or more on side B,
//! optionally through a cable profile that maps connectors and positions
//! between the two ends. A wireless link joins exactly two interfaces.

use serde::{Deserialize, Serialize};

use crate::core::node::NodeRef;
use crate::core::profiles::CableProfile;

/// Operational status of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    /// The only status that activates the paths running over a link
    #[default]
    Connected,
    Planned,
    Decommissioning,
}

impl LinkStatus {
    pub fn is_connected(&self) -> bool {
        *self == LinkStatus::Connected
    }
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkStatus::Connected => write!(f, "connected"),
            LinkStatus::Planned => write!(f, "planned"),
            LinkStatus::Decommissioning => write!(f, "decommissioning"),
        }
    }
}

impl std::str::FromStr for LinkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "connected" => Ok(LinkStatus::Connected),
            "planned" => Ok(LinkStatus::Planned),
            "decommissioning" => Ok(LinkStatus::Decommissioning),
            _ => Err(format!(
                "Invalid link status: '{}'. Use 'connected', 'planned', or 'decommissioning'",
                s
            )),
        }
    }
}

/// One of the two ends of a cable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CableEnd {
    A,
    B,
}

impl CableEnd {
    pub fn opposite(&self) -> CableEnd {
        match self {
            CableEnd::A => CableEnd::B,
            CableEnd::B => CableEnd::A,
        }
    }
}

impl std::fmt::Display for CableEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CableEnd::A => write!(f, "A"),
            CableEnd::B => write!(f, "B"),
        }
    }
}

/// Unit a link length is recorded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    Km,
    M,
    Cm,
    Mi,
    Ft,
    In,
}

impl LengthUnit {
    /// Convert a length in this unit to metres
    pub fn to_meters(&self, length: f64) -> f64 {
        match self {
            LengthUnit::Km => length * 1000.0,
            LengthUnit::M => length,
            LengthUnit::Cm => length / 100.0,
            LengthUnit::Mi => length * 1609.344,
            LengthUnit::Ft => length * 0.3048,
            LengthUnit::In => length * 0.0254,
        }
    }
}

/// Normalised length in metres, if both a length and a unit are set
fn length_in_meters(length: Option<f64>, unit: Option<LengthUnit>) -> Option<f64> {
    match (length, unit) {
        (Some(length), Some(unit)) => Some(unit.to_meters(length)),
        _ => None,
    }
}

/// A physical cable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cable {
    pub id: u64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,

    #[serde(default)]
    pub status: LinkStatus,

    /// Connector/position scheme; absent means legacy positionless tracing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<CableProfile>,

    /// Side A terminations, in connector order
    pub a_terminations: Vec<NodeRef>,

    /// Side B terminations, in connector order
    pub b_terminations: Vec<NodeRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_unit: Option<LengthUnit>,
}

impl Cable {
    /// Create a connected, profileless cable
    pub fn new(id: u64, a_terminations: Vec<NodeRef>, b_terminations: Vec<NodeRef>) -> Self {
        Self {
            id,
            label: String::new(),
            status: LinkStatus::Connected,
            profile: None,
            a_terminations,
            b_terminations,
            length: None,
            length_unit: None,
        }
    }

    pub fn with_profile(mut self, profile: CableProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_status(mut self, status: LinkStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_length(mut self, length: f64, unit: LengthUnit) -> Self {
        self.length = Some(length);
        self.length_unit = Some(unit);
        self
    }

    pub fn node(&self) -> NodeRef {
        NodeRef::cable(self.id)
    }

    /// Terminations on the given end
    pub fn terminations(&self, end: CableEnd) -> &[NodeRef] {
        match end {
            CableEnd::A => &self.a_terminations,
            CableEnd::B => &self.b_terminations,
        }
    }

    /// Which end a termination sits on, if it is attached to this cable
    pub fn end_of(&self, termination: NodeRef) -> Option<CableEnd> {
        if self.a_terminations.contains(&termination) {
            Some(CableEnd::A)
        } else if self.b_terminations.contains(&termination) {
            Some(CableEnd::B)
        } else {
            None
        }
    }

    /// 1-based connector index of a termination on its end
    pub fn connector_of(&self, termination: NodeRef) -> Option<u16> {
        let end = self.end_of(termination)?;
        self.terminations(end)
            .iter()
            .position(|t| *t == termination)
            .map(|i| (i + 1) as u16)
    }

    /// Termination on the given connector of an end
    pub fn termination_at(&self, end: CableEnd, connector: u16) -> Option<NodeRef> {
        if connector == 0 {
            return None;
        }
        self.terminations(end).get(connector as usize - 1).copied()
    }

    /// All terminations on both ends, A side first
    pub fn all_terminations(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.a_terminations
            .iter()
            .chain(self.b_terminations.iter())
            .copied()
    }

    pub fn length_meters(&self) -> Option<f64> {
        length_in_meters(self.length, self.length_unit)
    }
}

/// A wireless link between two interfaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirelessLink {
    pub id: u64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ssid: String,

    #[serde(default)]
    pub status: LinkStatus,

    pub interface_a: u64,

    pub interface_b: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_unit: Option<LengthUnit>,
}

impl WirelessLink {
    pub fn new(id: u64, interface_a: u64, interface_b: u64) -> Self {
        Self {
            id,
            ssid: String::new(),
            status: LinkStatus::Connected,
            interface_a,
            interface_b,
            length: None,
            length_unit: None,
        }
    }

    pub fn with_status(mut self, status: LinkStatus) -> Self {
        self.status = status;
        self
    }

    pub fn node(&self) -> NodeRef {
        NodeRef::wireless_link(self.id)
    }

    pub fn interfaces(&self) -> [NodeRef; 2] {
        [
            NodeRef::interface(self.interface_a),
            NodeRef::interface(self.interface_b),
        ]
    }

    /// The interface on the other side of the link
    pub fn peer_of(&self, interface: NodeRef) -> Option<NodeRef> {
        let [a, b] = self.interfaces();
        if interface == a {
            Some(b)
        } else if interface == b {
            Some(a)
        } else {
            None
        }
    }

    pub fn length_meters(&self) -> Option<f64> {
        length_in_meters(self.length, self.length_unit)
    }
}

/// Attachment of one termination to one end of a cable
///
/// The ID is assigned in insertion order; profileless cables pair their
/// terminations by this order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CableTermination {
    pub id: u64,
    pub cable: u64,
    pub end: CableEnd,
    pub termination: NodeRef,

    /// Connector index on a profiled cable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<u16>,

    /// Positions occupied by that connector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<u16>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_conversion() {
        assert_eq!(LengthUnit::Km.to_meters(1.5), 1500.0);
        assert_eq!(LengthUnit::Cm.to_meters(250.0), 2.5);
        assert!((LengthUnit::Ft.to_meters(10.0) - 3.048).abs() < 1e-9);

        let cable = Cable::new(1, vec![], vec![]).with_length(2.0, LengthUnit::M);
        assert_eq!(cable.length_meters(), Some(2.0));

        let mut no_unit = Cable::new(2, vec![], vec![]);
        no_unit.length = Some(3.0);
        assert_eq!(no_unit.length_meters(), None);
    }

    #[test]
    fn test_connector_order() {
        let cable = Cable::new(
            1,
            vec![NodeRef::interface(1), NodeRef::interface(2)],
            vec![NodeRef::interface(3)],
        );
        assert_eq!(cable.end_of(NodeRef::interface(2)), Some(CableEnd::A));
        assert_eq!(CableEnd::A.opposite(), CableEnd::B);
        assert_eq!(cable.connector_of(NodeRef::interface(2)), Some(2));
        assert_eq!(cable.connector_of(NodeRef::interface(3)), Some(1));
        assert_eq!(cable.termination_at(CableEnd::B, 1), Some(NodeRef::interface(3)));
        assert_eq!(cable.termination_at(CableEnd::B, 2), None);
        assert_eq!(cable.termination_at(CableEnd::A, 0), None);
    }

    #[test]
    fn test_status_parse_and_default() {
        assert_eq!("Planned".parse::<LinkStatus>(), Ok(LinkStatus::Planned));
        assert!("broken".parse::<LinkStatus>().is_err());

        let cable: Cable = serde_yml::from_str(
            "id: 4\na_terminations: [\"interface:1\"]\nb_terminations: [\"interface:2\"]\n",
        )
        .unwrap();
        assert_eq!(cable.status, LinkStatus::Connected);
        assert!(cable.profile.is_none());
    }

    #[test]
    fn test_wireless_peer() {
        let link = WirelessLink::new(1, 10, 20);
        assert_eq!(link.peer_of(NodeRef::interface(10)), Some(NodeRef::interface(20)));
        assert_eq!(link.peer_of(NodeRef::interface(20)), Some(NodeRef::interface(10)));
        assert_eq!(link.peer_of(NodeRef::interface(30)), None);
    }
}
