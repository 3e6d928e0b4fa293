//! Termination entity - any object a link can attach to
//!
//! Terminations are device ports, circuit terminations, power feeds and the
//! geographic/provider sinks a circuit may end on. Capability traits expose
//! the few polymorphic questions the tracer asks of them.

use serde::{Deserialize, Serialize};

use crate::core::node::NodeRef;

/// The closed set of termination kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminationKind {
    ConsolePort,
    ConsoleServerPort,
    PowerPort,
    PowerOutlet,
    PowerFeed,
    Interface,
    FrontPort,
    RearPort,
    CircuitTermination,
    ProviderNetwork,
    Site,
    Region,
    Location,
    SiteGroup,
}

impl TerminationKind {
    /// All termination kinds, in declaration order
    pub fn all() -> &'static [TerminationKind] {
        &[
            TerminationKind::ConsolePort,
            TerminationKind::ConsoleServerPort,
            TerminationKind::PowerPort,
            TerminationKind::PowerOutlet,
            TerminationKind::PowerFeed,
            TerminationKind::Interface,
            TerminationKind::FrontPort,
            TerminationKind::RearPort,
            TerminationKind::CircuitTermination,
            TerminationKind::ProviderNetwork,
            TerminationKind::Site,
            TerminationKind::Region,
            TerminationKind::Location,
            TerminationKind::SiteGroup,
        ]
    }

    /// Stable lowercase name, used in compiled node references
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationKind::ConsolePort => "consoleport",
            TerminationKind::ConsoleServerPort => "consoleserverport",
            TerminationKind::PowerPort => "powerport",
            TerminationKind::PowerOutlet => "poweroutlet",
            TerminationKind::PowerFeed => "powerfeed",
            TerminationKind::Interface => "interface",
            TerminationKind::FrontPort => "frontport",
            TerminationKind::RearPort => "rearport",
            TerminationKind::CircuitTermination => "circuittermination",
            TerminationKind::ProviderNetwork => "providernetwork",
            TerminationKind::Site => "site",
            TerminationKind::Region => "region",
            TerminationKind::Location => "location",
            TerminationKind::SiteGroup => "sitegroup",
        }
    }

    /// Sink-only kinds end a path via a circuit but never originate or transit one
    pub fn is_sink(&self) -> bool {
        matches!(
            self,
            TerminationKind::ProviderNetwork
                | TerminationKind::Site
                | TerminationKind::Region
                | TerminationKind::Location
                | TerminationKind::SiteGroup
        )
    }

    /// Kinds that may be attached to a cable at all
    pub fn is_cableable(&self) -> bool {
        !self.is_sink()
    }

    /// Whether a cable may join this kind on one side to `other` on the other side
    pub fn is_compatible_with(&self, other: TerminationKind) -> bool {
        use TerminationKind::*;

        let peers: &[TerminationKind] = match self {
            CircuitTermination => &[Interface, FrontPort, RearPort, CircuitTermination],
            ConsolePort => &[ConsoleServerPort, FrontPort, RearPort],
            ConsoleServerPort => &[ConsolePort, FrontPort, RearPort],
            Interface => &[Interface, CircuitTermination, FrontPort, RearPort],
            FrontPort | RearPort => &[
                ConsolePort,
                ConsoleServerPort,
                Interface,
                FrontPort,
                RearPort,
                CircuitTermination,
            ],
            PowerFeed => &[PowerPort],
            PowerOutlet => &[PowerPort],
            PowerPort => &[PowerOutlet, PowerFeed],
            ProviderNetwork | Site | Region | Location | SiteGroup => &[],
        };
        peers.contains(&other)
    }
}

impl std::fmt::Display for TerminationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TerminationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TerminationKind::all()
            .iter()
            .find(|kind| kind.as_str() == s.to_lowercase())
            .copied()
            .ok_or_else(|| format!("Unknown termination kind: {}", s))
    }
}

/// A path endpoint is a termination at which a trace may start or stop
pub trait IsEndpoint {
    fn is_endpoint(&self) -> bool;
}

/// A pass-through termination forwards signal mid-span
pub trait IsPassthrough {
    fn is_passthrough(&self) -> bool;
}

/// Access to the link (cable or wireless link) attached to a termination
pub trait HasLink {
    fn link(&self) -> Option<NodeRef>;
}

impl IsEndpoint for TerminationKind {
    fn is_endpoint(&self) -> bool {
        matches!(
            self,
            TerminationKind::Interface
                | TerminationKind::ConsolePort
                | TerminationKind::ConsoleServerPort
                | TerminationKind::PowerPort
                | TerminationKind::PowerOutlet
                | TerminationKind::PowerFeed
                | TerminationKind::CircuitTermination
        )
    }
}

impl IsPassthrough for TerminationKind {
    fn is_passthrough(&self) -> bool {
        matches!(
            self,
            TerminationKind::FrontPort
                | TerminationKind::RearPort
                | TerminationKind::CircuitTermination
        )
    }
}

/// Side of a circuit a termination sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitSide {
    A,
    Z,
}

impl CircuitSide {
    pub fn opposite(&self) -> CircuitSide {
        match self {
            CircuitSide::A => CircuitSide::Z,
            CircuitSide::Z => CircuitSide::A,
        }
    }
}

impl std::fmt::Display for CircuitSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitSide::A => write!(f, "A"),
            CircuitSide::Z => write!(f, "Z"),
        }
    }
}

/// Circuit membership of a circuit termination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitAttachment {
    /// Circuit this termination belongs to
    pub circuit: u64,

    /// A or Z side; the peer is the termination with the opposite side
    pub side: CircuitSide,

    /// Provider network or geographic sink this termination ends on, instead of a cable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_to: Option<NodeRef>,
}

fn default_positions() -> u16 {
    1
}

fn is_single_position(positions: &u16) -> bool {
    *positions == 1
}

/// A termination object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Termination {
    pub kind: TerminationKind,

    pub id: u64,

    /// Human-readable name (e.g. "eth0", "Front 3")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Parent device; mid-span terminations of one hop must share it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<u64>,

    /// Number of positions carried by a front or rear port
    #[serde(default = "default_positions", skip_serializing_if = "is_single_position")]
    pub positions: u16,

    /// Virtual, LAG and bridge interfaces cannot be cabled or traced
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub non_connectable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit: Option<CircuitAttachment>,

    /// Attached link; maintained by the topology, never read from files
    #[serde(skip)]
    pub link: Option<NodeRef>,
}

impl Termination {
    /// Create a bare termination with default attributes
    pub fn new(kind: TerminationKind, id: u64) -> Self {
        Self {
            kind,
            id,
            name: String::new(),
            device: None,
            positions: 1,
            non_connectable: false,
            circuit: None,
            link: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_device(mut self, device: u64) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_positions(mut self, positions: u16) -> Self {
        self.positions = positions;
        self
    }

    pub fn non_connectable(mut self) -> Self {
        self.non_connectable = true;
        self
    }

    pub fn with_circuit(mut self, circuit: u64, side: CircuitSide, bound_to: Option<NodeRef>) -> Self {
        self.circuit = Some(CircuitAttachment {
            circuit,
            side,
            bound_to,
        });
        self
    }

    /// Node reference of this termination
    pub fn node(&self) -> NodeRef {
        NodeRef::termination(self.kind, self.id)
    }

    /// Display label: the name if set, otherwise the compiled node reference
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.node().to_string()
        } else {
            self.name.clone()
        }
    }

    /// Provider network or sink this circuit termination is bound to, if any
    pub fn bound_to(&self) -> Option<NodeRef> {
        self.circuit.as_ref().and_then(|c| c.bound_to)
    }
}

impl IsEndpoint for Termination {
    fn is_endpoint(&self) -> bool {
        self.kind.is_endpoint()
    }
}

impl IsPassthrough for Termination {
    fn is_passthrough(&self) -> bool {
        self.kind.is_passthrough()
    }
}

impl HasLink for Termination {
    fn link(&self) -> Option<NodeRef> {
        self.link
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip_through_str() {
        for kind in TerminationKind::all() {
            let parsed: TerminationKind = kind.as_str().parse().unwrap();
            assert_eq!(*kind, parsed);
        }
        assert!("patchpanel".parse::<TerminationKind>().is_err());
    }

    #[test]
    fn test_capabilities() {
        assert!(TerminationKind::Interface.is_endpoint());
        assert!(!TerminationKind::Interface.is_passthrough());
        assert!(TerminationKind::CircuitTermination.is_endpoint());
        assert!(TerminationKind::CircuitTermination.is_passthrough());
        assert!(TerminationKind::RearPort.is_passthrough());
        assert!(!TerminationKind::RearPort.is_endpoint());
        assert!(TerminationKind::Site.is_sink());
        assert!(!TerminationKind::Site.is_cableable());
    }

    #[test]
    fn test_compatibility_table_is_symmetric() {
        for a in TerminationKind::all() {
            for b in TerminationKind::all() {
                assert_eq!(
                    a.is_compatible_with(*b),
                    b.is_compatible_with(*a),
                    "{} <-> {}",
                    a,
                    b
                );
            }
        }
        assert!(TerminationKind::PowerPort.is_compatible_with(TerminationKind::PowerFeed));
        assert!(!TerminationKind::Interface.is_compatible_with(TerminationKind::ConsolePort));
    }

    #[test]
    fn test_termination_yaml_defaults() {
        let t: Termination = serde_yml::from_str("kind: frontport\nid: 7\n").unwrap();
        assert_eq!(t.kind, TerminationKind::FrontPort);
        assert_eq!(t.positions, 1);
        assert!(!t.non_connectable);
        assert!(t.link.is_none());
        assert_eq!(t.label(), "frontport:7");
    }
}
