//! Topology store
//!
//! An arena of terminations, links, cable terminations and port mappings,
//! keyed by stable IDs. The tracer reads it through [`TopologySource`]; the
//! reactor mutates it through the `upsert_*`/`remove_*` API, which keeps the
//! per-termination link back-references and the cable-termination rows in
//! step with the cables themselves.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::core::node::{NodeKind, NodeRef};
use crate::core::profiles::{CableProfile, ProfileError, ProfilePeer};
use crate::entities::link::{Cable, CableEnd, CableTermination, LinkStatus, WirelessLink};
use crate::entities::port_mapping::PortMapping;
use crate::entities::termination::{CircuitSide, IsEndpoint, Termination, TerminationKind};
use crate::yaml::{parse_yaml_file, yaml_files, YamlError};

/// Errors raised by the topology store
#[derive(Debug, Error, Diagnostic)]
pub enum TopologyError {
    #[error("Unknown node: {0}")]
    #[diagnostic(
        code(cabletrace::topology::unknown_node),
        help("reference nodes as <kind>:<id> (e.g. interface:12) or by a unique termination name")
    )]
    UnknownNode(String),

    #[error("Name '{name}' matches several terminations: {matches}")]
    #[diagnostic(
        code(cabletrace::topology::ambiguous_name),
        help("use the <kind>:<id> form instead")
    )]
    AmbiguousName { name: String, matches: String },

    #[error("{0} is no longer in the topology")]
    #[diagnostic(code(cabletrace::topology::stale))]
    Stale(NodeRef),

    #[error("Termination {0} is defined more than once")]
    #[diagnostic(code(cabletrace::topology::duplicate_termination))]
    DuplicateTermination(NodeRef),

    #[error("Link {0} is defined more than once")]
    #[diagnostic(code(cabletrace::topology::duplicate_link))]
    DuplicateLink(NodeRef),

    #[error("Invalid cable #{cable}: {reason}")]
    #[diagnostic(code(cabletrace::topology::invalid_cable))]
    InvalidCable { cable: u64, reason: String },

    #[error("Cable #{cable} joins incompatible kinds {a} and {b}")]
    #[diagnostic(
        code(cabletrace::topology::incompatible_kinds),
        help("interfaces connect to interfaces, circuit terminations and ports; power ports to outlets and feeds; console ports to console server ports")
    )]
    IncompatibleKinds {
        cable: u64,
        a: TerminationKind,
        b: TerminationKind,
    },

    #[error("{termination} cannot be attached to a link: {reason}")]
    #[diagnostic(code(cabletrace::topology::not_cableable))]
    NotCableable { termination: NodeRef, reason: String },

    #[error("{termination} is already attached to {link}")]
    #[diagnostic(code(cabletrace::topology::already_linked))]
    AlreadyLinked { termination: NodeRef, link: NodeRef },

    #[error("{termination} is still attached to {link}")]
    #[diagnostic(
        code(cabletrace::topology::still_linked),
        help("delete the cable termination before deleting the termination")
    )]
    StillLinked { termination: NodeRef, link: NodeRef },

    #[error("{termination} is not attached to cable #{cable}")]
    #[diagnostic(code(cabletrace::topology::not_attached))]
    NotAttached { cable: u64, termination: NodeRef },

    #[error("Invalid wireless link #{link}: {reason}")]
    #[diagnostic(code(cabletrace::topology::invalid_wireless_link))]
    InvalidWirelessLink { link: u64, reason: String },

    #[error("Invalid port mapping {mapping}: {reason}")]
    #[diagnostic(code(cabletrace::topology::invalid_port_mapping))]
    InvalidPortMapping { mapping: String, reason: String },

    #[error("Invalid circuit #{circuit}: {reason}")]
    #[diagnostic(code(cabletrace::topology::invalid_circuit))]
    InvalidCircuit { circuit: u64, reason: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Yaml(#[from] YamlError),
}

/// Serialized form of a topology, as read from and written to YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyDocument {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub terminations: Vec<Termination>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cables: Vec<Cable>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wireless_links: Vec<WirelessLink>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub port_mappings: Vec<PortMapping>,
}

impl TopologyDocument {
    /// Append another document's entities to this one
    pub fn merge(&mut self, other: TopologyDocument) {
        self.terminations.extend(other.terminations);
        self.cables.extend(other.cables);
        self.wireless_links.extend(other.wireless_links);
        self.port_mappings.extend(other.port_mappings);
    }
}

/// A link resolved from the store
#[derive(Debug, Clone, Copy)]
pub enum Link<'a> {
    Cable(&'a Cable),
    Wireless(&'a WirelessLink),
}

impl<'a> Link<'a> {
    pub fn node(&self) -> NodeRef {
        match self {
            Link::Cable(cable) => cable.node(),
            Link::Wireless(link) => link.node(),
        }
    }

    pub fn status(&self) -> LinkStatus {
        match self {
            Link::Cable(cable) => cable.status,
            Link::Wireless(link) => link.status,
        }
    }

    pub fn profile(&self) -> Option<CableProfile> {
        match self {
            Link::Cable(cable) => cable.profile,
            Link::Wireless(_) => None,
        }
    }

    pub fn length_meters(&self) -> Option<f64> {
        match self {
            Link::Cable(cable) => cable.length_meters(),
            Link::Wireless(link) => link.length_meters(),
        }
    }
}

/// What lies across a circuit from a circuit termination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitPeer {
    /// The opposite-side termination, continuing over its own link if it has one
    Termination(NodeRef),
    /// The opposite-side termination is bound to a provider network
    ProviderNetwork { termination: NodeRef, network: NodeRef },
    /// The opposite-side termination ends on a site, region, location or site group
    Sink { termination: NodeRef, sink: NodeRef },
}

impl CircuitPeer {
    /// The peer circuit termination itself
    pub fn termination(&self) -> NodeRef {
        match self {
            CircuitPeer::Termination(t) => *t,
            CircuitPeer::ProviderNetwork { termination, .. } => *termination,
            CircuitPeer::Sink { termination, .. } => *termination,
        }
    }
}

/// What changed when a link was saved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkChange {
    pub created: bool,
    pub terminations_modified: bool,
    pub status_changed: bool,
    pub profile_changed: bool,
    /// Terminations detached from the link by this save
    pub removed: Vec<NodeRef>,
}

/// What went away with a deleted termination
#[derive(Debug, Clone)]
pub struct RemovedTermination {
    pub termination: Termination,
    /// Port mappings that referenced the termination
    pub mappings: Vec<PortMapping>,
    /// Circuit terminations that were bound to it
    pub unbound: Vec<NodeRef>,
}

/// Read access the tracer needs
///
/// Every answer comes from one consistent view of the topology.
pub trait TopologySource {
    /// Look up a termination; a missing one is a stale reference
    fn termination(&self, node: NodeRef) -> Result<&Termination, TopologyError>;

    /// Look up a cable or wireless link
    fn link(&self, node: NodeRef) -> Result<Link<'_>, TopologyError>;

    /// Cable termination row attaching a termination to its cable
    fn cable_termination(&self, termination: NodeRef) -> Option<&CableTermination>;

    /// Terminations on the two sides of a link
    fn terminations_of_link(
        &self,
        link: NodeRef,
    ) -> Result<(Vec<NodeRef>, Vec<NodeRef>), TopologyError> {
        Ok(match self.link(link)? {
            Link::Cable(cable) => (cable.a_terminations.clone(), cable.b_terminations.clone()),
            Link::Wireless(wireless) => {
                let [a, b] = wireless.interfaces();
                (vec![a], vec![b])
            }
        })
    }

    /// Link attached to a termination
    fn link_of(&self, termination: NodeRef) -> Result<Option<NodeRef>, TopologyError> {
        Ok(self.termination(termination)?.link)
    }

    /// Peer of a termination across a cable
    ///
    /// Profiled cables defer to their profile. Profileless cables mirror the
    /// termination onto the same connector of the opposite side when both
    /// sides have as many terminations, or onto the only termination there.
    fn peer_via_cable(
        &self,
        cable: u64,
        termination: NodeRef,
        position: Option<u16>,
    ) -> Result<ProfilePeer, TopologyError> {
        let node = NodeRef::cable(cable);
        let Link::Cable(cable) = self.link(node)? else {
            return Err(TopologyError::UnknownNode(node.to_string()));
        };

        if let Some(profile) = cable.profile {
            return Ok(profile.peer_termination(cable, termination, position)?);
        }

        let end = cable.end_of(termination).ok_or(TopologyError::NotAttached {
            cable: cable.id,
            termination,
        })?;
        let local = cable.terminations(end);
        let remote = cable.terminations(end.opposite());

        let peer = if remote.len() == 1 {
            remote.first().copied()
        } else if local.len() == remote.len() {
            cable
                .connector_of(termination)
                .and_then(|c| cable.termination_at(end.opposite(), c))
        } else {
            return Ok(ProfilePeer::Ambiguous);
        };

        Ok(match peer {
            Some(termination) => ProfilePeer::Resolved {
                termination,
                position,
            },
            None => ProfilePeer::Unmapped,
        })
    }

    /// Opposite-side terminations of the cables attached to `terminations`,
    /// ordered by cable-termination ID
    fn legacy_peers(&self, terminations: &[NodeRef]) -> Result<Vec<NodeRef>, TopologyError>;

    /// Mappings of a front port, optionally restricted to some front positions
    fn mappings_for_front_port(&self, front_port: u64, positions: Option<&[u16]>)
        -> Vec<&PortMapping>;

    /// Mappings of a rear port, optionally restricted to some rear positions
    fn mappings_for_rear_port(&self, rear_port: u64, positions: Option<&[u16]>) -> Vec<&PortMapping>;

    /// Opposite-side termination of a circuit termination's circuit
    fn circuit_peer(&self, termination: NodeRef) -> Result<Option<CircuitPeer>, TopologyError>;
}

/// The in-memory topology arena
#[derive(Debug, Clone, Default)]
pub struct Topology {
    terminations: BTreeMap<NodeRef, Termination>,
    cables: BTreeMap<u64, Cable>,
    wireless_links: BTreeMap<u64, WirelessLink>,
    /// Cable-termination rows, keyed by the attached termination
    cable_terminations: BTreeMap<NodeRef, CableTermination>,
    next_ct_id: u64,
    port_mappings: Vec<PortMapping>,
}

impl Topology {
    pub fn new() -> Self {
        Self {
            next_ct_id: 1,
            ..Default::default()
        }
    }

    /// Build a topology from its document form, failing on the first invalid entity
    pub fn from_document(doc: TopologyDocument) -> Result<Self, TopologyError> {
        let (topology, errors) = Self::from_document_lenient(doc);
        match errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(topology),
        }
    }

    /// Build a topology, skipping invalid entities and collecting their errors
    pub fn from_document_lenient(doc: TopologyDocument) -> (Self, Vec<TopologyError>) {
        let mut topology = Topology::new();
        let mut errors = Vec::new();

        for termination in doc.terminations {
            let node = termination.node();
            if topology.terminations.contains_key(&node) {
                errors.push(TopologyError::DuplicateTermination(node));
                continue;
            }
            topology.terminations.insert(node, termination);
        }
        errors.extend(topology.check_circuits());

        for mapping in doc.port_mappings {
            if let Err(err) = topology.add_port_mapping(mapping) {
                errors.push(err);
            }
        }

        for cable in doc.cables {
            if topology.cables.contains_key(&cable.id) {
                errors.push(TopologyError::DuplicateLink(cable.node()));
                continue;
            }
            if let Err(err) = topology.upsert_cable(cable) {
                errors.push(err);
            }
        }

        for link in doc.wireless_links {
            if topology.wireless_links.contains_key(&link.id) {
                errors.push(TopologyError::DuplicateLink(link.node()));
                continue;
            }
            if let Err(err) = topology.upsert_wireless_link(link) {
                errors.push(err);
            }
        }

        (topology, errors)
    }

    /// Document form of this topology
    pub fn to_document(&self) -> TopologyDocument {
        TopologyDocument {
            terminations: self.terminations.values().cloned().collect(),
            cables: self.cables.values().cloned().collect(),
            wireless_links: self.wireless_links.values().cloned().collect(),
            port_mappings: self.port_mappings.clone(),
        }
    }

    /// Read a topology document from a YAML file or a directory of YAML files
    pub fn read_document(path: &Path) -> Result<TopologyDocument, TopologyError> {
        let mut doc = TopologyDocument::default();
        for file in yaml_files(path) {
            let part: TopologyDocument = parse_yaml_file(&file)?;
            doc.merge(part);
        }
        Ok(doc)
    }

    /// Load and validate a topology from a YAML file or directory
    pub fn load(path: &Path) -> Result<Self, TopologyError> {
        let doc = Self::read_document(path)?;
        let topology = Self::from_document(doc)?;
        tracing::debug!(
            path = %path.display(),
            terminations = topology.terminations.len(),
            cables = topology.cables.len(),
            wireless_links = topology.wireless_links.len(),
            "loaded topology"
        );
        Ok(topology)
    }

    /// SHA-256 over the names and contents of the topology files under `path`
    pub fn fingerprint(path: &Path) -> Result<String, TopologyError> {
        let mut hasher = Sha256::new();
        for file in yaml_files(path) {
            let content = std::fs::read(&file).map_err(YamlError::Io)?;
            let name = file.strip_prefix(path).unwrap_or(&file);
            hasher.update(name.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            hasher.update(&content);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    // ===== Queries =====

    pub fn terminations(&self) -> impl Iterator<Item = &Termination> {
        self.terminations.values()
    }

    pub fn cables(&self) -> impl Iterator<Item = &Cable> {
        self.cables.values()
    }

    pub fn wireless_links(&self) -> impl Iterator<Item = &WirelessLink> {
        self.wireless_links.values()
    }

    pub fn port_mappings(&self) -> &[PortMapping] {
        &self.port_mappings
    }

    pub fn get_termination(&self, node: NodeRef) -> Option<&Termination> {
        self.terminations.get(&node)
    }

    pub fn get_cable(&self, id: u64) -> Option<&Cable> {
        self.cables.get(&id)
    }

    pub fn get_wireless_link(&self, id: u64) -> Option<&WirelessLink> {
        self.wireless_links.get(&id)
    }

    /// Whether a node of any kind exists
    pub fn contains(&self, node: NodeRef) -> bool {
        match node.kind {
            NodeKind::Cable => self.cables.contains_key(&node.id),
            NodeKind::WirelessLink => self.wireless_links.contains_key(&node.id),
            NodeKind::Termination(_) => self.terminations.contains_key(&node),
        }
    }

    /// Connectable path endpoints that have a link attached
    pub fn endpoints(&self) -> Vec<NodeRef> {
        self.terminations
            .values()
            .filter(|t| t.is_endpoint() && !t.non_connectable && t.link.is_some())
            .map(|t| t.node())
            .collect()
    }

    /// Resolve a `<kind>:<id>` reference or a unique termination name
    pub fn resolve(&self, reference: &str) -> Result<NodeRef, TopologyError> {
        if let Ok(node) = reference.parse::<NodeRef>() {
            return if self.contains(node) {
                Ok(node)
            } else {
                Err(TopologyError::UnknownNode(reference.to_string()))
            };
        }

        let matches: Vec<&Termination> = self
            .terminations
            .values()
            .filter(|t| t.name == reference)
            .collect();

        match matches.as_slice() {
            [t] => Ok(t.node()),
            [] => Err(TopologyError::UnknownNode(reference.to_string())),
            many => Err(TopologyError::AmbiguousName {
                name: reference.to_string(),
                matches: many
                    .iter()
                    .map(|t| t.node().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    // ===== Validation =====

    fn check_cableable(&self, termination: &Termination) -> Result<(), TopologyError> {
        let reason = if !termination.kind.is_cableable() {
            Some("sink-only kinds end circuits and cannot be cabled")
        } else if termination.non_connectable {
            Some("marked non-connectable")
        } else if termination.bound_to().and_then(|b| b.termination_kind())
            == Some(TerminationKind::ProviderNetwork)
        {
            Some("bound to a provider network")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(TopologyError::NotCableable {
                termination: termination.node(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn check_attachable(&self, node: NodeRef, link: NodeRef) -> Result<&Termination, TopologyError> {
        let termination = self
            .terminations
            .get(&node)
            .ok_or_else(|| TopologyError::UnknownNode(node.to_string()))?;
        self.check_cableable(termination)?;
        match termination.link {
            Some(existing) if existing != link => Err(TopologyError::AlreadyLinked {
                termination: node,
                link: existing,
            }),
            _ => Ok(termination),
        }
    }

    /// Check a cable against the topology and its profile
    pub fn validate_cable(&self, cable: &Cable) -> Result<(), TopologyError> {
        let invalid = |reason: String| TopologyError::InvalidCable {
            cable: cable.id,
            reason,
        };

        if cable.a_terminations.is_empty() || cable.b_terminations.is_empty() {
            return Err(invalid(
                "both sides need at least one termination".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for node in cable.all_terminations() {
            if !seen.insert(node) {
                return Err(invalid(format!("{} appears more than once", node)));
            }
        }

        let mut side_kinds = [TerminationKind::Interface; 2];
        for (i, end) in [CableEnd::A, CableEnd::B].into_iter().enumerate() {
            let mut kind = None;
            for node in cable.terminations(end) {
                let termination = self.check_attachable(*node, cable.node())?;
                match kind {
                    None => kind = Some(termination.kind),
                    Some(k) if k != termination.kind => {
                        return Err(invalid(format!(
                            "side {} mixes {} and {}",
                            end, k, termination.kind
                        )));
                    }
                    Some(_) => {}
                }
            }
            if let Some(kind) = kind {
                side_kinds[i] = kind;
            }
        }

        let [a, b] = side_kinds;
        if !a.is_compatible_with(b) {
            return Err(TopologyError::IncompatibleKinds {
                cable: cable.id,
                a,
                b,
            });
        }

        if let Some(profile) = cable.profile {
            profile.validate(cable)?;
            for end in [CableEnd::A, CableEnd::B] {
                for (i, node) in cable.terminations(end).iter().enumerate() {
                    let Some(termination) = self.terminations.get(node) else {
                        continue;
                    };
                    if matches!(
                        termination.kind,
                        TerminationKind::FrontPort | TerminationKind::RearPort
                    ) {
                        profile.validate_port(end, (i + 1) as u16, *node, termination.positions)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_wireless_link(&self, link: &WirelessLink) -> Result<(), TopologyError> {
        if link.interface_a == link.interface_b {
            return Err(TopologyError::InvalidWirelessLink {
                link: link.id,
                reason: "both sides name the same interface".to_string(),
            });
        }
        for node in link.interfaces() {
            self.check_attachable(node, link.node())?;
        }
        Ok(())
    }

    /// Circuit sides must be unique and bindings must name existing sinks
    fn check_circuits(&self) -> Vec<TopologyError> {
        let mut errors = Vec::new();
        let mut sides: BTreeMap<(u64, bool), NodeRef> = BTreeMap::new();

        for termination in self.terminations.values() {
            let Some(attachment) = &termination.circuit else {
                continue;
            };
            let key = (attachment.circuit, attachment.side == CircuitSide::A);
            if let Some(other) = sides.insert(key, termination.node()) {
                errors.push(TopologyError::InvalidCircuit {
                    circuit: attachment.circuit,
                    reason: format!(
                        "{} and {} are both on side {}",
                        other,
                        termination.node(),
                        attachment.side
                    ),
                });
            }
            if let Some(sink) = attachment.bound_to {
                let is_sink = sink.termination_kind().is_some_and(|k| k.is_sink());
                if !is_sink || !self.terminations.contains_key(&sink) {
                    errors.push(TopologyError::InvalidCircuit {
                        circuit: attachment.circuit,
                        reason: format!("{} is bound to unknown sink {}", termination.node(), sink),
                    });
                }
            }
        }
        errors
    }

    // ===== Mutation =====

    fn detach(&mut self, node: NodeRef) {
        self.cable_terminations.remove(&node);
        if let Some(termination) = self.terminations.get_mut(&node) {
            termination.link = None;
        }
    }

    fn sync_cable_terminations(&mut self, cable: &Cable) {
        for end in [CableEnd::A, CableEnd::B] {
            for (i, node) in cable.terminations(end).iter().enumerate() {
                let connector = (i + 1) as u16;
                let (connector, positions) = match cable.profile {
                    Some(profile) => (Some(connector), Some(profile.positions(end, connector))),
                    None => (None, None),
                };

                match self.cable_terminations.get_mut(node) {
                    Some(ct) => {
                        ct.connector = connector;
                        ct.positions = positions;
                    }
                    None => {
                        let id = self.next_ct_id.max(1);
                        self.next_ct_id = id + 1;
                        self.cable_terminations.insert(
                            *node,
                            CableTermination {
                                id,
                                cable: cable.id,
                                end,
                                termination: *node,
                                connector,
                                positions,
                            },
                        );
                    }
                }

                if let Some(termination) = self.terminations.get_mut(node) {
                    termination.link = Some(cable.node());
                }
            }
        }
    }

    /// Create or replace a cable, returning what changed
    pub fn upsert_cable(&mut self, cable: Cable) -> Result<LinkChange, TopologyError> {
        self.validate_cable(&cable)?;

        let mut change = LinkChange::default();
        match self.cables.get(&cable.id) {
            Some(old) => {
                change.terminations_modified = old.a_terminations != cable.a_terminations
                    || old.b_terminations != cable.b_terminations;
                change.status_changed = old.status != cable.status;
                change.profile_changed = old.profile != cable.profile;
                change.removed = old
                    .all_terminations()
                    .filter(|t| cable.end_of(*t) != old.end_of(*t))
                    .collect();
            }
            None => {
                change.created = true;
                change.terminations_modified = true;
            }
        }

        for node in &change.removed {
            self.detach(*node);
        }
        self.sync_cable_terminations(&cable);
        self.cables.insert(cable.id, cable);
        Ok(change)
    }

    /// Create or replace a wireless link, returning what changed
    pub fn upsert_wireless_link(&mut self, link: WirelessLink) -> Result<LinkChange, TopologyError> {
        self.validate_wireless_link(&link)?;

        let mut change = LinkChange::default();
        match self.wireless_links.get(&link.id) {
            Some(old) => {
                let new_interfaces = link.interfaces();
                change.terminations_modified = old.interfaces() != new_interfaces;
                change.status_changed = old.status != link.status;
                change.removed = old
                    .interfaces()
                    .into_iter()
                    .filter(|i| !new_interfaces.contains(i))
                    .collect();
            }
            None => {
                change.created = true;
                change.terminations_modified = true;
            }
        }

        for node in &change.removed {
            self.detach(*node);
        }
        for node in link.interfaces() {
            if let Some(termination) = self.terminations.get_mut(&node) {
                termination.link = Some(link.node());
            }
        }
        self.wireless_links.insert(link.id, link);
        Ok(change)
    }

    /// Remove a cable or wireless link, returning the terminations it was attached to
    pub fn remove_link(&mut self, link: NodeRef) -> Result<Vec<NodeRef>, TopologyError> {
        let attached: Vec<NodeRef> = match link.kind {
            NodeKind::Cable => self
                .cables
                .remove(&link.id)
                .map(|cable| cable.all_terminations().collect()),
            NodeKind::WirelessLink => self
                .wireless_links
                .remove(&link.id)
                .map(|wireless| wireless.interfaces().to_vec()),
            NodeKind::Termination(_) => None,
        }
        .ok_or_else(|| TopologyError::UnknownNode(link.to_string()))?;

        for node in &attached {
            self.detach(*node);
        }
        Ok(attached)
    }

    /// Detach one termination from a cable
    ///
    /// Connectors on a profiled cable are renumbered to follow the new order.
    pub fn remove_cable_termination(
        &mut self,
        cable: u64,
        termination: NodeRef,
    ) -> Result<CableTermination, TopologyError> {
        let not_attached = TopologyError::NotAttached { cable, termination };
        let ct = match self.cable_terminations.get(&termination) {
            Some(ct) if ct.cable == cable => ct.clone(),
            _ => return Err(not_attached),
        };
        let mut updated = self.cables.get(&cable).cloned().ok_or(not_attached)?;

        match ct.end {
            CableEnd::A => updated.a_terminations.retain(|t| *t != termination),
            CableEnd::B => updated.b_terminations.retain(|t| *t != termination),
        }
        self.detach(termination);
        self.sync_cable_terminations(&updated);
        self.cables.insert(cable, updated);
        Ok(ct)
    }

    /// Add a port mapping; returns false if an identical mapping already exists
    pub fn add_port_mapping(&mut self, mapping: PortMapping) -> Result<bool, TopologyError> {
        let label = format!(
            "{}:{} -> {}:{}",
            mapping.front_node(),
            mapping.front_port_position,
            mapping.rear_node(),
            mapping.rear_port_position
        );
        let invalid = |reason: String| TopologyError::InvalidPortMapping {
            mapping: label.clone(),
            reason,
        };

        let front = self
            .terminations
            .get(&mapping.front_node())
            .ok_or_else(|| invalid(format!("unknown front port {}", mapping.front_node())))?;
        let rear = self
            .terminations
            .get(&mapping.rear_node())
            .ok_or_else(|| invalid(format!("unknown rear port {}", mapping.rear_node())))?;

        if !(1..=front.positions).contains(&mapping.front_port_position) {
            return Err(invalid(format!(
                "front port has {} position(s)",
                front.positions
            )));
        }
        if !(1..=rear.positions).contains(&mapping.rear_port_position) {
            return Err(invalid(format!(
                "rear port has {} position(s)",
                rear.positions
            )));
        }
        if let (Some(f), Some(r)) = (front.device, rear.device) {
            if f != r {
                return Err(invalid("ports belong to different devices".to_string()));
            }
        }

        let same = |m: &PortMapping| {
            m.front_port == mapping.front_port
                && m.front_port_position == mapping.front_port_position
        };
        match self.port_mappings.iter().find(|m| same(m)) {
            Some(existing)
                if existing.rear_port == mapping.rear_port
                    && existing.rear_port_position == mapping.rear_port_position =>
            {
                Ok(false)
            }
            Some(_) => Err(invalid("front position is already mapped".to_string())),
            None => {
                self.port_mappings.push(mapping);
                Ok(true)
            }
        }
    }

    /// Remove a port mapping; returns false if it did not exist
    pub fn remove_port_mapping(&mut self, mapping: &PortMapping) -> bool {
        let before = self.port_mappings.len();
        self.port_mappings.retain(|m| {
            !(m.front_port == mapping.front_port
                && m.front_port_position == mapping.front_port_position
                && m.rear_port == mapping.rear_port
                && m.rear_port_position == mapping.rear_port_position)
        });
        self.port_mappings.len() != before
    }

    /// Create or replace a termination, keeping its link; returns true if created
    pub fn upsert_termination(&mut self, mut termination: Termination) -> Result<bool, TopologyError> {
        let node = termination.node();
        let existing = self.terminations.get(&node);
        termination.link = existing.and_then(|t| t.link);
        if let Some(link) = termination.link {
            self.check_cableable(&termination)?;
            let cable = self.cables.get(&link.id).filter(|c| c.node() == link);
            if let Some((cable, profile)) = cable.and_then(|c| c.profile.map(|p| (c, p))) {
                let is_port = matches!(
                    termination.kind,
                    TerminationKind::FrontPort | TerminationKind::RearPort
                );
                if let Some((end, connector)) = cable.end_of(node).zip(cable.connector_of(node)) {
                    if is_port {
                        profile.validate_port(end, connector, node, termination.positions)?;
                    }
                }
            }
        }

        if let Some(attachment) = &termination.circuit {
            let clash = self.terminations.values().find(|t| {
                t.node() != node
                    && t.circuit.as_ref().is_some_and(|c| {
                        c.circuit == attachment.circuit && c.side == attachment.side
                    })
            });
            if let Some(other) = clash {
                return Err(TopologyError::InvalidCircuit {
                    circuit: attachment.circuit,
                    reason: format!("{} is already on side {}", other.node(), attachment.side),
                });
            }
        }

        let created = existing.is_none();
        self.terminations.insert(node, termination);
        Ok(created)
    }

    /// Remove an unattached termination along with its port mappings and circuit bindings
    pub fn remove_termination(&mut self, node: NodeRef) -> Result<RemovedTermination, TopologyError> {
        let existing = self
            .terminations
            .get(&node)
            .ok_or_else(|| TopologyError::UnknownNode(node.to_string()))?;
        if let Some(link) = existing.link {
            return Err(TopologyError::StillLinked {
                termination: node,
                link,
            });
        }

        let (mappings, kept): (Vec<PortMapping>, Vec<PortMapping>) = self
            .port_mappings
            .drain(..)
            .partition(|m| m.front_node() == node || m.rear_node() == node);
        self.port_mappings = kept;

        let mut unbound = Vec::new();
        for termination in self.terminations.values_mut() {
            if let Some(attachment) = termination.circuit.as_mut() {
                if attachment.bound_to == Some(node) {
                    attachment.bound_to = None;
                    unbound.push(termination.node());
                }
            }
        }

        let termination = self
            .terminations
            .remove(&node)
            .ok_or_else(|| TopologyError::UnknownNode(node.to_string()))?;
        Ok(RemovedTermination {
            termination,
            mappings,
            unbound,
        })
    }
}

impl TopologySource for Topology {
    fn termination(&self, node: NodeRef) -> Result<&Termination, TopologyError> {
        self.terminations
            .get(&node)
            .ok_or(TopologyError::Stale(node))
    }

    fn link(&self, node: NodeRef) -> Result<Link<'_>, TopologyError> {
        let link = match node.kind {
            NodeKind::Cable => self.cables.get(&node.id).map(Link::Cable),
            NodeKind::WirelessLink => self.wireless_links.get(&node.id).map(Link::Wireless),
            NodeKind::Termination(_) => None,
        };
        link.ok_or(TopologyError::Stale(node))
    }

    fn cable_termination(&self, termination: NodeRef) -> Option<&CableTermination> {
        self.cable_terminations.get(&termination)
    }

    fn legacy_peers(&self, terminations: &[NodeRef]) -> Result<Vec<NodeRef>, TopologyError> {
        let mut peers: Vec<&CableTermination> = Vec::new();

        for node in terminations {
            let Some(local) = self.cable_terminations.get(node) else {
                continue;
            };
            let cable = self
                .cables
                .get(&local.cable)
                .ok_or(TopologyError::Stale(NodeRef::cable(local.cable)))?;

            for remote in cable.terminations(local.end.opposite()) {
                let ct = self
                    .cable_terminations
                    .get(remote)
                    .ok_or(TopologyError::Stale(*remote))?;
                if !peers.iter().any(|p| p.id == ct.id) {
                    peers.push(ct);
                }
            }
        }

        peers.sort_by_key(|ct| ct.id);
        Ok(peers.into_iter().map(|ct| ct.termination).collect())
    }

    fn mappings_for_front_port(
        &self,
        front_port: u64,
        positions: Option<&[u16]>,
    ) -> Vec<&PortMapping> {
        self.port_mappings
            .iter()
            .filter(|m| m.front_port == front_port)
            .filter(|m| positions.map_or(true, |ps| ps.contains(&m.front_port_position)))
            .collect()
    }

    fn mappings_for_rear_port(&self, rear_port: u64, positions: Option<&[u16]>) -> Vec<&PortMapping> {
        self.port_mappings
            .iter()
            .filter(|m| m.rear_port == rear_port)
            .filter(|m| positions.map_or(true, |ps| ps.contains(&m.rear_port_position)))
            .collect()
    }

    fn circuit_peer(&self, termination: NodeRef) -> Result<Option<CircuitPeer>, TopologyError> {
        let Some(attachment) = self.termination(termination)?.circuit.as_ref() else {
            return Ok(None);
        };

        let peer = self.terminations.values().find(|t| {
            t.circuit.as_ref().is_some_and(|c| {
                c.circuit == attachment.circuit && c.side == attachment.side.opposite()
            })
        });

        Ok(peer.map(|peer| match peer.bound_to() {
            Some(network) if network.termination_kind() == Some(TerminationKind::ProviderNetwork) => {
                CircuitPeer::ProviderNetwork {
                    termination: peer.node(),
                    network,
                }
            }
            Some(sink) if peer.link.is_none() => CircuitPeer::Sink {
                termination: peer.node(),
                sink,
            },
            _ => CircuitPeer::Termination(peer.node()),
        }))
    }
}
