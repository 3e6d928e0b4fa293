//! Path tracer
//!
//! `trace()` walks the topology outward from a set of origin terminations and
//! returns the resulting [`CablePath`], or `None` when the origins have no
//! link at all. Each segment records the local terminations, the links they
//! attach to, and the far-end terminations, then follows pass-through ports
//! and circuits to the next segment.
//!
//! Positions are carried across multiplexing hops on a small stack: rear
//! ports and multi-position profile connectors consume the top entry, and
//! push an entry for the next multi-position port they lead to.

use std::collections::HashSet;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::node::NodeRef;
use crate::core::path::CablePath;
use crate::core::profiles::{ProfileError, ProfilePeer};
use crate::core::topology::{CircuitPeer, Link, TopologyError, TopologySource};
use crate::entities::port_mapping::PortMapping;
use crate::entities::termination::{IsEndpoint, Termination, TerminationKind};

/// Default hop budget
pub const DEFAULT_MAX_HOPS: usize = 1024;

/// Tracer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Longest path, in hops, before giving up with `PathTooLong`
    pub max_hops: usize,

    /// Whether a circuit ending on a site, region, location or site group counts as complete
    pub sink_paths_complete: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            sink_paths_complete: false,
        }
    }
}

/// Errors surfaced by `trace()`
#[derive(Debug, Error, Diagnostic)]
pub enum TraceError {
    #[error("Invalid origin: {reason}")]
    #[diagnostic(
        code(cabletrace::trace::invalid_origin),
        help("origins must be path endpoints of one kind, attached to the same link")
    )]
    InvalidOrigin { reason: String },

    #[error("{0} is non-connectable and cannot be traced")]
    #[diagnostic(code(cabletrace::trace::non_connectable_origin))]
    NonConnectableOrigin(NodeRef),

    #[error("Unsupported topology: {reason}")]
    #[diagnostic(code(cabletrace::trace::unsupported_topology))]
    UnsupportedTopology { reason: String },

    #[error("Path exceeds {max_hops} hops")]
    #[diagnostic(
        code(cabletrace::trace::path_too_long),
        help("raise trace.max_hops in the configuration if the topology is really this long")
    )]
    PathTooLong { max_hops: usize },

    /// Only used inside the tracer; a trace that meets one is truncated
    #[error("{0} disappeared during the trace")]
    #[diagnostic(code(cabletrace::trace::stale_reference))]
    StaleReference(NodeRef),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Topology(TopologyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Profile(#[from] ProfileError),
}

impl From<TopologyError> for TraceError {
    fn from(err: TopologyError) -> Self {
        match err {
            TopologyError::Stale(node) => TraceError::StaleReference(node),
            other => TraceError::Topology(other),
        }
    }
}

fn unsupported(reason: impl Into<String>) -> TraceError {
    let reason = reason.into();
    tracing::warn!(%reason, "unsupported topology");
    TraceError::UnsupportedTopology { reason }
}

fn join(nodes: &[NodeRef]) -> String {
    nodes
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Append without duplicates, keeping first-seen order
fn push_unique(list: &mut Vec<NodeRef>, node: NodeRef) {
    if !list.contains(&node) {
        list.push(node);
    }
}

/// Trace a cable path from a set of origin terminations
///
/// Returns `Ok(None)` when `origins` is empty or the origins have no link.
pub fn trace<T: TopologySource + ?Sized>(
    topology: &T,
    origins: &[NodeRef],
    config: &TraceConfig,
) -> Result<Option<CablePath>, TraceError> {
    if origins.is_empty() {
        return Ok(None);
    }

    let mut unique = Vec::with_capacity(origins.len());
    for node in origins {
        push_unique(&mut unique, *node);
    }
    let origins = unique;
    check_origins(topology, &origins)?;

    tracing::debug!(origins = %join(&origins), "tracing cable path");

    let mut tracer = Tracer::new(topology, config);
    let mut visited: HashSet<(Vec<NodeRef>, Vec<Vec<u16>>)> = HashSet::new();
    let mut terminations = origins;

    loop {
        if !visited.insert((terminations.clone(), tracer.position_stack.clone())) {
            return Err(unsupported(format!(
                "loop detected at {}",
                join(&terminations)
            )));
        }

        match tracer.segment(terminations) {
            Ok(Step::Continue(next)) => terminations = next,
            Ok(Step::Stop) => break,
            Ok(Step::NoPath) => return Ok(None),
            Err(TraceError::StaleReference(node)) => {
                tracing::warn!(%node, "stale reference; truncating path");
                tracer.is_complete = false;
                break;
            }
            Err(err) => return Err(err),
        }

        if tracer.path.len() > config.max_hops {
            return Err(TraceError::PathTooLong {
                max_hops: config.max_hops,
            });
        }
    }

    if tracer.path.len() > config.max_hops {
        return Err(TraceError::PathTooLong {
            max_hops: config.max_hops,
        });
    }

    Ok(Some(tracer.finish()))
}

fn check_origins<T: TopologySource + ?Sized>(
    topology: &T,
    origins: &[NodeRef],
) -> Result<(), TraceError> {
    let lookup = |node: NodeRef| {
        topology
            .termination(node)
            .map_err(|_| TraceError::InvalidOrigin {
                reason: format!("{} does not exist", node),
            })
    };

    let first = lookup(origins[0])?;
    for node in origins {
        let termination = lookup(*node)?;
        if termination.non_connectable {
            return Err(TraceError::NonConnectableOrigin(*node));
        }
        if !termination.is_endpoint() {
            return Err(TraceError::InvalidOrigin {
                reason: format!("{} is not a path endpoint", node),
            });
        }
        if termination.kind != first.kind {
            return Err(TraceError::InvalidOrigin {
                reason: format!("origins mix {} and {}", first.kind, termination.kind),
            });
        }
        if termination.link != first.link {
            return Err(TraceError::InvalidOrigin {
                reason: "origins are attached to different links".to_string(),
            });
        }
    }
    Ok(())
}

enum Step {
    Continue(Vec<NodeRef>),
    Stop,
    NoPath,
}

struct Tracer<'a, T: ?Sized> {
    topology: &'a T,
    config: &'a TraceConfig,
    path: Vec<Vec<NodeRef>>,
    position_stack: Vec<Vec<u16>>,
    links_seen: Vec<NodeRef>,
    is_complete: bool,
    is_active: bool,
    is_split: bool,
    split_segment: Option<usize>,
    segment: usize,
}

impl<'a, T: TopologySource + ?Sized> Tracer<'a, T> {
    fn new(topology: &'a T, config: &'a TraceConfig) -> Self {
        Self {
            topology,
            config,
            path: Vec::new(),
            position_stack: Vec::new(),
            links_seen: Vec::new(),
            is_complete: false,
            is_active: true,
            is_split: false,
            split_segment: None,
            segment: 0,
        }
    }

    fn finish(self) -> CablePath {
        CablePath::new(self.path, self.is_complete, self.is_active, self.is_split)
    }

    fn termination(&self, node: NodeRef) -> Result<&'a Termination, TraceError> {
        let topology: &'a T = self.topology;
        Ok(topology.termination(node)?)
    }

    fn link(&self, node: NodeRef) -> Result<Link<'a>, TraceError> {
        let topology: &'a T = self.topology;
        Ok(topology.link(node)?)
    }

    fn mark_split(&mut self) {
        self.is_split = true;
        self.split_segment.get_or_insert(self.segment);
    }

    /// Reached a valid end; a split in an earlier segment still leaves the path incomplete
    fn complete_here(&mut self) {
        self.is_complete = self.split_segment.map_or(true, |s| s == self.segment);
    }

    fn segment(&mut self, terminations: Vec<NodeRef>) -> Result<Step, TraceError> {
        self.segment += 1;
        let segment = self.segment;

        tracing::debug!(
            segment,
            position_stack = ?self.position_stack,
            local = %join(&terminations),
            "path segment"
        );

        let locals: Vec<&'a Termination> = terminations
            .iter()
            .map(|n| self.termination(*n))
            .collect::<Result<_, _>>()?;
        let Some(first) = locals.first() else {
            return Ok(Step::Stop);
        };

        if locals.iter().any(|t| t.kind != first.kind) {
            return Err(unsupported(format!(
                "mid-span terminations mix kinds: {}",
                join(&terminations)
            )));
        }
        if !first.is_endpoint() && locals.iter().any(|t| t.device != first.device) {
            return Err(unsupported(format!(
                "mid-span terminations belong to different devices: {}",
                join(&terminations)
            )));
        }

        // A rear port fanning out to front ports on different links
        let mut attached: Vec<Option<NodeRef>> = Vec::new();
        for t in &locals {
            if !attached.contains(&t.link) {
                attached.push(t.link);
            }
        }
        if attached.len() > 1
            && self
                .position_stack
                .last()
                .is_some_and(|top| top.len() != terminations.len())
        {
            tracing::warn!(segment, local = %join(&terminations), "terminations diverge onto different links; path is split");
            self.mark_split();
            return Ok(Step::Stop);
        }

        self.path.push(terminations.clone());

        let links: Vec<NodeRef> = attached.iter().flatten().copied().collect();
        tracing::debug!(segment, links = %join(&links), "links");
        if links.is_empty() {
            return Ok(if self.path.len() == 1 {
                Step::NoPath
            } else {
                Step::Stop
            });
        }

        let resolved: Vec<Link<'a>> = links
            .iter()
            .map(|l| self.link(*l))
            .collect::<Result<_, _>>()?;
        let is_cable = matches!(resolved[0], Link::Cable(_));
        if resolved
            .iter()
            .any(|l| matches!(l, Link::Cable(_)) != is_cable)
        {
            return Err(unsupported(format!(
                "cable and wireless link in one hop: {}",
                join(&links)
            )));
        }
        let profile = resolved[0].profile();
        if resolved.iter().any(|l| l.profile() != profile) {
            return Err(unsupported(format!(
                "cables with different profiles in one hop: {}",
                join(&links)
            )));
        }

        if locals.iter().any(|t| t.link.is_none()) {
            self.is_complete = false;
            self.mark_split();
        }

        self.path.push(links.clone());
        for link in &links {
            push_unique(&mut self.links_seen, *link);
        }
        if resolved.iter().any(|l| !l.status().is_connected()) {
            self.is_active = false;
        }

        let remote = if !is_cable {
            self.wireless_peers(&locals)?
        } else if profile.is_some() {
            match self.profile_peers(&locals)? {
                Some(peers) => peers,
                None => return Ok(Step::Stop),
            }
        } else {
            self.topology.legacy_peers(&terminations)?
        };

        tracing::debug!(segment, remote = %join(&remote), "remote terminations");
        let Some(&head) = remote.first() else {
            return Ok(Step::Stop);
        };

        if remote.iter().any(|n| n.kind != head.kind) {
            tracing::warn!(segment, remote = %join(&remote), "remote terminations differ in kind; path is split");
            self.is_complete = false;
            self.mark_split();
            return Ok(Step::Stop);
        }

        self.path.push(remote.clone());

        match head.termination_kind() {
            Some(TerminationKind::FrontPort) => self.follow_ports(&remote, PortSide::Front),
            Some(TerminationKind::RearPort) => self.follow_ports(&remote, PortSide::Rear),
            Some(TerminationKind::CircuitTermination) => self.follow_circuit(&remote),
            _ => {
                self.complete_here();
                Ok(Step::Stop)
            }
        }
    }

    fn wireless_peers(&self, locals: &[&'a Termination]) -> Result<Vec<NodeRef>, TraceError> {
        let mut peers = Vec::new();
        for t in locals {
            let Some(link) = t.link else {
                continue;
            };
            if let Link::Wireless(wireless) = self.link(link)? {
                if let Some(peer) = wireless.peer_of(t.node()) {
                    push_unique(&mut peers, peer);
                }
            }
        }
        Ok(peers)
    }

    /// Peers across profiled cables; `None` stops the trace
    fn profile_peers(&mut self, locals: &[&'a Termination]) -> Result<Option<Vec<NodeRef>>, TraceError> {
        let mut entry: Option<Vec<u16>> = None;
        let mut popped = false;
        let mut peers = Vec::new();
        let mut produced: Vec<u16> = Vec::new();

        for t in locals {
            let node = t.node();
            let Some(link) = t.link else {
                continue;
            };
            let Link::Cable(cable) = self.link(link)? else {
                continue;
            };
            let Some(profile) = cable.profile else {
                continue;
            };
            let (end, connector) = cable
                .end_of(node)
                .zip(cable.connector_of(node))
                .ok_or(TraceError::StaleReference(link))?;

            let connector_positions = profile.positions(end, connector);
            let candidates: Vec<Option<u16>> = if connector_positions.len() > 1 {
                if !popped {
                    entry = self.position_stack.pop();
                    popped = true;
                }
                match &entry {
                    Some(positions) => positions
                        .iter()
                        .filter(|p| connector_positions.contains(p))
                        .map(|p| Some(*p))
                        .collect(),
                    None => vec![None],
                }
            } else {
                vec![None]
            };

            if candidates.is_empty() {
                tracing::warn!(%node, ?entry, "no stacked position fits connector; path is split");
                self.mark_split();
                return Ok(None);
            }

            for position in candidates {
                match profile.peer_termination(cable, node, position)? {
                    ProfilePeer::Resolved {
                        termination,
                        position,
                    } => {
                        push_unique(&mut peers, termination);
                        // A single-position far connector carries no position of its own
                        let far_positions = cable
                            .end_of(termination)
                            .zip(cable.connector_of(termination))
                            .map_or(0, |(end, connector)| profile.positions(end, connector).len());
                        if let Some(p) = position.filter(|_| far_positions > 1) {
                            if !produced.contains(&p) {
                                produced.push(p);
                            }
                        }
                    }
                    ProfilePeer::Unterminated { connector } => {
                        tracing::debug!(%node, connector, "profile maps to an unterminated connector");
                        self.is_complete = false;
                        return Ok(None);
                    }
                    ProfilePeer::Ambiguous | ProfilePeer::Unmapped => {
                        tracing::warn!(%node, ?position, profile = %profile, "profile cannot resolve a single peer; path is split");
                        self.mark_split();
                        return Ok(None);
                    }
                }
            }
        }

        if !produced.is_empty() {
            let multi_position = peers
                .iter()
                .filter_map(|p| self.topology.termination(*p).ok())
                .any(|t| t.positions > 1);
            if multi_position {
                self.position_stack.push(produced);
            }
        }
        Ok(Some(peers))
    }

    fn follow_ports(&mut self, remote: &[NodeRef], side: PortSide) -> Result<Step, TraceError> {
        let topology: &'a T = self.topology;
        let head = self.termination(remote[0])?;

        let positions = if head.positions > 1 {
            match self.position_stack.pop() {
                Some(positions) => Some(positions),
                None => {
                    tracing::warn!(
                        port = %head.node(),
                        "multi-position port with an empty position stack; path is split"
                    );
                    self.mark_split();
                    return Ok(Step::Stop);
                }
            }
        } else {
            None
        };

        let mut mappings: Vec<&'a PortMapping> = Vec::new();
        for port in remote {
            let found = match side {
                PortSide::Front => topology.mappings_for_front_port(port.id, positions.as_deref()),
                PortSide::Rear => topology.mappings_for_rear_port(port.id, positions.as_deref()),
            };
            mappings.extend(found);
        }
        if mappings.is_empty() {
            return Ok(Step::Stop);
        }

        let mut next = Vec::new();
        for m in &mappings {
            let far = match side {
                PortSide::Front => m.rear_node(),
                PortSide::Rear => m.front_node(),
            };
            push_unique(&mut next, far);
        }

        let mut multi_position = false;
        for node in &next {
            if self.termination(*node)?.positions > 1 {
                multi_position = true;
            }
        }
        if multi_position {
            let far_positions = mappings
                .iter()
                .map(|m| match side {
                    PortSide::Front => m.rear_port_position,
                    PortSide::Rear => m.front_port_position,
                })
                .collect();
            self.position_stack.push(far_positions);
        }

        Ok(Step::Continue(next))
    }

    fn follow_circuit(&mut self, remote: &[NodeRef]) -> Result<Step, TraceError> {
        let mut peers: Vec<CircuitPeer> = Vec::new();
        for node in remote {
            if let Some(peer) = self.topology.circuit_peer(*node)? {
                peers.push(peer);
            }
        }
        if peers.is_empty() {
            return Ok(Step::Stop);
        }

        let terminations: Vec<NodeRef> = peers.iter().map(|p| p.termination()).collect();

        let ends: Vec<NodeRef> = peers
            .iter()
            .filter_map(|p| match p {
                CircuitPeer::ProviderNetwork { network, .. } => Some(*network),
                CircuitPeer::Sink { sink, .. } => Some(*sink),
                CircuitPeer::Termination(_) => None,
            })
            .collect();

        if ends.len() == peers.len() {
            let provider_networks = peers
                .iter()
                .all(|p| matches!(p, CircuitPeer::ProviderNetwork { .. }));
            self.path.push(terminations);
            self.path.push(ends);
            if provider_networks || self.config.sink_paths_complete {
                self.complete_here();
            }
            return Ok(Step::Stop);
        }

        for node in &terminations {
            if let Some(link) = self.termination(*node)?.link {
                if self.links_seen.contains(&link) {
                    tracing::warn!(%node, %link, "circuit leads back onto a traced link; path is split");
                    self.mark_split();
                    return Ok(Step::Stop);
                }
            }
        }

        Ok(Step::Continue(terminations))
    }
}

#[derive(Clone, Copy)]
enum PortSide {
    Front,
    Rear,
}
