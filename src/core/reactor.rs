//! Change reactor
//!
//! Keeps the path store consistent with the topology. Every topology mutation
//! is an explicit [`TopologyChange`] record; [`Reactor::apply`] diffs it
//! against the current topology, mutates the topology and then runs the
//! matching callback. Callbacks delete the affected paths straight away and
//! queue their origins; the queue is traced once at the end of the call, so a
//! batch retraces each origin set at most once.
//!
//! Each call runs in one SQLite transaction. On any error the transaction is
//! rolled back and the topology restored from a snapshot.

use std::collections::BTreeMap;

use miette::Diagnostic;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::node::{NodeKind, NodeRef};
use crate::core::store::{self, PathStore, StoreError};
use crate::core::topology::{Link, Topology, TopologyError, TopologySource};
use crate::core::tracer::{trace, TraceConfig, TraceError};
use crate::entities::link::{Cable, CableEnd, CableTermination, WirelessLink};
use crate::entities::port_mapping::PortMapping;
use crate::entities::termination::{IsEndpoint, IsPassthrough, Termination};

/// Errors that abort a reactor call
#[derive(Debug, Error, Diagnostic)]
pub enum ReactorError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for ReactorError {
    fn from(err: rusqlite::Error) -> Self {
        ReactorError::Store(StoreError::Sqlite(err))
    }
}

/// One topology mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TopologyChange {
    SaveCable(Cable),
    DeleteCable { id: u64 },
    SaveWirelessLink(WirelessLink),
    DeleteWirelessLink { id: u64 },
    SavePortMapping(PortMapping),
    DeletePortMapping(PortMapping),
    DeleteCableTermination { cable: u64, termination: NodeRef },
    SaveTermination(Termination),
    DeleteTermination { termination: NodeRef },
}

impl std::fmt::Display for TopologyChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopologyChange::SaveCable(cable) => write!(f, "save {}", cable.node()),
            TopologyChange::DeleteCable { id } => write!(f, "delete {}", NodeRef::cable(*id)),
            TopologyChange::SaveWirelessLink(link) => write!(f, "save {}", link.node()),
            TopologyChange::DeleteWirelessLink { id } => {
                write!(f, "delete {}", NodeRef::wireless_link(*id))
            }
            TopologyChange::SavePortMapping(m) => write!(
                f,
                "map {}:{} -> {}:{}",
                m.front_node(),
                m.front_port_position,
                m.rear_node(),
                m.rear_port_position
            ),
            TopologyChange::DeletePortMapping(m) => write!(
                f,
                "unmap {}:{} -> {}:{}",
                m.front_node(),
                m.front_port_position,
                m.rear_node(),
                m.rear_port_position
            ),
            TopologyChange::DeleteCableTermination { cable, termination } => {
                write!(f, "detach {} from {}", termination, NodeRef::cable(*cable))
            }
            TopologyChange::SaveTermination(t) => write!(f, "save {}", t.node()),
            TopologyChange::DeleteTermination { termination } => {
                write!(f, "delete {}", termination)
            }
        }
    }
}

/// Path counts touched by one reactor call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReactorReport {
    pub created: usize,
    pub deleted: usize,
    pub deactivated: usize,
}

impl ReactorReport {
    pub fn is_empty(&self) -> bool {
        self.created == 0 && self.deleted == 0 && self.deactivated == 0
    }
}

/// Owns a topology and its path store and keeps them in step
pub struct Reactor {
    topology: Topology,
    store: PathStore,
    config: TraceConfig,
}

impl Reactor {
    pub fn new(topology: Topology, store: PathStore, config: TraceConfig) -> Self {
        Self {
            topology,
            store,
            config,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Mutable topology access for callers firing the callbacks themselves
    pub fn topology_mut(&mut self) -> &mut Topology {
        &mut self.topology
    }

    pub fn store(&self) -> &PathStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PathStore {
        &mut self.store
    }

    pub fn into_parts(self) -> (Topology, PathStore) {
        (self.topology, self.store)
    }

    /// Apply one change atomically
    pub fn apply(&mut self, change: TopologyChange) -> Result<ReactorReport, ReactorError> {
        self.apply_batch(vec![change])
    }

    /// Apply several changes in one transaction, tracing each origin set once
    pub fn apply_batch<I>(&mut self, changes: I) -> Result<ReactorReport, ReactorError>
    where
        I: IntoIterator<Item = TopologyChange>,
    {
        self.run(|pass, topology| {
            for change in changes {
                debug!("applying {}", change);
                pass.apply(topology, change)?;
            }
            Ok(())
        })
    }

    /// A link was saved; the topology already reflects it
    pub fn on_link_saved(
        &mut self,
        link: NodeRef,
        terminations_modified: bool,
        status_changed: bool,
    ) -> Result<ReactorReport, ReactorError> {
        self.run(|pass, topology| {
            pass.link_saved(topology, link, terminations_modified, status_changed)
        })
    }

    /// A link was deleted; the topology no longer has it
    pub fn on_link_deleted(&mut self, link: NodeRef) -> Result<ReactorReport, ReactorError> {
        self.run(|pass, _| pass.link_deleted(link))
    }

    /// A port mapping was added or removed
    pub fn on_port_mapping_saved_or_deleted(
        &mut self,
        mapping: &PortMapping,
    ) -> Result<ReactorReport, ReactorError> {
        self.run(|pass, _| pass.port_mapping_changed(mapping))
    }

    /// A termination was detached from its cable
    pub fn on_cable_termination_deleted(
        &mut self,
        ct: &CableTermination,
    ) -> Result<ReactorReport, ReactorError> {
        self.run(|pass, _| pass.cable_termination_deleted(ct))
    }

    /// Delete and retrace every path passing through any of `nodes`
    pub fn rebuild_paths(&mut self, nodes: &[NodeRef]) -> Result<ReactorReport, ReactorError> {
        self.run(|pass, _| pass.rebuild_paths(nodes))
    }

    /// Drop every stored path and trace every endpoint again
    pub fn rebuild_all(&mut self) -> Result<ReactorReport, ReactorError> {
        self.run(|pass, topology| {
            pass.report.deleted += store::count_paths(pass.conn)?;
            store::clear(pass.conn)?;
            pass.schedule(topology.endpoints());
            Ok(())
        })
    }

    fn run<F>(&mut self, f: F) -> Result<ReactorReport, ReactorError>
    where
        F: FnOnce(&mut Pass<'_>, &mut Topology) -> Result<(), ReactorError>,
    {
        let snapshot = self.topology.clone();
        let tx = self.store.transaction()?;
        let mut pass = Pass::new(&tx, &self.config);

        let result = f(&mut pass, &mut self.topology).and_then(|()| pass.flush(&self.topology));
        match result {
            Ok(()) => {
                let report = pass.report;
                tx.commit()?;
                info!(
                    "paths: {} created, {} deleted, {} deactivated",
                    report.created, report.deleted, report.deactivated
                );
                Ok(report)
            }
            Err(e) => {
                drop(tx);
                self.topology = snapshot;
                warn!("rolled back: {}", e);
                Err(e)
            }
        }
    }
}

// =========================================================================
// One transaction's worth of work
// =========================================================================

struct Pass<'a> {
    conn: &'a Connection,
    config: &'a TraceConfig,
    /// Origins awaiting a trace, in the order they were queued
    pending: Vec<NodeRef>,
    report: ReactorReport,
}

impl<'a> Pass<'a> {
    fn new(conn: &'a Connection, config: &'a TraceConfig) -> Self {
        Self {
            conn,
            config,
            pending: Vec::new(),
            report: ReactorReport::default(),
        }
    }

    fn schedule<I: IntoIterator<Item = NodeRef>>(&mut self, origins: I) {
        for node in origins {
            if !self.pending.contains(&node) {
                self.pending.push(node);
            }
        }
    }

    fn delete(&mut self, path: &crate::core::path::CablePath) -> Result<(), ReactorError> {
        if store::delete_path(self.conn, path)? {
            self.report.deleted += 1;
        }
        Ok(())
    }

    fn apply(&mut self, topology: &mut Topology, change: TopologyChange) -> Result<(), ReactorError> {
        match change {
            TopologyChange::SaveCable(cable) => {
                let node = cable.node();
                let before: Vec<CableTermination> = topology
                    .get_cable(cable.id)
                    .map(|old| {
                        old.all_terminations()
                            .filter_map(|t| topology.cable_termination(t).cloned())
                            .collect()
                    })
                    .unwrap_or_default();

                let change = topology.upsert_cable(cable)?;
                for removed in &change.removed {
                    if let Some(ct) = before.iter().find(|ct| ct.termination == *removed) {
                        self.cable_termination_deleted(ct)?;
                    }
                }
                self.link_saved(
                    topology,
                    node,
                    change.terminations_modified || change.profile_changed,
                    change.status_changed,
                )
            }
            TopologyChange::DeleteCable { id } => {
                let node = NodeRef::cable(id);
                topology.remove_link(node)?;
                self.link_deleted(node)
            }
            TopologyChange::SaveWirelessLink(link) => {
                let node = link.node();
                let change = topology.upsert_wireless_link(link)?;
                self.rebuild_paths(&change.removed)?;
                self.link_saved(
                    topology,
                    node,
                    change.terminations_modified,
                    change.status_changed,
                )
            }
            TopologyChange::DeleteWirelessLink { id } => {
                let node = NodeRef::wireless_link(id);
                topology.remove_link(node)?;
                self.link_deleted(node)
            }
            TopologyChange::SavePortMapping(mapping) => {
                if topology.add_port_mapping(mapping.clone())? {
                    self.port_mapping_changed(&mapping)?;
                }
                Ok(())
            }
            TopologyChange::DeletePortMapping(mapping) => {
                if topology.remove_port_mapping(&mapping) {
                    self.port_mapping_changed(&mapping)?;
                }
                Ok(())
            }
            TopologyChange::DeleteCableTermination { cable, termination } => {
                let ct = topology.remove_cable_termination(cable, termination)?;
                self.cable_termination_deleted(&ct)
            }
            TopologyChange::SaveTermination(termination) => {
                let node = termination.node();
                let mut affected = vec![node];
                // Paths that stopped at the far side of a circuit
                affected.extend(circuit_peer_of(topology, node));
                topology.upsert_termination(termination)?;
                affected.extend(circuit_peer_of(topology, node));
                self.rebuild_paths(&affected)
            }
            TopologyChange::DeleteTermination { termination } => {
                self.termination_deleted(topology, termination)
            }
        }
    }

    fn termination_deleted(
        &mut self,
        topology: &mut Topology,
        node: NodeRef,
    ) -> Result<(), ReactorError> {
        let link = topology
            .get_termination(node)
            .ok_or_else(|| TopologyError::UnknownNode(node.to_string()))?
            .link;

        match link {
            Some(link) if link.kind == NodeKind::Cable => {
                let ct = topology.remove_cable_termination(link.id, node)?;
                self.cable_termination_deleted(&ct)?;
            }
            Some(link) => {
                // A wireless link cannot exist with one interface
                topology.remove_link(link)?;
                self.link_deleted(link)?;
            }
            None => {}
        }

        let mut affected = vec![node];
        affected.extend(circuit_peer_of(topology, node));
        let removed = topology.remove_termination(node)?;
        for mapping in &removed.mappings {
            affected.push(mapping.front_node());
            affected.push(mapping.rear_node());
        }
        affected.extend(removed.unbound);
        self.rebuild_paths(&affected)
    }

    fn link_saved(
        &mut self,
        topology: &Topology,
        link: NodeRef,
        terminations_modified: bool,
        status_changed: bool,
    ) -> Result<(), ReactorError> {
        if terminations_modified {
            let (a, b) = topology.terminations_of_link(link)?;
            let mut rebuild = vec![link];
            for node in a.into_iter().chain(b) {
                let termination = topology.termination(node)?;
                if termination.is_endpoint() {
                    self.schedule([node]);
                }
                if termination.is_passthrough() {
                    rebuild.push(node);
                }
            }
            self.rebuild_paths(&rebuild)
        } else if status_changed {
            if topology.link(link)?.status().is_connected() {
                self.rebuild_paths(&[link])
            } else {
                let n = store::set_inactive_through(self.conn, link)?;
                debug!("{} is no longer connected, {} path(s) deactivated", link, n);
                self.report.deactivated += n;
                Ok(())
            }
        } else {
            Ok(())
        }
    }

    fn link_deleted(&mut self, link: NodeRef) -> Result<(), ReactorError> {
        for path in store::paths_through(self.conn, link)? {
            self.delete(&path)?;
            self.schedule(path.origins().iter().copied());
        }
        Ok(())
    }

    fn port_mapping_changed(&mut self, mapping: &PortMapping) -> Result<(), ReactorError> {
        self.rebuild_paths(&[mapping.front_node(), mapping.rear_node()])
    }

    fn cable_termination_deleted(&mut self, ct: &CableTermination) -> Result<(), ReactorError> {
        let cable = NodeRef::cable(ct.cable);
        for path in store::paths_through(self.conn, cable)? {
            self.delete(&path)?;
            self.schedule(
                path.origins()
                    .iter()
                    .copied()
                    .filter(|origin| *origin != ct.termination),
            );
        }
        Ok(())
    }

    fn rebuild_paths(&mut self, nodes: &[NodeRef]) -> Result<(), ReactorError> {
        for node in nodes {
            for path in store::paths_through(self.conn, *node)? {
                self.delete(&path)?;
                self.schedule(path.origins().iter().copied());
            }
        }
        Ok(())
    }

    /// Trace every queued origin set and store the results
    fn flush(&mut self, topology: &Topology) -> Result<(), ReactorError> {
        let pending = std::mem::take(&mut self.pending);
        for origins in origin_groups(topology, &pending) {
            debug!("tracing from {:?}", origins);
            if let Some(mut path) = trace(topology, &origins, self.config)? {
                let saved = store::save_path(self.conn, &mut path)?;
                self.report.created += 1;
                self.report.deleted += saved.superseded;
            }
        }
        Ok(())
    }
}

/// Opposite-side circuit termination of a circuit termination
fn circuit_peer_of(topology: &Topology, node: NodeRef) -> Option<NodeRef> {
    topology
        .circuit_peer(node)
        .ok()
        .flatten()
        .map(|peer| peer.termination())
}

/// Split queued origins into the sets `trace()` accepts
///
/// Origins that vanished, lost their link or stopped being connectable
/// endpoints are dropped. The rest are grouped by link and cable side; a
/// profiled cable or a wireless link traces each origin on its own, a
/// profileless cable traces a whole side together in connector order.
fn origin_groups(topology: &Topology, pending: &[NodeRef]) -> Vec<Vec<NodeRef>> {
    let mut groups: BTreeMap<(NodeRef, Option<CableEnd>), Vec<NodeRef>> = BTreeMap::new();
    let mut singles: Vec<Vec<NodeRef>> = Vec::new();

    for node in pending {
        let Some(termination) = topology.get_termination(*node) else {
            continue;
        };
        if !termination.is_endpoint() || termination.non_connectable {
            continue;
        }
        let Some(link) = termination.link else {
            continue;
        };

        match topology.link(link) {
            Ok(Link::Cable(cable)) if cable.profile.is_none() => {
                groups
                    .entry((link, cable.end_of(*node)))
                    .or_default()
                    .push(*node);
            }
            Ok(_) => singles.push(vec![*node]),
            Err(_) => continue,
        }
    }

    for group in groups.values_mut() {
        group.sort_by_key(|n| topology.cable_termination(*n).map(|ct| ct.id));
    }
    singles.extend(groups.into_values());
    singles
}
