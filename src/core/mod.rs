//! Core module - topology, tracing and path persistence

pub mod config;
pub mod node;
pub mod path;
pub mod profiles;
pub mod reactor;
pub mod store;
pub mod topology;
pub mod tracer;

pub use config::{Config, ConfigError};
pub use node::{compile_path_node, decompile_path_node, NodeKind, NodeParseError, NodeRef};
pub use path::CablePath;
pub use profiles::{CableProfile, ProfileError, ProfileFamily, ProfileMapping, ProfilePeer};
pub use reactor::{Reactor, ReactorError, ReactorReport, TopologyChange};
pub use store::{PathStore, StoreError};
pub use topology::{Topology, TopologyDocument, TopologyError, TopologySource};
pub use tracer::{trace, TraceConfig, TraceError};
