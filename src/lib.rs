//! Cabletrace: cable path tracing for network infrastructure inventories
//!
//! Traces signal paths from one termination through cables, patch panels,
//! multi-position trunks and circuits to the far end, stores the results in
//! SQLite and keeps them current as the topology changes.

pub mod cli;
pub mod core;
pub mod entities;
pub mod yaml;
