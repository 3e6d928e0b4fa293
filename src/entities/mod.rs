//! Entity types - the inventory objects the tracer reads

pub mod link;
pub mod port_mapping;
pub mod termination;

pub use link::{Cable, CableEnd, CableTermination, LengthUnit, LinkStatus, WirelessLink};
pub use port_mapping::PortMapping;
pub use termination::{
    CircuitAttachment, CircuitSide, HasLink, IsEndpoint, IsPassthrough, Termination,
    TerminationKind,
};
