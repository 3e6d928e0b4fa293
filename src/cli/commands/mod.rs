//! CLI command implementations

pub mod apply;
pub mod completions;
pub mod paths;
pub mod profiles;
pub mod sync;
pub mod trace;
pub mod validate;
