//! Script Bridges
//!
//! Connects Lua scripts to the host: routed standard streams, the per-run
//! capability namespace and a few convenience modules.

pub mod namespace;
pub mod stdlib;
pub mod streams;

pub use namespace::{Capability, HostFunction, NamespaceBuilder};
pub use streams::install_stream_bridge;
