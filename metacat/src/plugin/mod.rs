//! Metadata plugins and key-ownership routing.
//!
//! A plugin claims a slice of the metadata key space and serves it through
//! one backend adapter. The registry holds plugins in load order and
//! verifies at build time that no advertised key has two owners; the router
//! resolves every key to its single authoritative plugin.

mod column_plugin;
mod json_plugin;
mod plugin;
mod registry;
mod router;

pub use column_plugin::*;
pub use json_plugin::*;
pub use plugin::*;
pub use registry::*;
pub use router::*;
