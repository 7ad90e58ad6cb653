//! In-process provenance kernel (DPAPI).
//! This crate is the single source of truth for P-node, version and
//! ancestry invariants; binding layers only translate calls into it.

pub mod config;
pub mod db;
pub mod kernel;
pub mod logging;
pub mod model;
pub mod repo;
pub mod trace;

pub use config::{FreezePolicy, KernelConfig};
pub use kernel::ancestry::{EdgeIter, EdgeSequence};
pub use kernel::error::{KernelError, KernelResult};
pub use kernel::options::{CreateNodeOptions, VersionSelector, XRefOptions};
pub use kernel::{Kernel, NodeInfo};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::edge::{Edge, EdgeValue};
pub use model::handle::{Handle, HandleKind};
pub use model::pnode::{NodeId, NodeOrigin, NodeVersion, Version};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
