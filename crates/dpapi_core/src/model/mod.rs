//! Provenance domain model.
//!
//! # Responsibility
//! - Define handles, P-nodes, versions and ancestry edges.
//! - Keep validation rules next to the data they guard.
//!
//! # Invariants
//! - Every P-node is identified by a stable `NodeId`.
//! - Provenance is append-only: versions and edges are never removed.

pub mod edge;
pub mod handle;
pub mod keys;
pub mod pnode;
