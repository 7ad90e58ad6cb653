//! Repository layer for persisted provenance.
//!
//! # Responsibility
//! - Define the storage contract used by `Kernel::sync` and `Kernel::revive`.
//! - Isolate SQLite query details from kernel orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`InvalidData`) in
//!   addition to DB transport errors.

pub mod provenance_repo;

pub use provenance_repo::{
    ProvenanceRepository, RepoError, RepoResult, SqliteProvenanceRepository, StoredNode,
    VersionLog,
};
