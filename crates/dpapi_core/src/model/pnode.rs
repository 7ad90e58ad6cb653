//! Provenance node (P-node) model.
//!
//! # Responsibility
//! - Define the record owned by the node store for every P-node.
//! - Track per-version freeze state.
//!
//! # Invariants
//! - `versions` is never empty; the last entry is the current version.
//! - Version numbers start at 0 and increase by exactly one.
//! - A frozen version never becomes mutable again.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use uuid::Uuid;

/// Stable identity of a P-node.
///
/// Outlives the handles bound to it and survives persistence.
pub type NodeId = Uuid;

/// Provenance version number of one node.
pub type Version = u32;

/// Where a node came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum NodeOrigin {
    /// Created through `create_node`; not backed by any file.
    Phony,
    /// Bound to a file opened through `open_file`.
    File { path: PathBuf },
}

/// Freeze state of a single node version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionState {
    pub number: Version,
    pub frozen: bool,
}

/// A `(node, version)` pair; the unit edges are attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeVersion {
    pub node: NodeId,
    pub version: Version,
}

impl NodeVersion {
    pub fn new(node: NodeId, version: Version) -> Self {
        Self { node, version }
    }
}

impl Display for NodeVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.node, self.version)
    }
}

/// Canonical record for one P-node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PNode {
    pub id: NodeId,
    pub origin: NodeOrigin,
    /// Node this one was created in front of. A hint only; never an edge.
    pub adjacent: Option<NodeId>,
    versions: Vec<VersionState>,
}

impl PNode {
    /// Creates a node with a generated identity and a mutable version 0.
    pub fn new(origin: NodeOrigin, adjacent: Option<NodeId>) -> Self {
        Self::with_id(Uuid::new_v4(), origin, adjacent)
    }

    /// Creates a node with a caller-provided identity.
    pub fn with_id(id: NodeId, origin: NodeOrigin, adjacent: Option<NodeId>) -> Self {
        Self {
            id,
            origin,
            adjacent,
            versions: vec![VersionState {
                number: 0,
                frozen: false,
            }],
        }
    }

    /// Rebuilds a node from persisted version states.
    ///
    /// Returns `None` when `versions` is empty or not numbered `0..n`.
    pub fn restore(
        id: NodeId,
        origin: NodeOrigin,
        adjacent: Option<NodeId>,
        versions: Vec<VersionState>,
    ) -> Option<Self> {
        if versions.is_empty() {
            return None;
        }
        let contiguous = versions
            .iter()
            .enumerate()
            .all(|(index, state)| state.number as usize == index);
        if !contiguous {
            return None;
        }
        Some(Self {
            id,
            origin,
            adjacent,
            versions,
        })
    }

    pub fn current(&self) -> VersionState {
        // `versions` is non-empty by construction.
        self.versions[self.versions.len() - 1]
    }

    pub fn current_version(&self) -> Version {
        self.current().number
    }

    pub fn current_node_version(&self) -> NodeVersion {
        NodeVersion::new(self.id, self.current_version())
    }

    pub fn is_frozen(&self) -> bool {
        self.current().frozen
    }

    pub fn versions(&self) -> &[VersionState] {
        &self.versions
    }

    pub fn version_state(&self, version: Version) -> Option<VersionState> {
        self.versions.get(version as usize).copied()
    }

    /// Freezes the current version.
    ///
    /// Returns `false` when it was already frozen.
    pub fn freeze(&mut self) -> bool {
        let last = self.versions.len() - 1;
        let state = &mut self.versions[last];
        if state.frozen {
            return false;
        }
        state.frozen = true;
        true
    }

    /// Opens `current + 1` as a new mutable version.
    ///
    /// Only valid when the current version is frozen; returns `None` otherwise.
    pub fn open_next_version(&mut self) -> Option<Version> {
        if !self.is_frozen() {
            return None;
        }
        let next = self.current_version().checked_add(1)?;
        self.versions.push(VersionState {
            number: next,
            frozen: false,
        });
        Some(next)
    }
}
