//! P-node ownership, freeze and version state.
//!
//! # Responsibility
//! - Own every `PNode` record and assign identities.
//! - Map canonical file paths to their provenance identity.
//! - Serialize all state changes of one node behind that node's mutex.
//!
//! # Invariants
//! - Node records are never removed while the kernel lives.
//! - All freeze checks and appends for a node run inside `with_node`, so a
//!   check-then-act sequence on one node is atomic.
//! - Lock order is store map, then node mutex; a map lock is never held
//!   while waiting on a node mutex.

use crate::kernel::error::{KernelError, KernelResult};
use crate::model::pnode::{NodeId, NodeOrigin, PNode, Version};
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Result of a `freeze` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezeOutcome {
    /// Version that is frozen after the call.
    pub version: Version,
    /// `false` when the version was already frozen.
    pub changed: bool,
}

/// In-memory owner of all P-node records.
#[derive(Debug, Default)]
pub struct NodeStore {
    nodes: RwLock<HashMap<NodeId, Arc<Mutex<PNode>>>>,
    paths: Mutex<HashMap<PathBuf, NodeId>>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a phony node, optionally placed in front of `adjacent`.
    ///
    /// `adjacent` is recorded as a hint only. Callers must check that it
    /// exists before calling.
    pub fn create_phony(&self, adjacent: Option<NodeId>) -> NodeId {
        let node = PNode::new(NodeOrigin::Phony, adjacent);
        let id = node.id;
        self.insert(node);
        debug!("event=node_store_insert module=node_store origin=phony node={id}");
        id
    }

    /// Returns the node for a canonical file path, creating it on first use.
    pub fn file_node(&self, path: &Path) -> NodeId {
        let mut paths = self.paths.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = paths.get(path) {
            return *id;
        }

        let node = PNode::new(
            NodeOrigin::File {
                path: path.to_path_buf(),
            },
            None,
        );
        let id = node.id;
        self.insert(node);
        paths.insert(path.to_path_buf(), id);
        debug!("event=node_store_insert module=node_store origin=file node={id}");
        id
    }

    /// Installs a record loaded from storage.
    ///
    /// Returns `false` and keeps the live record when `node.id` is present.
    pub fn insert_restored(&self, node: PNode) -> bool {
        if self.contains(node.id) {
            return false;
        }
        if let NodeOrigin::File { path } = &node.origin {
            self.paths
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(path.clone())
                .or_insert(node.id);
        }
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        if nodes.contains_key(&node.id) {
            return false;
        }
        nodes.insert(node.id, Arc::new(Mutex::new(node)));
        true
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `f` with exclusive access to one node record.
    ///
    /// # Errors
    /// - `NodeNotFound` when `id` is unknown.
    /// - Whatever `f` returns.
    pub fn with_node<T>(
        &self,
        id: NodeId,
        f: impl FnOnce(&mut PNode) -> KernelResult<T>,
    ) -> KernelResult<T> {
        let cell = self.cell(id)?;
        let mut node = cell.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut node)
    }

    /// Freezes the current version of `id`, or nothing when `pinned` names
    /// an older version. Idempotent.
    ///
    /// `on_change` runs under the node lock, only when a version was frozen.
    pub fn freeze(
        &self,
        id: NodeId,
        pinned: Option<Version>,
        on_change: impl FnOnce(&PNode),
    ) -> KernelResult<FreezeOutcome> {
        self.with_node(id, |node| {
            if let Some(version) = pinned.filter(|version| *version != node.current_version()) {
                // Every version before the current one is already frozen.
                return Ok(FreezeOutcome {
                    version,
                    changed: false,
                });
            }
            let changed = node.freeze();
            if changed {
                on_change(node);
            }
            Ok(FreezeOutcome {
                version: node.current_version(),
                changed,
            })
        })
    }

    pub fn current_version(&self, id: NodeId) -> KernelResult<Version> {
        self.with_node(id, |node| Ok(node.current_version()))
    }

    /// Returns a copy of the record for queries and persistence.
    pub fn snapshot(&self, id: NodeId) -> KernelResult<PNode> {
        self.with_node(id, |node| Ok(node.clone()))
    }

    fn insert(&self, node: PNode) {
        self.nodes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node.id, Arc::new(Mutex::new(node)));
    }

    fn cell(&self, id: NodeId) -> KernelResult<Arc<Mutex<PNode>>> {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(KernelError::NodeNotFound(id))
    }
}
