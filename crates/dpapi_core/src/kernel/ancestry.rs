//! Append-only ancestry edge storage.
//!
//! # Responsibility
//! - Own every edge, grouped into one log per node version.
//! - Serve keyed, insertion-ordered edge sequences.
//! - Keep a reverse index from referenced versions to the edges naming them.
//!
//! # Invariants
//! - Logs only grow; edges are never removed or rewritten.
//! - Appends only target the source's current version, and only while it
//!   is mutable.
//! - Readers get a copy-on-write snapshot, so later appends never disturb an
//!   in-flight iteration.
//! - Every reference edge in a log has exactly one entry in the reverse
//!   index; both are updated under the same write lock.

use crate::kernel::error::{KernelError, KernelResult};
use crate::model::edge::{validate_key, Edge, EdgeValue};
use crate::model::pnode::{NodeVersion, PNode};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

/// Position of an edge inside its version log.
pub type EdgeSeq = usize;

/// Edge logs for every node version.
#[derive(Debug, Default)]
pub struct AncestryGraph {
    state: RwLock<GraphState>,
}

#[derive(Debug, Default)]
struct GraphState {
    logs: HashMap<NodeVersion, Arc<Vec<Edge>>>,
    /// Referenced version -> edges pointing at it, in append order.
    referrers: HashMap<NodeVersion, Vec<Edge>>,
}

impl GraphState {
    fn index(&mut self, edge: &Edge) {
        if let Some(target) = edge.target() {
            self.referrers.entry(target).or_default().push(edge.clone());
        }
    }
}

impl AncestryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one edge to the current version of `source`.
    ///
    /// `source` must be borrowed from inside `NodeStore::with_node`, which
    /// keeps the freeze check and the append under one node lock.
    ///
    /// # Errors
    /// - `InvalidKey` for empty or whitespace-containing keys.
    /// - `SourceFrozen` when the current version is frozen.
    pub fn append(&self, source: &PNode, key: &str, value: EdgeValue) -> KernelResult<EdgeSeq> {
        validate_key(key)?;
        let target = source.current_node_version();
        if source.is_frozen() {
            return Err(KernelError::SourceFrozen(target));
        }

        let edge = Edge::new(target, key, value);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.index(&edge);
        let log = Arc::make_mut(state.logs.entry(target).or_default());
        log.push(edge);
        Ok(log.len() - 1)
    }

    /// Edges of one version stored under `key`, in append order.
    pub fn edges_for_key(&self, version: NodeVersion, key: &str) -> EdgeSequence {
        EdgeSequence {
            log: self.log(version),
            key: Some(key.to_string()),
        }
    }

    /// All edges of one version, in append order.
    pub fn edges(&self, version: NodeVersion) -> EdgeSequence {
        EdgeSequence {
            log: self.log(version),
            key: None,
        }
    }

    /// Installs a persisted log for a version that has no live edges yet.
    ///
    /// Returns `false` when a live log already exists.
    pub fn restore(&self, version: NodeVersion, edges: Vec<Edge>) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.logs.get(&version).is_some_and(|log| !log.is_empty()) {
            return false;
        }
        for edge in &edges {
            state.index(edge);
        }
        state.logs.insert(version, Arc::new(edges));
        true
    }

    /// Reference edges pointing at `target`, in append order.
    pub fn referrers(&self, target: NodeVersion) -> Vec<Edge> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .referrers
            .get(&target)
            .cloned()
            .unwrap_or_default()
    }

    /// Every version reachable from `start` over reference edges.
    ///
    /// Breadth-first, in discovery order; `start` itself is excluded unless
    /// a cycle leads back to it. Each version appears once.
    pub fn ancestors(&self, start: NodeVersion) -> Vec<NodeVersion> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([start]);
        let mut found = Vec::new();

        while let Some(current) = queue.pop_front() {
            let Some(log) = state.logs.get(&current) else {
                continue;
            };
            for target in log.iter().filter_map(Edge::target) {
                if seen.insert(target) {
                    found.push(target);
                    queue.push_back(target);
                }
            }
        }
        found
    }

    fn log(&self, version: NodeVersion) -> Arc<Vec<Edge>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .logs
            .get(&version)
            .cloned()
            .unwrap_or_default()
    }
}

/// Finite, restartable view over one version log.
///
/// Filtering by key happens lazily while iterating.
#[derive(Debug, Clone)]
pub struct EdgeSequence {
    log: Arc<Vec<Edge>>,
    key: Option<String>,
}

impl EdgeSequence {
    pub fn iter(&self) -> EdgeIter<'_> {
        EdgeIter {
            inner: self.log.iter(),
            key: self.key.as_deref(),
        }
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn to_vec(&self) -> Vec<Edge> {
        self.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a EdgeSequence {
    type Item = &'a Edge;
    type IntoIter = EdgeIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator returned by `EdgeSequence::iter`.
#[derive(Debug, Clone)]
pub struct EdgeIter<'a> {
    inner: std::slice::Iter<'a, Edge>,
    key: Option<&'a str>,
}

impl<'a> Iterator for EdgeIter<'a> {
    type Item = &'a Edge;

    fn next(&mut self) -> Option<Self::Item> {
        match self.key {
            Some(key) => self.inner.by_ref().find(|edge| edge.key == key),
            None => self.inner.next(),
        }
    }
}
