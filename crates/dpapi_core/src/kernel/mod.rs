//! Provenance kernel operation surface.
//!
//! # Responsibility
//! - Compose the handle table, node store and ancestry graph into the
//!   open/close/create/freeze/add-xref/add-str operation set.
//! - Enforce the configured freeze policy uniformly for every node.
//! - Optionally sync nodes to SQLite and record a provtrace.
//!
//! # Invariants
//! - Every operation reports failure through `KernelError`; nothing panics.
//! - Per node: `Mutable -> Frozen` per version; no transition leaves
//!   `Frozen`. A new version, when opened, starts `Mutable`.
//! - The kernel never holds two node locks at once.
//! - Trace lines for freezes and appends are pushed while the node lock is
//!   held, so per node the trace order is the applied order.
//! - A handle pinned to a version reads that version; appends through it
//!   follow the freeze policy like any append to a frozen version.

pub mod ancestry;
pub mod error;
pub mod handle_table;
pub mod node_store;
pub mod options;

use crate::config::{FreezePolicy, KernelConfig};
use crate::db::open_db;
use crate::model::edge::{validate_key, Edge, EdgeValue};
use crate::model::handle::{Handle, HandleKind};
use crate::model::pnode::{NodeId, NodeOrigin, NodeVersion, PNode, Version};
use crate::repo::{ProvenanceRepository, SqliteProvenanceRepository, VersionLog};
use crate::trace::ProvTrace;
use ancestry::{AncestryGraph, EdgeSequence};
use error::{KernelError, KernelResult};
use handle_table::{HandleEntry, HandleTable};
use log::{debug, error, info};
use node_store::NodeStore;
use options::{CreateNodeOptions, VersionSelector, XRefOptions};
use rusqlite::Connection;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// Read-only description of what a handle is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub handle: Handle,
    pub kind: HandleKind,
    pub node: NodeId,
    pub origin: NodeOrigin,
    pub adjacent: Option<NodeId>,
    /// Version the handle reads: its pinned version, else the current one.
    pub version: Version,
    pub frozen: bool,
    pub pinned: bool,
}

/// One provenance kernel instance.
///
/// Shared by reference across threads; every method takes `&self`.
#[derive(Debug)]
pub struct Kernel {
    config: KernelConfig,
    handles: HandleTable,
    nodes: NodeStore,
    graph: AncestryGraph,
    files: Mutex<HashMap<Handle, File>>,
    storage: Option<Mutex<Connection>>,
    trace: Option<ProvTrace>,
}

impl Kernel {
    /// Builds a kernel from `config`.
    ///
    /// # Errors
    /// - `InitFailure` when the configured database cannot be opened.
    pub fn new(config: KernelConfig) -> KernelResult<Self> {
        let storage = match config.db_path.as_deref() {
            Some(path) => {
                let conn = open_db(path).map_err(|err| {
                    error!(
                        "event=kernel_init module=kernel status=error error_code=db_open_failed error={err}"
                    );
                    KernelError::InitFailure(format!("cannot open provenance database: {err}"))
                })?;
                Some(Mutex::new(conn))
            }
            None => None,
        };

        Ok(Self::assemble(config, storage))
    }

    /// Builds a kernel that syncs into an already-open connection.
    ///
    /// `conn` must have been opened through `db::open_db*` so migrations are
    /// applied. `config.db_path` is ignored.
    pub fn with_connection(config: KernelConfig, conn: Connection) -> Self {
        Self::assemble(config, Some(Mutex::new(conn)))
    }

    fn assemble(config: KernelConfig, storage: Option<Mutex<Connection>>) -> Self {
        let handles = match config.max_handles {
            Some(limit) => HandleTable::with_limit(limit),
            None => HandleTable::new(),
        };
        let trace = config.trace.then(ProvTrace::new);

        info!(
            "event=kernel_init module=kernel status=ok freeze_policy={} max_handles={} persistence={} trace={}",
            config.freeze_policy.as_str(),
            config
                .max_handles
                .map_or_else(|| "none".to_string(), |limit| limit.to_string()),
            storage.is_some(),
            config.trace
        );

        Self {
            config,
            handles,
            nodes: NodeStore::new(),
            graph: AncestryGraph::new(),
            files: Mutex::new(HashMap::new()),
            storage,
            trace,
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Opens a file and binds a handle to its provenance node.
    ///
    /// Opening the same canonical path again yields a new handle bound to
    /// the same node.
    ///
    /// # Errors
    /// - `Io` when the file cannot be opened or canonicalized.
    /// - `ResourceExhausted` when no handle is left.
    pub fn open_file(&self, path: impl AsRef<Path>, for_writing: bool) -> KernelResult<Handle> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(for_writing)
            .open(path)?;
        let canonical = std::fs::canonicalize(path)?;
        let handle = self.handles.reserve()?;
        let node = self.nodes.file_node(&canonical);
        self.handles.bind(handle, HandleEntry::new(HandleKind::File, node));

        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, file);
        info!(
            "event=file_open module=kernel status=ok handle={} for_writing={for_writing}",
            handle.raw()
        );
        Ok(handle)
    }

    /// Releases a file or node handle. Closing a file handle closes the file.
    ///
    /// Node records survive; `revive` hands out a new handle for them.
    pub fn close_handle(&self, handle: Handle) -> KernelResult<()> {
        let entry = self.handles.release(handle)?;
        if entry.kind == HandleKind::File {
            self.files
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&handle);
        }
        debug!(
            "event=handle_close module=kernel status=ok handle={} kind={}",
            handle.raw(),
            entry.kind.as_str()
        );
        Ok(())
    }

    /// Creates a phony P-node.
    ///
    /// # Errors
    /// - `InvalidHandle` when `options.adjacent` does not resolve.
    /// - `ResourceExhausted` when no handle is left.
    pub fn create_node(&self, options: CreateNodeOptions) -> KernelResult<Handle> {
        let adjacent = options
            .adjacent
            .map(|handle| self.handles.resolve(handle))
            .transpose()?;

        let handle = self.handles.reserve()?;
        let node = self.nodes.create_phony(adjacent.map(|entry| entry.node));
        if let Some(trace) = &self.trace {
            trace.record_phony(handle, options.adjacent);
        }
        self.handles.bind(handle, HandleEntry::new(HandleKind::Node, node));

        info!(
            "event=node_create module=kernel status=ok handle={} adjacent={}",
            handle.raw(),
            options.adjacent.map_or(-1, Handle::raw)
        );
        Ok(handle)
    }

    /// Freezes the version `handle` reads.
    ///
    /// Idempotent: freezing an already-frozen version changes nothing.
    /// Returns the frozen version.
    pub fn freeze(&self, handle: Handle) -> KernelResult<Version> {
        let entry = self.handles.resolve(handle)?;
        let outcome = self.nodes.freeze(entry.node, entry.version, |_| {
            if let Some(trace) = &self.trace {
                trace.record_freeze(handle);
            }
        })?;

        info!(
            "event=node_freeze module=kernel status=ok handle={} version={} changed={}",
            handle.raw(),
            outcome.version,
            outcome.changed
        );
        Ok(outcome.version)
    }

    /// Appends a cross-reference from `handle` to `target` under `key`.
    ///
    /// The reference pins `options.version`, or the version the target
    /// handle reads when unset. Returns the source version the edge was appended to.
    ///
    /// # Errors
    /// - `InvalidKey`, `InvalidHandle` (source or target).
    /// - `InvalidVersion` when the pinned version does not exist yet.
    /// - `SourceFrozen` under `FreezePolicy::Reject`.
    pub fn add_xref(
        &self,
        handle: Handle,
        key: &str,
        target: Handle,
        options: XRefOptions,
    ) -> KernelResult<NodeVersion> {
        validate_key(key)?;
        let source = self.handles.resolve(handle)?;
        let target_entry = self.handles.resolve(target)?;

        let current = self.nodes.current_version(target_entry.node)?;
        let version = match options.version {
            VersionSelector::Latest => target_entry.version.unwrap_or(current),
            VersionSelector::Exact(requested) if requested <= current => requested,
            VersionSelector::Exact(requested) => {
                return Err(KernelError::InvalidVersion {
                    target: target_entry.node,
                    requested,
                    current,
                });
            }
        };

        let appended = self.append(
            &source,
            key,
            EdgeValue::reference(target_entry.node, version),
            |trace| trace.record_xref(handle, key, target, version),
        )?;

        debug!(
            "event=edge_append module=kernel status=ok kind=xref handle={} version={} target={} target_version={version}",
            handle.raw(),
            appended.version,
            target.raw()
        );
        Ok(appended)
    }

    /// Appends a string annotation to `handle` under `key`.
    ///
    /// Returns the source version the edge was appended to.
    pub fn add_str(&self, handle: Handle, key: &str, value: &str) -> KernelResult<NodeVersion> {
        validate_key(key)?;
        let source = self.handles.resolve(handle)?;
        let appended = self.append(&source, key, EdgeValue::literal(value), |trace| {
            trace.record_str(handle, key, value)
        })?;

        debug!(
            "event=edge_append module=kernel status=ok kind=str handle={} version={} value_len={}",
            handle.raw(),
            appended.version,
            value.len()
        );
        Ok(appended)
    }

    /// Edges under `key` on the version `handle` reads, in append order.
    pub fn edges_for_key(&self, handle: Handle, key: &str) -> KernelResult<EdgeSequence> {
        let at = self.handle_version(handle)?;
        Ok(self.graph.edges_for_key(at, key))
    }

    /// Edges under `key` on a specific version of `handle`.
    pub fn edges_for_key_at(
        &self,
        handle: Handle,
        key: &str,
        version: Version,
    ) -> KernelResult<EdgeSequence> {
        let entry = self.handles.resolve(handle)?;
        self.check_version(entry.node, version)?;
        Ok(self
            .graph
            .edges_for_key(NodeVersion::new(entry.node, version), key))
    }

    /// All edges on the version `handle` reads, in append order.
    pub fn edges(&self, handle: Handle) -> KernelResult<EdgeSequence> {
        let at = self.handle_version(handle)?;
        Ok(self.graph.edges(at))
    }

    /// Current version of the node behind `handle`, ignoring any pin.
    pub fn current_version(&self, handle: Handle) -> KernelResult<Version> {
        let entry = self.handles.resolve(handle)?;
        self.nodes.current_version(entry.node)
    }

    /// Versions reachable from the version `handle` reads over reference
    /// edges, breadth-first.
    ///
    /// Only ancestry known in memory is walked; revive nodes first to
    /// include synced history.
    pub fn ancestors(&self, handle: Handle) -> KernelResult<Vec<NodeVersion>> {
        let at = self.handle_version(handle)?;
        let found = self.graph.ancestors(at);
        debug!(
            "event=ancestry_walk module=kernel status=ok handle={} found={}",
            handle.raw(),
            found.len()
        );
        Ok(found)
    }

    /// Reference edges naming the version `handle` reads, in append order.
    pub fn referrers(&self, handle: Handle) -> KernelResult<Vec<Edge>> {
        let at = self.handle_version(handle)?;
        Ok(self.graph.referrers(at))
    }

    /// Ancestors of a specific version of `handle`.
    pub fn ancestors_at(
        &self,
        handle: Handle,
        version: Version,
    ) -> KernelResult<Vec<NodeVersion>> {
        let entry = self.handles.resolve(handle)?;
        self.check_version(entry.node, version)?;
        Ok(self.graph.ancestors(NodeVersion::new(entry.node, version)))
    }

    /// Reference edges naming a specific version of `handle`.
    pub fn referrers_at(&self, handle: Handle, version: Version) -> KernelResult<Vec<Edge>> {
        let entry = self.handles.resolve(handle)?;
        self.check_version(entry.node, version)?;
        Ok(self.graph.referrers(NodeVersion::new(entry.node, version)))
    }

    /// Describes the node and version `handle` currently refers to.
    pub fn node_info(&self, handle: Handle) -> KernelResult<NodeInfo> {
        let entry = self.handles.resolve(handle)?;
        let node = self.nodes.snapshot(entry.node)?;
        let state = match entry.version {
            Some(pinned) => node
                .version_state(pinned)
                .ok_or(KernelError::InvalidVersion {
                    target: node.id,
                    requested: pinned,
                    current: node.current_version(),
                })?,
            None => node.current(),
        };
        Ok(NodeInfo {
            handle,
            kind: entry.kind,
            node: node.id,
            origin: node.origin,
            adjacent: node.adjacent,
            version: state.number,
            frozen: state.frozen,
            pinned: entry.version.is_some(),
        })
    }

    /// Writes the node behind `handle`, all its versions and edges to storage.
    ///
    /// Safe to repeat; already-synced edges are not duplicated.
    ///
    /// # Errors
    /// - `StorageDisabled` when no database is configured.
    /// - `Storage` on SQLite failures.
    pub fn sync(&self, handle: Handle) -> KernelResult<()> {
        let storage = self.storage.as_ref().ok_or(KernelError::StorageDisabled)?;
        let entry = self.handles.resolve(handle)?;
        let started_at = Instant::now();

        let (node, logs) = self.nodes.with_node(entry.node, |record| {
            let logs = record
                .versions()
                .iter()
                .map(|state| {
                    let edges = self
                        .graph
                        .edges(NodeVersion::new(record.id, state.number))
                        .to_vec();
                    (state.number, edges)
                })
                .collect::<Vec<VersionLog>>();
            Ok((record.clone(), logs))
        })?;

        let conn = storage.lock().unwrap_or_else(PoisonError::into_inner);
        let result = SqliteProvenanceRepository::new(&conn).save_node(&node, &logs);
        match result {
            Ok(()) => {
                info!(
                    "event=node_sync module=kernel status=ok handle={} versions={} duration_ms={}",
                    handle.raw(),
                    logs.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=node_sync module=kernel status=error handle={} duration_ms={} error={err}",
                    handle.raw(),
                    started_at.elapsed().as_millis()
                );
                Err(err.into())
            }
        }
    }

    /// Hands out a fresh node handle for an existing node identity.
    ///
    /// Nodes unknown in memory are loaded from storage when configured.
    /// `VersionSelector::Exact` pins the handle: reads see that version, and
    /// appends through it follow the freeze policy once the node has moved
    /// past it.
    ///
    /// # Errors
    /// - `NodeNotFound` when the node exists neither in memory nor storage.
    /// - `InvalidVersion` when `version` does not exist on the node.
    pub fn revive(&self, node: NodeId, version: VersionSelector) -> KernelResult<Handle> {
        if !self.nodes.contains(node) {
            self.restore_from_storage(node)?;
        }
        let entry = match version {
            VersionSelector::Latest => HandleEntry::new(HandleKind::Node, node),
            VersionSelector::Exact(requested) => {
                self.check_version(node, requested)?;
                HandleEntry::pinned(HandleKind::Node, node, requested)
            }
        };

        let handle = self.handles.reserve()?;
        self.handles.bind(handle, entry);
        info!(
            "event=node_revive module=kernel status=ok handle={} pinned={}",
            handle.raw(),
            entry.version.is_some()
        );
        Ok(handle)
    }

    /// Rendered provtrace, when tracing is enabled.
    pub fn trace_text(&self) -> Option<String> {
        self.trace.as_ref().map(ProvTrace::render)
    }

    pub fn live_handles(&self) -> usize {
        self.handles.live_count()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn append(
        &self,
        source: &HandleEntry,
        key: &str,
        value: EdgeValue,
        record_trace: impl FnOnce(&ProvTrace),
    ) -> KernelResult<NodeVersion> {
        let policy = self.config.freeze_policy;
        self.nodes.with_node(source.node, |record| {
            Self::check_pinned_source(record, source, policy)?;
            if record.is_frozen() && policy == FreezePolicy::NewVersion {
                let opened = record
                    .open_next_version()
                    .ok_or(KernelError::ResourceExhausted { limit: Version::MAX })?;
                debug!("event=version_open module=kernel status=ok version={opened}");
            }
            self.graph.append(record, key, value)?;
            if let Some(trace) = &self.trace {
                record_trace(trace);
            }
            Ok(record.current_node_version())
        })
    }

    /// A pin older than the current version names a frozen version.
    fn check_pinned_source(
        record: &PNode,
        source: &HandleEntry,
        policy: FreezePolicy,
    ) -> KernelResult<()> {
        match source.version {
            Some(pinned)
                if pinned != record.current_version() && policy == FreezePolicy::Reject =>
            {
                Err(KernelError::SourceFrozen(NodeVersion::new(record.id, pinned)))
            }
            _ => Ok(()),
        }
    }

    fn handle_version(&self, handle: Handle) -> KernelResult<NodeVersion> {
        let entry = self.handles.resolve(handle)?;
        let version = match entry.version {
            Some(pinned) => pinned,
            None => self.nodes.current_version(entry.node)?,
        };
        Ok(NodeVersion::new(entry.node, version))
    }

    fn check_version(&self, node: NodeId, requested: Version) -> KernelResult<()> {
        let current = self.nodes.current_version(node)?;
        if requested > current {
            return Err(KernelError::InvalidVersion {
                target: node,
                requested,
                current,
            });
        }
        Ok(())
    }

    fn restore_from_storage(&self, node: NodeId) -> KernelResult<()> {
        let Some(storage) = self.storage.as_ref() else {
            return Err(KernelError::NodeNotFound(node));
        };

        let stored = {
            let conn = storage.lock().unwrap_or_else(PoisonError::into_inner);
            SqliteProvenanceRepository::new(&conn).load_node(node)?
        };
        let stored = stored.ok_or(KernelError::NodeNotFound(node))?;

        for (version, edges) in stored.logs {
            self.graph.restore(NodeVersion::new(node, version), edges);
        }
        self.nodes.insert_restored(stored.node);
        debug!("event=node_restore module=kernel status=ok node={node}");
        Ok(())
    }
}
