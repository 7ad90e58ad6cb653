//! Handle allocation and resolution.
//!
//! # Responsibility
//! - Hand out process-local integer handles for files and P-nodes.
//! - Resolve handles to the node identity they are bound to.
//!
//! # Invariants
//! - Handle numbers come from one atomic counter and are never reused.
//! - A released handle fails every later `resolve` and `release`.
//! - A reserved number resolves only after `bind`; an unbound reservation
//!   is simply never handed out.

use crate::kernel::error::{KernelError, KernelResult};
use crate::model::handle::{Handle, HandleKind};
use crate::model::pnode::{NodeId, Version};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{PoisonError, RwLock};

/// What a live handle is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleEntry {
    pub kind: HandleKind,
    pub node: NodeId,
    /// Version the handle is pinned to; `None` follows the node's current version.
    pub version: Option<Version>,
}

impl HandleEntry {
    pub fn new(kind: HandleKind, node: NodeId) -> Self {
        Self {
            kind,
            node,
            version: None,
        }
    }

    pub fn pinned(kind: HandleKind, node: NodeId, version: Version) -> Self {
        Self {
            kind,
            node,
            version: Some(version),
        }
    }
}

/// Handle table shared by all kernel operations.
#[derive(Debug)]
pub struct HandleTable {
    next: AtomicI32,
    limit: u32,
    entries: RwLock<HashMap<Handle, HandleEntry>>,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::with_limit(i32::MAX as u32)
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table that hands out at most `limit` handles in its lifetime.
    pub fn with_limit(limit: u32) -> Self {
        Self {
            next: AtomicI32::new(0),
            limit: limit.min(i32::MAX as u32),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Allocates a fresh handle bound to `node`.
    ///
    /// # Errors
    /// - `ResourceExhausted` once `limit` handles have been handed out.
    pub fn allocate(&self, kind: HandleKind, node: NodeId) -> KernelResult<Handle> {
        let handle = self.reserve()?;
        self.bind(handle, HandleEntry::new(kind, node));
        Ok(handle)
    }

    /// Takes the next handle number without making it resolvable.
    ///
    /// Lets callers fail on exhaustion before creating anything the
    /// handle would point at.
    pub fn reserve(&self) -> KernelResult<Handle> {
        let limit = self.limit;
        self.next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current as u32 >= limit {
                    None
                } else {
                    Some(current + 1)
                }
            })
            .map(Handle::from_raw)
            .map_err(|_| KernelError::ResourceExhausted { limit })
    }

    /// Makes a reserved handle resolvable.
    pub fn bind(&self, handle: Handle, entry: HandleEntry) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, entry);
    }

    /// Resolves a live handle.
    ///
    /// # Errors
    /// - `InvalidHandle` when the handle is negative, unknown or released.
    pub fn resolve(&self, handle: Handle) -> KernelResult<HandleEntry> {
        if !handle.is_well_formed() {
            return Err(KernelError::InvalidHandle(handle));
        }
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle)
            .copied()
            .ok_or(KernelError::InvalidHandle(handle))
    }

    /// Releases a live handle and returns what it was bound to.
    pub fn release(&self, handle: Handle) -> KernelResult<HandleEntry> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle)
            .ok_or(KernelError::InvalidHandle(handle))
    }

    /// Number of handles currently live.
    pub fn live_count(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
