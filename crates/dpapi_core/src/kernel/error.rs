//! Kernel error taxonomy and status codes.
//!
//! # Invariants
//! - Every error maps to one stable negative status code.
//! - Codes never change meaning once published to callers.

use crate::db::DbError;
use crate::model::edge::KeyValidationError;
use crate::model::handle::Handle;
use crate::model::pnode::{NodeId, NodeVersion, Version};
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type KernelResult<T> = Result<T, KernelError>;

pub const CODE_INIT_FAILURE: i32 = -1;
pub const CODE_INVALID_HANDLE: i32 = -2;
pub const CODE_RESOURCE_EXHAUSTED: i32 = -3;
pub const CODE_SOURCE_FROZEN: i32 = -4;
pub const CODE_INVALID_VERSION: i32 = -5;
pub const CODE_INVALID_KEY: i32 = -6;
pub const CODE_IO: i32 = -7;
pub const CODE_STORAGE: i32 = -8;

/// Failure of a kernel operation.
#[derive(Debug)]
pub enum KernelError {
    /// Kernel could not be constructed or is not initialized.
    InitFailure(String),
    /// Handle is negative, never allocated, or already released.
    InvalidHandle(Handle),
    /// Unknown node identity passed to `revive`.
    NodeNotFound(NodeId),
    /// No more handle numbers are available.
    ResourceExhausted { limit: u32 },
    /// Append attempted on a frozen version.
    SourceFrozen(NodeVersion),
    /// Pinned version does not exist on the target node.
    InvalidVersion {
        target: NodeId,
        requested: Version,
        current: Version,
    },
    InvalidKey(KeyValidationError),
    Io(std::io::Error),
    /// Persistence is not configured.
    StorageDisabled,
    Storage(RepoError),
}

impl KernelError {
    /// Stable negative status code for boundary callers.
    pub fn code(&self) -> i32 {
        match self {
            Self::InitFailure(_) => CODE_INIT_FAILURE,
            Self::InvalidHandle(_) | Self::NodeNotFound(_) => CODE_INVALID_HANDLE,
            Self::ResourceExhausted { .. } => CODE_RESOURCE_EXHAUSTED,
            Self::SourceFrozen(_) => CODE_SOURCE_FROZEN,
            Self::InvalidVersion { .. } => CODE_INVALID_VERSION,
            Self::InvalidKey(_) => CODE_INVALID_KEY,
            Self::Io(_) => CODE_IO,
            Self::StorageDisabled | Self::Storage(_) => CODE_STORAGE,
        }
    }

    /// Short stable label used in log events.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InitFailure(_) => "init_failure",
            Self::InvalidHandle(_) | Self::NodeNotFound(_) => "invalid_handle",
            Self::ResourceExhausted { .. } => "resource_exhausted",
            Self::SourceFrozen(_) => "source_frozen",
            Self::InvalidVersion { .. } => "invalid_version",
            Self::InvalidKey(_) => "invalid_key",
            Self::Io(_) => "io",
            Self::StorageDisabled | Self::Storage(_) => "storage",
        }
    }
}

impl Display for KernelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InitFailure(message) => write!(f, "kernel initialization failed: {message}"),
            Self::InvalidHandle(handle) => write!(f, "invalid handle: {}", handle.raw()),
            Self::NodeNotFound(id) => write!(f, "p-node not found: {id}"),
            Self::ResourceExhausted { limit } => {
                write!(f, "no handles left (limit {limit})")
            }
            Self::SourceFrozen(source) => write!(f, "p-node version is frozen: {source}"),
            Self::InvalidVersion {
                target,
                requested,
                current,
            } => write!(
                f,
                "version {requested} of p-node {target} does not exist (current {current})"
            ),
            Self::InvalidKey(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::StorageDisabled => write!(f, "persistence is not configured"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for KernelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidKey(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<KeyValidationError> for KernelError {
    fn from(value: KeyValidationError) -> Self {
        Self::InvalidKey(value)
    }
}

impl From<std::io::Error> for KernelError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<RepoError> for KernelError {
    fn from(value: RepoError) -> Self {
        Self::Storage(value)
    }
}

impl From<DbError> for KernelError {
    fn from(value: DbError) -> Self {
        Self::Storage(RepoError::Db(value))
    }
}
