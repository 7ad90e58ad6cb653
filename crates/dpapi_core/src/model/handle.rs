//! Process-local handle model.
//!
//! # Responsibility
//! - Define the integer handle callers use for open files and P-nodes.
//! - Name which kind of object a handle is bound to.
//!
//! # Invariants
//! - Valid handles are non-negative; negative values are status codes.
//! - A handle value is never reused within one kernel instance.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Opaque integer identifier for an open file or a provenance node.
///
/// Kept as `i32` so the value crosses a C/JNI boundary unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(i32);

impl Handle {
    /// Wraps a raw value without validating it.
    ///
    /// Resolution through the handle table is what decides validity.
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Returns whether the raw value could ever name an allocated handle.
    pub const fn is_well_formed(self) -> bool {
        self.0 >= 0
    }
}

impl Display for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "fd{}", self.0)
    }
}

/// Object kind a handle is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleKind {
    /// Handle returned by `open_file`; backed by an OS file.
    File,
    /// Handle returned by `create_node` or `revive`.
    Node,
}

impl HandleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Node => "node",
        }
    }
}
