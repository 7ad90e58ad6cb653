//! Optional parameters for kernel operations.

use crate::model::handle::Handle;
use crate::model::pnode::Version;

/// Which version of a target node an operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionSelector {
    /// The node's current version at the time of the call.
    #[default]
    Latest,
    /// A specific existing version.
    Exact(Version),
}

impl From<Option<Version>> for VersionSelector {
    fn from(value: Option<Version>) -> Self {
        value.map_or(Self::Latest, Self::Exact)
    }
}

/// Options for `Kernel::create_node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreateNodeOptions {
    /// Existing node the new one is placed in front of.
    pub adjacent: Option<Handle>,
}

impl CreateNodeOptions {
    pub fn adjacent_to(handle: Handle) -> Self {
        Self {
            adjacent: Some(handle),
        }
    }
}

/// Options for `Kernel::add_xref`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XRefOptions {
    pub version: VersionSelector,
}

impl XRefOptions {
    pub fn pinned(version: Version) -> Self {
        Self {
            version: VersionSelector::Exact(version),
        }
    }
}
