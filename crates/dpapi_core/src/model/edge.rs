//! Ancestry edge model.
//!
//! # Responsibility
//! - Define keyed edges attached to one node version.
//! - Validate edge keys before they reach the graph.
//!
//! # Invariants
//! - Edges are immutable once appended.
//! - Edges refer to nodes by `NodeId`, never by handle, so releasing a
//!   handle does not disturb recorded ancestry.

use crate::model::pnode::{NodeId, NodeVersion, Version};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Payload of one ancestry edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EdgeValue {
    /// Cross-reference to a specific version of another node.
    Reference { target: NodeId, version: Version },
    /// String annotation stored under the same keyed abstraction.
    Literal { value: String },
}

impl EdgeValue {
    pub fn reference(target: NodeId, version: Version) -> Self {
        Self::Reference { target, version }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference { .. })
    }
}

/// One appended provenance fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeVersion,
    pub key: String,
    pub value: EdgeValue,
}

impl Edge {
    pub fn new(source: NodeVersion, key: impl Into<String>, value: EdgeValue) -> Self {
        Self {
            source,
            key: key.into(),
            value,
        }
    }

    /// Returns the referenced `(node, version)` for reference edges.
    pub fn target(&self) -> Option<NodeVersion> {
        match self.value {
            EdgeValue::Reference { target, version } => Some(NodeVersion::new(target, version)),
            EdgeValue::Literal { .. } => None,
        }
    }
}

/// Edge key validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValidationError {
    Empty,
    ContainsWhitespace(String),
}

impl Display for KeyValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "edge key must not be empty"),
            Self::ContainsWhitespace(key) => {
                write!(f, "edge key must not contain whitespace: {key:?}")
            }
        }
    }
}

impl Error for KeyValidationError {}

/// Checks that `key` can be stored and rendered in a provtrace line.
pub fn validate_key(key: &str) -> Result<(), KeyValidationError> {
    if key.is_empty() {
        return Err(KeyValidationError::Empty);
    }
    if key.chars().any(char::is_whitespace) {
        return Err(KeyValidationError::ContainsWhitespace(key.to_string()));
    }
    Ok(())
}
