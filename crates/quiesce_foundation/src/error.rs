//! Error types for the Quiesce system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use thiserror::Error;

use crate::ids::TimelineId;
use crate::node::NodeId;

/// The main error type for Quiesce operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<String>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Creates a node not found error.
    #[must_use]
    pub fn node_not_found(id: NodeId) -> Self {
        Self::new(ErrorKind::NodeNotFound(id))
    }

    /// Creates a stale node reference error.
    #[must_use]
    pub fn stale_node(id: NodeId) -> Self {
        Self::new(ErrorKind::StaleNode(id))
    }

    /// Creates an invalid label pattern error.
    #[must_use]
    pub fn invalid_pattern(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPattern(message.into()))
    }

    /// Creates an attribution mismatch error.
    #[must_use]
    pub fn attribution_mismatch(expected: TimelineId, actual: Option<TimelineId>) -> Self {
        Self::new(ErrorKind::AttributionMismatch { expected, actual })
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Node was never allocated or has been freed.
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Node reference is stale (generation mismatch).
    #[error("stale node reference: {0:?}")]
    StaleNode(NodeId),

    /// Appending would make a node its own ancestor.
    #[error("cannot append {child:?} under its descendant {parent:?}")]
    HierarchyCycle {
        /// The intended parent.
        parent: NodeId,
        /// The node being appended.
        child: NodeId,
    },

    /// Operation requires an element but the node is text.
    #[error("not an element: {0:?}")]
    NotAnElement(NodeId),

    /// Label filter pattern failed to compile.
    #[error("invalid label pattern: {0}")]
    InvalidPattern(String),

    /// A completion resolved to a different timeline than the one it was
    /// registered against.
    #[error("completion for {expected} resolved to {actual:?}")]
    AttributionMismatch {
        /// The timeline the work was registered against.
        expected: TimelineId,
        /// The timeline the completion actually resolved to.
        actual: Option<TimelineId>,
    },

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for Quiesce operations.
pub type Result<T> = std::result::Result<T, Error>;
