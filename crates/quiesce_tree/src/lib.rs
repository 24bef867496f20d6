//! UI tree arena, mutation records, and tree inspection for Quiesce.
//!
//! This crate provides:
//! - [`TreeInspector`] - Read-only walks the engine performs over a host tree
//! - [`MutationRecord`] - Batched structural and attribute change notifications
//! - [`Tree`] - An in-memory generational tree that records its own mutations

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod inspect;
pub mod mutation;
pub mod tree;

pub use inspect::TreeInspector;
pub use mutation::{MutationKind, MutationRecord};
pub use tree::{Node, NodeKind, Tree};
