//! Quiesce - causal-chain reconstruction for cooperative runtimes
//!
//! This crate re-exports all layers of the Quiesce system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: quiesce_runtime    — Deterministic host, event loop, virtual time
//! Layer 2: quiesce_engine     — Timelines, pending work, marks, dispatch
//! Layer 1: quiesce_tree       — UI tree arena, mutation records
//! Layer 0: quiesce_foundation — Core types (ids, Detail, Clock, Error)
//! ```

pub use quiesce_engine as engine;
pub use quiesce_foundation as foundation;
pub use quiesce_runtime as runtime;
pub use quiesce_tree as tree;
