//! Core identifiers, detail values, clocks, and errors for Quiesce.
//!
//! This crate provides:
//! - [`TimelineId`], [`TimerHandle`], [`RequestId`] - Engine and host identifiers
//! - [`NodeId`] - Generational UI-tree node identifiers
//! - [`DetailValue`] / [`Detail`] - Free-form mark detail
//! - [`Clock`] / [`MemoryProbe`] - Host time and heap capabilities
//! - [`Error`] - Rich error types with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod clock;
pub mod detail;
pub mod error;
pub mod ids;
pub mod node;

pub use clock::{Clock, MemoryProbe, MemorySnapshot};
pub use detail::{Detail, DetailValue};
pub use error::{Error, ErrorKind, Result};
pub use ids::{RequestId, TimelineId, TimerHandle};
pub use node::NodeId;
