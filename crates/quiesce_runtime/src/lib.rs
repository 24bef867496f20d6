//! Deterministic host runtime for Quiesce.
//!
//! This crate provides:
//! - [`SimHost`] - A simulated host with virtual time, timers, network and a UI tree
//! - [`EventLoop`] - Turn-by-turn execution with mutation delivery between turns
//! - [`VirtualClock`] - Microsecond-resolution virtual time
//! - [`SimNetwork`] - Routed fake network with a resource timing buffer

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod clock;
pub mod event_loop;
pub mod host;
pub mod network;

pub use clock::VirtualClock;
pub use event_loop::EventLoop;
pub use host::{EventHandler, SimHost};
pub use network::{Route, SimNetwork};
