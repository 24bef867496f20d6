//! Causal-chain reconstruction for Quiesce.
//!
//! This crate provides:
//! - [`Engine`] - The instrumentation facade (start/stop/mark/pop)
//! - [`Scope`] - Intercepted timer and network primitives for host callbacks
//! - [`TimelineRegistry`] - Timeline identity and lifecycle
//! - [`PendingWork`] - Reference counts of in-flight work per timeline
//! - [`ChainDetector`] - Runaway timer-chain detection
//! - [`correlator`] - Mutation batches to render marks, detached-label recovery
//! - [`Dispatcher`] - Exactly-once reporting of quiesced timelines

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod chain;
pub mod config;
pub mod correlator;
pub mod dispatch;
pub mod engine;
pub mod host;
pub mod labels;
pub mod mark;
pub mod network;
pub mod pending;
pub mod scope;
pub mod timeline;

#[cfg(test)]
pub(crate) mod testing;

pub use chain::{ChainDetector, ChainVerdict, IntervalFiring, IntervalPolicy};
pub use config::{EngineConfig, NetworkDetailHook};
pub use correlator::RenderSummary;
pub use dispatch::{CompletionCallback, Dispatcher, TimelineReport};
pub use engine::Engine;
pub use host::{
    Host, HostEnv, HostIntervalCallback, HostSettleCallback, HostTimerCallback, NetworkTransport,
    TimerProvider,
};
pub use labels::{AncestorWalk, Labeler};
pub use mark::{Mark, MarkName, MarkStore, MarkStoreStats};
pub use network::{ResourceTiming, Settlement, TimingPhase};
pub use pending::{PendingWork, WorkId};
pub use scope::Scope;
pub use timeline::{
    HeapUsage, Timeline, TimelineRegistry, TimelineSeed, TimelineState, Trigger, TriggerEvent,
};
