//! Relay engine for Avatar Relay.
//!
//! Sits between a host (anything that can enumerate participants and
//! deliver bytes on a named channel) and the wire protocol. It forwards
//! every client message to the other participants, remembers which model
//! each participant selected, and brings late joiners up to date.
//!
//! # Key types
//!
//! - [`RelayEngine`]: join, message and disconnect handling
//! - [`Host`] / [`Scheduler`]: what the engine needs from its runtime
//! - [`ModelCache`]: participant id → selected model name
//! - [`EngineConfig`] / [`TraceConfig`]: join delay and verbose tracing

mod cache;
mod config;
mod engine;
mod host;

pub use cache::ModelCache;
pub use config::{hex_preview, EngineConfig, TraceConfig};
pub use engine::{Dispatch, RelayEngine};
pub use host::{Host, Scheduler, Task, TokioScheduler};
