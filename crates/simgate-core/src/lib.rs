//! Core runtime pieces of a Simgate host node.
//!
//! - [`config`]: typed YAML configuration with environment overrides
//! - [`state`]: the live [`SimulationState`] (players, worlds, messages)
//! - [`context`]: the single-threaded [`ExecutionContext`] that alone owns
//!   the live state, plus the [`ContextHandle`] used to marshal work onto it
//! - [`telemetry`]: `tracing` subscriber installation for the binaries
//!
//! # Architecture
//!
//! The simulation state is never shared behind a lock. HTTP handlers and
//! bridge workers post closures to the execution context and await a
//! oneshot completion signal, bounded by a handoff timeout.

pub mod config;
pub mod context;
pub mod state;
pub mod telemetry;

pub use config::{ConfigError, HostConfig, LoggingConfig};
pub use context::{ContextError, ContextHandle, ExecutionContext};
pub use state::{ChatMessage, MessageQuery, Player, SimulationState, World};
pub use telemetry::init_tracing;
