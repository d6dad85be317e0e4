//! emfbuf Lambda integration.
//!
//! Wires the core buffer to its collaborators: configuration from YAML or the
//! environment, the process-wide cold start flag, and the flush orchestrator
//! that runs a handler and publishes its metrics afterwards.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod cold_start;
pub mod config;
pub mod orchestrator;

pub use cold_start::ColdStartTracker;
pub use config::MetricsConfig;
pub use orchestrator::{FlushOptions, FlushOrchestrator, FlushOutcome, InvokeError};
