//! Infrastructure - configuration, metrics and signals
//!
//! - `config` - Application configuration (TOML loading, env overrides, validation)
//! - `metrics` - Lock-free metrics collection
//! - `signal` - SIGINT/SIGTERM handling for graceful shutdown

pub mod config;
pub mod metrics;
pub mod signal;

// Re-export commonly used types
pub use config::{AtHomePolicy, Config, TransitionalPolicy};
pub use metrics::Metrics;
pub use signal::ShutdownSignals;
