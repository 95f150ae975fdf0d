/// Error types for the pool watcher
pub mod error;

/// Parsed log records and alert events
pub mod events;

/// Access-log tailing
pub mod collectors;

/// Failover and error-rate detectors
pub mod triggers;

/// Alert cooldown and webhook delivery
pub mod alerts;

/// Configuration management
pub mod config;

/// Self-monitoring counters
pub mod monitoring;

/// Per-line detection pipeline
pub mod watcher;

// Re-export commonly used types
pub use config::Config;
pub use error::{AlertError, CollectorError, ConfigError};
pub use watcher::{LineOutcome, Watcher};
