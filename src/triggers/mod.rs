/// Detectors that decide when an alert is warranted
pub mod error_rate;
pub mod failover;

pub use error_rate::{ErrorRateEstimator, StatusWindow};
pub use failover::FailoverDetector;
