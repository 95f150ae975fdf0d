//! Core event types for the pool watcher
//!
//! This module defines the parsed access-log record and the two alert events
//! the detectors can raise, along with the notification text for each.

use crate::error::CollectorError;
use serde_json::{Map, Value};

/// Pool name used when a record carries no `pool` field
pub const UNKNOWN_POOL: &str = "unknown";

/// Status used when a record carries no `status` field
pub const MISSING_STATUS: &str = "0";

/// A single structured access-log entry
///
/// Only the two fields the detectors care about are kept; everything else in
/// the JSON object is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Backend pool that served the request
    pub pool: String,
    /// Response status, stringified
    pub status: String,
}

impl LogRecord {
    /// Parse one JSON access-log line
    ///
    /// Missing or null fields fall back to [`UNKNOWN_POOL`] / [`MISSING_STATUS`].
    /// Numbers are rendered in decimal and any other JSON value is kept as its
    /// JSON text, so `"status": 502` and `"status": "502"` classify the same way.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::ParseError` if the line is not valid JSON or
    /// its top-level value is not an object.
    pub fn from_json(line: &str) -> Result<Self, CollectorError> {
        let value: Value = serde_json::from_str(line.trim())
            .map_err(|e| CollectorError::ParseError(e.to_string()))?;

        let Value::Object(fields) = value else {
            return Err(CollectorError::ParseError(
                "expected a JSON object".to_string(),
            ));
        };

        Ok(Self {
            pool: field_as_string(&fields, "pool", UNKNOWN_POOL),
            status: field_as_string(&fields, "status", MISSING_STATUS),
        })
    }

    /// Whether the status belongs to the 5xx server-error class
    pub fn is_server_error(&self) -> bool {
        is_server_error(&self.status)
    }
}

/// Classify a status by its leading digit
pub fn is_server_error(status: &str) -> bool {
    status.starts_with('5')
}

fn field_as_string(fields: &Map<String, Value>, key: &str, default: &str) -> String {
    match fields.get(key) {
        None | Some(Value::Null) => default.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// The active pool changed between two consecutive records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverEvent {
    pub from: String,
    pub to: String,
}

impl FailoverEvent {
    /// Notification text for this failover
    pub fn message(&self) -> String {
        format!(
            ":rotating_light: Failover detected! Pool switched from {} to {}",
            self.from, self.to
        )
    }
}

/// Server-error rate over the sliding window exceeded the threshold
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRateEvent {
    /// Error percentage (0-100)
    pub rate: f64,
    /// Number of samples the rate was computed over
    pub window_len: usize,
}

impl ErrorRateEvent {
    /// Notification text for this error-rate breach
    pub fn message(&self) -> String {
        format!(
            ":warning: High error rate detected — {:.2}% of last {} requests.",
            self.rate, self.window_len
        )
    }
}
