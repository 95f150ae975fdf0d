//! Sliding-window server-error rate estimation
//!
//! The estimator keeps the most recent `capacity` status codes and reports the
//! share of 5xx responses among them. Eviction happens explicitly on insert so
//! the window never grows past its capacity.

use crate::events::{is_server_error, ErrorRateEvent};
use std::collections::VecDeque;

/// Fixed-capacity FIFO of recent status codes
#[derive(Debug)]
pub struct StatusWindow {
    statuses: VecDeque<String>,
    capacity: usize,
}

impl StatusWindow {
    /// Create an empty window holding at most `capacity` samples
    ///
    /// A zero capacity is clamped to one so the window can always hold the
    /// latest sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            statuses: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a status, evicting the oldest one if the window is full
    ///
    /// # Returns
    ///
    /// The evicted status, if any
    pub fn push(&mut self, status: String) -> Option<String> {
        let evicted = if self.statuses.len() >= self.capacity {
            self.statuses.pop_front()
        } else {
            None
        };
        self.statuses.push_back(status);
        evicted
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of 5xx statuses currently held
    pub fn error_count(&self) -> usize {
        self.statuses.iter().filter(|s| is_server_error(s)).count()
    }

    /// Statuses from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.statuses.iter().map(String::as_str)
    }
}

/// Threshold check over a [`StatusWindow`]
#[derive(Debug)]
pub struct ErrorRateEstimator {
    window: StatusWindow,
    /// Alert when the error percentage is strictly above this value
    threshold_percent: f64,
}

impl ErrorRateEstimator {
    /// Create a new estimator
    ///
    /// # Arguments
    ///
    /// * `window_size` - Number of most recent statuses to consider
    /// * `threshold_percent` - Error percentage (0-100) above which to alert
    pub fn new(window_size: usize, threshold_percent: f64) -> Self {
        Self {
            window: StatusWindow::new(window_size),
            threshold_percent,
        }
    }

    /// Record the status of one request
    pub fn record(&mut self, status: impl Into<String>) {
        self.window.push(status.into());
    }

    /// Current error percentage, `None` while the window is empty
    pub fn error_rate(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.window.error_count() as f64 / self.window.len() as f64 * 100.0)
    }

    /// Check the window against the threshold without modifying it
    ///
    /// # Returns
    ///
    /// `Some(ErrorRateEvent)` if the current rate is above the threshold
    pub fn evaluate(&self) -> Option<ErrorRateEvent> {
        let rate = self.error_rate()?;
        (rate > self.threshold_percent).then(|| ErrorRateEvent {
            rate,
            window_len: self.window.len(),
        })
    }

    pub fn window(&self) -> &StatusWindow {
        &self.window
    }

    pub fn threshold_percent(&self) -> f64 {
        self.threshold_percent
    }
}
