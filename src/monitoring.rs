//! Self-monitoring counters for the watcher
//!
//! Tracks how many lines were seen and what happened to them, plus alert
//! outcomes, so an operator can tell a quiet log from a broken pipeline.

use chrono::{DateTime, Utc};
use log::info;

/// Running totals kept by the [`crate::watcher::Watcher`]
#[derive(Debug, Clone, PartialEq)]
pub struct WatcherStats {
    /// When counting started
    pub started_at: DateTime<Utc>,
    /// Lines parsed and fed to the detectors
    pub records_processed: u64,
    /// Blank lines and lines that are not JSON objects
    pub lines_skipped: u64,
    /// Lines that looked like JSON but failed to parse
    pub lines_malformed: u64,
    /// Pool changes observed
    pub failovers: u64,
    /// Error-rate alerts that passed the cooldown gate
    pub error_rate_alerts_fired: u64,
    /// Error-rate alerts dropped by the cooldown gate
    pub error_rate_alerts_suppressed: u64,
    /// Webhook deliveries that returned an error
    pub delivery_failures: u64,
}

impl Default for WatcherStats {
    fn default() -> Self {
        Self::new()
    }
}

impl WatcherStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            records_processed: 0,
            lines_skipped: 0,
            lines_malformed: 0,
            failovers: 0,
            error_rate_alerts_fired: 0,
            error_rate_alerts_suppressed: 0,
            delivery_failures: 0,
        }
    }

    /// Total lines handed to the watcher
    pub fn lines_seen(&self) -> u64 {
        self.records_processed + self.lines_skipped + self.lines_malformed
    }

    /// Log a one-line summary at info level
    pub fn log_summary(&self) {
        let uptime = Utc::now() - self.started_at;
        info!(
            "Watcher summary after {}s: {} lines ({} records, {} skipped, {} malformed), \
             {} failovers, {} error-rate alerts ({} suppressed), {} delivery failures",
            uptime.num_seconds(),
            self.lines_seen(),
            self.records_processed,
            self.lines_skipped,
            self.lines_malformed,
            self.failovers,
            self.error_rate_alerts_fired,
            self.error_rate_alerts_suppressed,
            self.delivery_failures
        );
    }
}
