//! Per-line detection pipeline
//!
//! The [`Watcher`] owns every piece of mutable detection state and is driven
//! one line at a time by the [`LogTailer`]: parse, check for failover, record
//! the status, then check the error rate. Failover alerts go straight to the
//! notifier; error-rate alerts pass through the cooldown gate first.

use crate::alerts::{AlertGate, Notifier};
use crate::collectors::LogTailer;
use crate::config::{Config, ALERT_COOLDOWN_SEC};
use crate::error::{AlertError, CollectorError, ConfigError};
use crate::events::{ErrorRateEvent, FailoverEvent, LogRecord};
use crate::monitoring::WatcherStats;
use crate::triggers::{ErrorRateEstimator, FailoverDetector};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::cell::Cell;

/// What happened to a single input line
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Blank, or not the start of a JSON object
    Skipped,
    /// Looked like JSON but failed to parse
    Malformed,
    /// Parsed and fed to the detectors
    Processed(RecordOutcome),
}

/// Detector results for one parsed record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    /// Pool change detected on this record
    pub failover: Option<FailoverEvent>,
    /// Error rate above threshold after recording this status
    pub error_rate: Option<ErrorRateEvent>,
    /// Whether the error-rate alert got past the cooldown gate
    pub error_rate_alert_fired: bool,
}

/// Detection state plus the sink alerts are delivered to
pub struct Watcher<N: Notifier> {
    failover: FailoverDetector,
    estimator: ErrorRateEstimator,
    gate: AlertGate,
    notifier: N,
    stats: WatcherStats,
}

impl<N: Notifier> Watcher<N> {
    /// Build a watcher from configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the cooldown does not fit a signed duration.
    pub fn new(config: &Config, notifier: N) -> Result<Self, ConfigError> {
        let cooldown = chrono::Duration::from_std(config.alert_cooldown).map_err(|e| {
            ConfigError::invalid(
                ALERT_COOLDOWN_SEC,
                &config.alert_cooldown.as_secs().to_string(),
                e.to_string(),
            )
        })?;

        Ok(Self::with_components(
            FailoverDetector::new(),
            ErrorRateEstimator::new(config.window_size, config.error_rate_threshold),
            AlertGate::new(cooldown),
            notifier,
        ))
    }

    pub fn with_components(
        failover: FailoverDetector,
        estimator: ErrorRateEstimator,
        gate: AlertGate,
        notifier: N,
    ) -> Self {
        Self {
            failover,
            estimator,
            gate,
            notifier,
            stats: WatcherStats::new(),
        }
    }

    /// Feed every line from `tailer` through the pipeline until it stops
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the tailer; bad input never ends the loop.
    pub fn run(&mut self, tailer: &LogTailer) -> Result<(), CollectorError> {
        info!("Watching {}", tailer.path().display());
        tailer.run(|bytes| {
            self.process_bytes_at(Utc::now(), bytes);
        })
    }

    /// Handle one line as read from the file, before text decoding
    ///
    /// Lines that are not valid UTF-8 count as malformed.
    pub fn process_bytes_at(&mut self, now: DateTime<Utc>, bytes: &[u8]) -> LineOutcome {
        match std::str::from_utf8(bytes) {
            Ok(line) => self.process_line_at(now, line),
            Err(e) => {
                warn!(
                    "Skipping malformed line ({}): {}",
                    e,
                    String::from_utf8_lossy(bytes)
                );
                self.stats.lines_malformed += 1;
                LineOutcome::Malformed
            }
        }
    }

    /// Handle one raw line from the log
    pub fn process_line(&mut self, line: &str) -> LineOutcome {
        self.process_line_at(Utc::now(), line)
    }

    /// Handle one raw line as of a specific time
    ///
    /// This is primarily used for testing with controlled timestamps.
    pub fn process_line_at(&mut self, now: DateTime<Utc>, line: &str) -> LineOutcome {
        let line = line.trim();
        if line.is_empty() {
            debug!("Skipping blank line");
            self.stats.lines_skipped += 1;
            return LineOutcome::Skipped;
        }
        if !line.starts_with('{') {
            debug!("Skipping non-JSON line: {}", line);
            self.stats.lines_skipped += 1;
            return LineOutcome::Skipped;
        }

        match LogRecord::from_json(line) {
            Ok(record) => LineOutcome::Processed(self.process_record_at(now, &record)),
            Err(e) => {
                warn!("Skipping malformed line ({}): {}", e, line);
                self.stats.lines_malformed += 1;
                LineOutcome::Malformed
            }
        }
    }

    /// Run a parsed record through both detectors
    pub fn process_record_at(&mut self, now: DateTime<Utc>, record: &LogRecord) -> RecordOutcome {
        self.stats.records_processed += 1;
        let notifier = FailureCounter::new(&self.notifier);

        let failover = self.failover.update(&record.pool);
        if let Some(event) = &failover {
            info!("Failover from {} to {}", event.from, event.to);
            self.stats.failovers += 1;
            if let Err(e) = notifier.send(&event.message()) {
                warn!("Failed to deliver failover alert: {}", e);
            }
        }

        self.estimator.record(record.status.as_str());
        let error_rate = self.estimator.evaluate();
        let mut error_rate_alert_fired = false;
        if let Some(event) = &error_rate {
            error_rate_alert_fired = self.gate.try_fire_at(now, &notifier, &event.message());
            if error_rate_alert_fired {
                info!(
                    "Error rate {:.2}% over last {} requests exceeds {}%",
                    event.rate,
                    event.window_len,
                    self.estimator.threshold_percent()
                );
                self.stats.error_rate_alerts_fired += 1;
            } else {
                self.stats.error_rate_alerts_suppressed += 1;
            }
        }

        self.stats.delivery_failures += notifier.failures();
        RecordOutcome {
            failover,
            error_rate,
            error_rate_alert_fired,
        }
    }

    pub fn failover_detector(&self) -> &FailoverDetector {
        &self.failover
    }

    pub fn estimator(&self) -> &ErrorRateEstimator {
        &self.estimator
    }

    pub fn gate(&self) -> &AlertGate {
        &self.gate
    }

    pub fn stats(&self) -> &WatcherStats {
        &self.stats
    }
}

/// Notifier adapter that counts failed deliveries
struct FailureCounter<'a, N: ?Sized> {
    inner: &'a N,
    failures: Cell<u64>,
}

impl<'a, N: Notifier + ?Sized> FailureCounter<'a, N> {
    fn new(inner: &'a N) -> Self {
        Self {
            inner,
            failures: Cell::new(0),
        }
    }

    fn failures(&self) -> u64 {
        self.failures.get()
    }
}

impl<N: Notifier + ?Sized> Notifier for FailureCounter<'_, N> {
    fn send(&self, message: &str) -> Result<(), AlertError> {
        let result = self.inner.send(message);
        if result.is_err() {
            self.failures.set(self.failures.get() + 1);
        }
        result
    }
}
