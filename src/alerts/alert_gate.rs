use crate::alerts::Notifier;
use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

/// Cooldown gate for error-rate alerts
///
/// Lets one alert through and then suppresses every further alert until the
/// cooldown has elapsed. Suppressed alerts are dropped, not queued; the next
/// alert after expiry carries whatever rate is current at that time.
#[derive(Debug)]
pub struct AlertGate {
    /// Minimum time between two delivered alerts
    cooldown: Duration,
    /// When the last alert went out, `None` if none has yet
    last_fired: Option<DateTime<Utc>>,
}

impl AlertGate {
    /// Create a new gate with the given cooldown
    ///
    /// # Arguments
    ///
    /// * `cooldown` - Elapsed time required between two alerts
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_fired: None,
        }
    }

    /// Deliver `message` if the cooldown has expired
    ///
    /// # Returns
    ///
    /// `true` if the alert fired, `false` if it was suppressed
    pub fn try_fire<N>(&mut self, notifier: &N, message: &str) -> bool
    where
        N: Notifier + ?Sized,
    {
        self.try_fire_at(Utc::now(), notifier, message)
    }

    /// Deliver `message` as of a specific time
    ///
    /// This is primarily used for testing with controlled timestamps. A failed
    /// delivery still starts the cooldown; it is logged and not retried.
    pub fn try_fire_at<N>(&mut self, now: DateTime<Utc>, notifier: &N, message: &str) -> bool
    where
        N: Notifier + ?Sized,
    {
        if !self.is_open_at(now) {
            debug!("Suppressed alert during cooldown: {}", message);
            return false;
        }

        if let Err(e) = notifier.send(message) {
            warn!("Failed to deliver alert: {}", e);
        }
        self.last_fired = Some(now);
        true
    }

    /// Check whether an alert would be let through at `now`
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        match self.last_fired {
            None => true,
            Some(last) => now - last > self.cooldown,
        }
    }

    pub fn last_fired(&self) -> Option<DateTime<Utc>> {
        self.last_fired
    }
}
