use crate::events::FailoverEvent;

/// Edge detector for changes of the active backend pool
///
/// Remembers the pool of the previous record and raises a [`FailoverEvent`]
/// whenever the next record names a different one. The first observation only
/// primes the detector.
#[derive(Debug, Default)]
pub struct FailoverDetector {
    /// Pool seen on the most recent record, `None` until the first one
    last_pool: Option<String>,
}

impl FailoverDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the pool of the next record
    ///
    /// # Returns
    ///
    /// `Some(FailoverEvent)` if the pool differs from the previously stored
    /// one, `None` on the first observation or when the pool is unchanged.
    /// An empty stored pool name counts as no observation.
    pub fn update(&mut self, pool: &str) -> Option<FailoverEvent> {
        let event = match self.last_pool.as_deref() {
            Some(previous) if !previous.is_empty() && previous != pool => Some(FailoverEvent {
                from: previous.to_string(),
                to: pool.to_string(),
            }),
            _ => None,
        };

        if self.last_pool.as_deref() != Some(pool) {
            self.last_pool = Some(pool.to_string());
        }

        event
    }

    /// The pool stored from the last observation
    pub fn current_pool(&self) -> Option<&str> {
        self.last_pool.as_deref()
    }
}
