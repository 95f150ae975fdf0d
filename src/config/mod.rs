//! Environment-based configuration
//!
//! All options are read once at startup. Unset variables fall back to their
//! defaults; set-but-invalid values are rejected so a typo never silently
//! turns into a default.

use crate::error::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const LOG_FILE: &str = "LOG_FILE";
pub const SLACK_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";
pub const ERROR_RATE_THRESHOLD: &str = "ERROR_RATE_THRESHOLD";
pub const WINDOW_SIZE: &str = "WINDOW_SIZE";
pub const ALERT_COOLDOWN_SEC: &str = "ALERT_COOLDOWN_SEC";
pub const WEBHOOK_TIMEOUT_SEC: &str = "WEBHOOK_TIMEOUT_SEC";
pub const POLL_INTERVAL_MS: &str = "POLL_INTERVAL_MS";
pub const SOURCE_WAIT_SEC: &str = "SOURCE_WAIT_SEC";

pub const DEFAULT_LOG_FILE: &str = "/var/log/nginx/access.log";

/// Runtime configuration for the watcher
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Access log to tail
    pub log_file: PathBuf,
    /// Incoming-webhook URL, `None` disables delivery
    pub webhook_url: Option<String>,
    /// Error percentage above which to alert
    pub error_rate_threshold: f64,
    /// Number of recent statuses in the sliding window
    pub window_size: usize,
    /// Minimum time between two error-rate alerts
    pub alert_cooldown: Duration,
    /// Upper bound for one webhook delivery
    pub webhook_timeout: Duration,
    /// Sleep between reads when no new line is available
    pub poll_interval: Duration,
    /// Sleep between checks while the log file does not exist yet
    pub source_wait: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            webhook_url: None,
            error_rate_threshold: 2.0,
            window_size: 200,
            alert_cooldown: Duration::from_secs(300),
            webhook_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
            source_wait: Duration::from_secs(2),
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable is set to something
    /// that does not parse or is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let log_file = match lookup(LOG_FILE) {
            Some(path) if path.trim().is_empty() => {
                return Err(ConfigError::invalid(LOG_FILE, &path, "must not be empty"))
            }
            Some(path) => PathBuf::from(path),
            None => defaults.log_file,
        };

        let webhook_url = lookup(SLACK_WEBHOOK_URL)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let error_rate_threshold =
            parse_or(&lookup, ERROR_RATE_THRESHOLD, defaults.error_rate_threshold)?;
        if !(0.0..=100.0).contains(&error_rate_threshold) {
            return Err(ConfigError::invalid(
                ERROR_RATE_THRESHOLD,
                &error_rate_threshold.to_string(),
                "must be a percentage between 0 and 100",
            ));
        }

        let window_size = parse_or(&lookup, WINDOW_SIZE, defaults.window_size)?;
        if window_size == 0 {
            return Err(ConfigError::invalid(WINDOW_SIZE, "0", "must be at least 1"));
        }

        let alert_cooldown = Duration::from_secs(parse_or(
            &lookup,
            ALERT_COOLDOWN_SEC,
            defaults.alert_cooldown.as_secs(),
        )?);

        let webhook_timeout = Duration::from_secs(positive(
            WEBHOOK_TIMEOUT_SEC,
            parse_or(&lookup, WEBHOOK_TIMEOUT_SEC, defaults.webhook_timeout.as_secs())?,
        )?);

        let poll_interval = Duration::from_millis(positive(
            POLL_INTERVAL_MS,
            parse_or(
                &lookup,
                POLL_INTERVAL_MS,
                defaults.poll_interval.as_millis() as u64,
            )?,
        )?);

        let source_wait = Duration::from_secs(positive(
            SOURCE_WAIT_SEC,
            parse_or(&lookup, SOURCE_WAIT_SEC, defaults.source_wait.as_secs())?,
        )?);

        Ok(Self {
            log_file,
            webhook_url,
            error_rate_threshold,
            window_size,
            alert_cooldown,
            webhook_timeout,
            poll_interval,
            source_wait,
        })
    }
}

/// Parse `key` if set, otherwise return `default`
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(key, &raw, e.to_string())),
    }
}

fn positive(key: &str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        Err(ConfigError::invalid(key, "0", "must be greater than zero"))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.log_file, PathBuf::from("/var/log/nginx/access.log"));
        assert_eq!(config.webhook_url, None);
        assert_eq!(config.error_rate_threshold, 2.0);
        assert_eq!(config.window_size, 200);
        assert_eq!(config.alert_cooldown, Duration::from_secs(300));
        assert_eq!(config.webhook_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            (LOG_FILE, "/tmp/access.log"),
            (SLACK_WEBHOOK_URL, "https://hooks.example.com/T000/B000"),
            (ERROR_RATE_THRESHOLD, "5.5"),
            (WINDOW_SIZE, "50"),
            (ALERT_COOLDOWN_SEC, "0"),
            (POLL_INTERVAL_MS, "100"),
        ])
        .unwrap();

        assert_eq!(config.log_file, PathBuf::from("/tmp/access.log"));
        assert_eq!(
            config.webhook_url.as_deref(),
            Some("https://hooks.example.com/T000/B000")
        );
        assert_eq!(config.error_rate_threshold, 5.5);
        assert_eq!(config.window_size, 50);
        assert_eq!(config.alert_cooldown, Duration::ZERO);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_blank_webhook_is_unset() {
        let config = load(&[(SLACK_WEBHOOK_URL, "  ")]).unwrap();
        assert_eq!(config.webhook_url, None);
    }

    #[test]
    fn test_non_numeric_values_fail_fast() {
        for key in [
            ERROR_RATE_THRESHOLD,
            WINDOW_SIZE,
            ALERT_COOLDOWN_SEC,
            WEBHOOK_TIMEOUT_SEC,
            POLL_INTERVAL_MS,
            SOURCE_WAIT_SEC,
        ] {
            let err = load(&[(key, "lots")]).unwrap_err();
            let ConfigError::InvalidValue { key: bad_key, value, .. } = err;
            assert_eq!(bad_key, key);
            assert_eq!(value, "lots");
        }
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        assert!(load(&[(WINDOW_SIZE, "0")]).is_err());
        assert!(load(&[(WINDOW_SIZE, "-5")]).is_err());
        assert!(load(&[(ERROR_RATE_THRESHOLD, "150")]).is_err());
        assert!(load(&[(ERROR_RATE_THRESHOLD, "NaN")]).is_err());
        assert!(load(&[(POLL_INTERVAL_MS, "0")]).is_err());
        assert!(load(&[(LOG_FILE, "")]).is_err());
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let config = load(&[(WINDOW_SIZE, " 10 "), (ERROR_RATE_THRESHOLD, "3 ")]).unwrap();
        assert_eq!(config.window_size, 10);
        assert_eq!(config.error_rate_threshold, 3.0);
    }
}
