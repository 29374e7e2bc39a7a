//! Configuration module for the notification backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::AppError;

/// Tuning knobs for every live notification feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    /// Maximum number of records held in memory per feed
    pub limit: usize,
    /// Reconnect attempts before falling back to polling
    pub max_retries: u32,
    /// First reconnect delay; doubles on every further attempt
    pub retry_base_delay: Duration,
    /// Interval of the polling fallback
    pub poll_interval: Duration,
    /// How long a subscription attempt may wait for a status
    pub subscribe_timeout: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            limit: 50,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(2000),
            poll_interval: Duration::from_secs(30),
            subscribe_timeout: Duration::from_secs(10),
        }
    }
}

impl FeedSettings {
    /// Replace zero durations with their defaults and cap oversized ones.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        Self {
            retry_base_delay: non_zero(
                "retry base delay",
                self.retry_base_delay,
                defaults.retry_base_delay,
            ),
            poll_interval: non_zero("poll interval", self.poll_interval, defaults.poll_interval),
            subscribe_timeout: non_zero(
                "subscribe timeout",
                self.subscribe_timeout,
                defaults.subscribe_timeout,
            ),
            ..self
        }
    }
}

/// Upper bound for any feed duration.
pub const MAX_FEED_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

fn non_zero(name: &str, value: Duration, default: Duration) -> Duration {
    if value.is_zero() {
        tracing::warn!("Ignoring zero {}, using {:?}", name, default);
        default
    } else if value > MAX_FEED_DURATION {
        tracing::warn!("Capping {} of {:?} to {:?}", name, value, MAX_FEED_DURATION);
        MAX_FEED_DURATION
    } else {
        value
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Live feed behaviour
    pub feed: FeedSettings,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("PRONOTIFY_API_PSK").ok();

        let db_path = env::var("PRONOTIFY_DB_PATH")
            .unwrap_or_else(|_| "./data/notifications.sqlite".to_string())
            .into();

        let bind_addr = env::var("PRONOTIFY_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid PRONOTIFY_BIND_ADDR: {}", e)))?;

        let log_level = env::var("PRONOTIFY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = FeedSettings::default();
        let feed = FeedSettings {
            limit: env_or("PRONOTIFY_FEED_LIMIT", defaults.limit),
            max_retries: env_or("PRONOTIFY_MAX_RETRIES", defaults.max_retries),
            retry_base_delay: Duration::from_millis(env_or(
                "PRONOTIFY_RETRY_BASE_MS",
                defaults.retry_base_delay.as_millis() as u64,
            )),
            poll_interval: Duration::from_secs(env_or(
                "PRONOTIFY_POLL_INTERVAL_SECS",
                defaults.poll_interval.as_secs(),
            )),
            subscribe_timeout: Duration::from_secs(env_or(
                "PRONOTIFY_SUBSCRIBE_TIMEOUT_SECS",
                defaults.subscribe_timeout.as_secs(),
            )),
        }
        .sanitized();

        Ok(Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            feed,
        })
    }
}

/// Read a numeric variable, keeping the default when it is unset or malformed.
fn env_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring malformed {}={:?}, using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases touch the same variables, so they run inside one test.
    #[test]
    fn test_default_config_and_overrides() {
        for key in [
            "PRONOTIFY_API_PSK",
            "PRONOTIFY_DB_PATH",
            "PRONOTIFY_BIND_ADDR",
            "PRONOTIFY_LOG_LEVEL",
            "PRONOTIFY_FEED_LIMIT",
            "PRONOTIFY_MAX_RETRIES",
            "PRONOTIFY_RETRY_BASE_MS",
            "PRONOTIFY_POLL_INTERVAL_SECS",
            "PRONOTIFY_SUBSCRIBE_TIMEOUT_SECS",
        ] {
            env::remove_var(key);
        }

        let config = Config::from_env().unwrap();

        assert!(config.api_psk.is_none());
        assert_eq!(
            config.db_path,
            PathBuf::from("./data/notifications.sqlite")
        );
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.feed, FeedSettings::default());

        env::set_var("PRONOTIFY_FEED_LIMIT", "20");
        env::set_var("PRONOTIFY_RETRY_BASE_MS", "not-a-number");
        let config = Config::from_env().unwrap();
        assert_eq!(config.feed.limit, 20);
        assert_eq!(config.feed.retry_base_delay, Duration::from_millis(2000));

        env::set_var("PRONOTIFY_BIND_ADDR", "nowhere");
        assert!(Config::from_env().is_err());

        env::remove_var("PRONOTIFY_BIND_ADDR");
        env::set_var("PRONOTIFY_POLL_INTERVAL_SECS", "0");
        env::set_var("PRONOTIFY_RETRY_BASE_MS", "0");
        env::set_var("PRONOTIFY_SUBSCRIBE_TIMEOUT_SECS", "5");
        let config = Config::from_env().unwrap();
        assert_eq!(config.feed.poll_interval, Duration::from_secs(30));
        assert_eq!(config.feed.retry_base_delay, Duration::from_millis(2000));
        assert_eq!(config.feed.subscribe_timeout, Duration::from_secs(5));

        env::set_var("PRONOTIFY_RETRY_BASE_MS", u64::MAX.to_string());
        let config = Config::from_env().unwrap();
        assert_eq!(config.feed.retry_base_delay, MAX_FEED_DURATION);

        env::remove_var("PRONOTIFY_FEED_LIMIT");
        env::remove_var("PRONOTIFY_RETRY_BASE_MS");
        env::remove_var("PRONOTIFY_POLL_INTERVAL_SECS");
        env::remove_var("PRONOTIFY_SUBSCRIBE_TIMEOUT_SECS");
    }
}
