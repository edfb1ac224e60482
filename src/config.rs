//! Runtime configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::engine::RetryPolicy;

/// Service configuration.
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// How long a mutation waits for the per-project lock
    /// (from PROJECT_LEDGER_LOCK_TIMEOUT_MS, default 5000).
    pub lock_timeout: Duration,
    /// Retry policy for transient store failures
    /// (from PROJECT_LEDGER_RETRY_ATTEMPTS and PROJECT_LEDGER_RETRY_BASE_DELAY_MS).
    pub retry: RetryPolicy,
    /// SQLite database path (from PROJECT_LEDGER_DB). `None` uses the platform data dir.
    pub database_path: Option<PathBuf>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(5_000),
            retry: RetryPolicy::default(),
            database_path: None,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. Unparseable values
    /// fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str| {
            lookup(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
        };

        let lock_timeout = millis("PROJECT_LEDGER_LOCK_TIMEOUT_MS").unwrap_or(defaults.lock_timeout);

        let max_attempts = lookup("PROJECT_LEDGER_RETRY_ATTEMPTS")
            .and_then(|s| s.trim().parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.retry.max_attempts);

        let base_delay =
            millis("PROJECT_LEDGER_RETRY_BASE_DELAY_MS").unwrap_or(defaults.retry.base_delay);

        let database_path = lookup("PROJECT_LEDGER_DB")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Self {
            lock_timeout,
            retry: RetryPolicy {
                max_attempts,
                base_delay,
            },
            database_path,
        }
    }
}
