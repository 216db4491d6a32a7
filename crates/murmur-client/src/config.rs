//! Client configuration loaded from environment variables.
//!
//! Everything has a default, so an embedding can start with no configuration
//! at all and get an in-memory backend.

use std::path::PathBuf;
use std::time::Duration;

use murmur_store::{AnyBackend, MemoryBackend, SqliteBackend, StoreError};
use tracing::{info, warn};

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// SQLite database file. `None` selects the in-memory backend.
    /// Env: `MURMUR_DATABASE_PATH`
    pub database_path: Option<PathBuf>,

    /// Retry policy for message submission.
    /// Env: `MURMUR_RETRY_ATTEMPTS`, `MURMUR_RETRY_BASE_MS`, `MURMUR_RETRY_MAX_MS`
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("MURMUR_DATABASE_PATH") {
            if !path.trim().is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Some(n) = parse_var::<u32>(&lookup, "MURMUR_RETRY_ATTEMPTS") {
            if n == 0 {
                warn!("MURMUR_RETRY_ATTEMPTS must be at least 1, using default");
            } else {
                config.retry.max_attempts = n;
            }
        }

        if let Some(ms) = parse_var::<u64>(&lookup, "MURMUR_RETRY_BASE_MS") {
            config.retry.base_delay = Duration::from_millis(ms);
        }

        if let Some(ms) = parse_var::<u64>(&lookup, "MURMUR_RETRY_MAX_MS") {
            config.retry.max_delay = Duration::from_millis(ms);
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }

    /// Open the configured backend.
    pub fn open_backend(&self) -> Result<AnyBackend, StoreError> {
        let backend = match &self.database_path {
            Some(path) => AnyBackend::Sqlite(SqliteBackend::open_at(path)?),
            None => AnyBackend::Memory(MemoryBackend::new()),
        };
        info!(backend = backend.name(), "Document backend opened");
        Ok(backend)
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let value = lookup(key)?;
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(key, value = %value, "Invalid value, using default");
            None
        }
    }
}
