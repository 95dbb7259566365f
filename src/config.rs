//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{bail, Context};

use crate::pool::{Backoff, PoolConfig, RetryPolicy};
use crate::service::{PersistencePolicy, StateDefaults};

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of user states the cache can hold
    pub max_entries: usize,
    /// Idle lifetime of a cached state in seconds (0 = never expires)
    pub state_ttl: u64,
    /// Background sweep interval in seconds (0 = lazy expiry only)
    pub sweep_interval: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Base URL of the remote document store; unset runs in memory only
    pub store_url: Option<String>,
    /// Bearer token sent to the remote store
    pub store_token: Option<String>,
    /// Number of per-host connection pools
    pub pool_count: usize,
    /// Connections per host pool
    pub pool_size: usize,
    /// How long a request waits for a free connection
    pub acquire_timeout_ms: u64,
    /// Per-request timeout in seconds
    pub request_timeout: u64,
    /// Attempts per remote request, first one included
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub retry_max_backoff_ms: u64,
    /// `fixed`, `linear` or `exponential`
    pub retry_strategy: String,
    /// Comma-separated namespaces written through to the store
    pub critical_namespaces: String,
    /// Language reported for users with no stored preference
    pub default_language: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Maximum cached states (default: 1000)
    /// - `STATE_TTL` - Idle TTL in seconds (default: 3600)
    /// - `SWEEP_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `STORE_URL` / `STORE_TOKEN` - Remote store (default: unset)
    /// - `POOL_COUNT` / `POOL_SIZE` - Connection pools (default: 10 x 20)
    /// - `POOL_TIMEOUT_MS` - Connection wait (default: 5000)
    /// - `REQUEST_TIMEOUT` - Request timeout in seconds (default: 10)
    /// - `RETRY_ATTEMPTS` / `RETRY_BACKOFF_MS` / `RETRY_MAX_BACKOFF_MS` /
    ///   `RETRY_STRATEGY` - Retry policy (default: 3, 500, 5000, linear)
    /// - `CRITICAL_NAMESPACES` - (default: conversation,language,role)
    /// - `DEFAULT_LANGUAGE` - (default: uz)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            state_ttl: parse_var("STATE_TTL").unwrap_or(defaults.state_ttl),
            sweep_interval: parse_var("SWEEP_INTERVAL").unwrap_or(defaults.sweep_interval),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            store_url: string_var("STORE_URL"),
            store_token: string_var("STORE_TOKEN"),
            pool_count: parse_var("POOL_COUNT").unwrap_or(defaults.pool_count),
            pool_size: parse_var("POOL_SIZE").unwrap_or(defaults.pool_size),
            acquire_timeout_ms: parse_var("POOL_TIMEOUT_MS").unwrap_or(defaults.acquire_timeout_ms),
            request_timeout: parse_var("REQUEST_TIMEOUT").unwrap_or(defaults.request_timeout),
            retry_attempts: parse_var("RETRY_ATTEMPTS").unwrap_or(defaults.retry_attempts),
            retry_backoff_ms: parse_var("RETRY_BACKOFF_MS").unwrap_or(defaults.retry_backoff_ms),
            retry_max_backoff_ms: parse_var("RETRY_MAX_BACKOFF_MS")
                .unwrap_or(defaults.retry_max_backoff_ms),
            retry_strategy: string_var("RETRY_STRATEGY").unwrap_or(defaults.retry_strategy),
            critical_namespaces: env::var("CRITICAL_NAMESPACES")
                .unwrap_or(defaults.critical_namespaces),
            default_language: string_var("DEFAULT_LANGUAGE").unwrap_or(defaults.default_language),
        }
    }

    /// Rejects settings the service can't run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_entries == 0 {
            bail!("MAX_ENTRIES must be at least 1");
        }
        if self.pool_count == 0 || self.pool_size == 0 {
            bail!("POOL_COUNT and POOL_SIZE must be at least 1");
        }
        if self.retry_attempts == 0 {
            bail!("RETRY_ATTEMPTS must be at least 1");
        }
        if self.retry_max_backoff_ms < self.retry_backoff_ms {
            bail!("RETRY_MAX_BACKOFF_MS must not be below RETRY_BACKOFF_MS");
        }
        self.retry_policy()?;
        self.policy()?;
        Ok(())
    }

    /// `None` when states never expire.
    pub fn state_ttl(&self) -> Option<Duration> {
        (self.state_ttl > 0).then(|| Duration::from_secs(self.state_ttl))
    }

    /// `None` when the background sweep is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval > 0).then(|| Duration::from_secs(self.sweep_interval))
    }

    pub fn retry_policy(&self) -> anyhow::Result<RetryPolicy> {
        let backoff: Backoff = self
            .retry_strategy
            .parse()
            .context("Invalid RETRY_STRATEGY")?;
        Ok(RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_backoff_ms),
            Duration::from_millis(self.retry_max_backoff_ms),
            backoff,
        ))
    }

    pub fn pool_config(&self) -> anyhow::Result<PoolConfig> {
        Ok(PoolConfig {
            pool_count: self.pool_count,
            per_pool: self.pool_size,
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
            request_timeout: Duration::from_secs(self.request_timeout),
            retry: self.retry_policy()?,
        })
    }

    pub fn policy(&self) -> anyhow::Result<PersistencePolicy> {
        PersistencePolicy::parse(&self.critical_namespaces).context("Invalid CRITICAL_NAMESPACES")
    }

    pub fn defaults(&self) -> StateDefaults {
        StateDefaults {
            language: self.default_language.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            state_ttl: 3600,
            sweep_interval: 60,
            server_port: 3000,
            store_url: None,
            store_token: None,
            pool_count: 10,
            pool_size: 20,
            acquire_timeout_ms: 5000,
            request_timeout: 10,
            retry_attempts: 3,
            retry_backoff_ms: 500,
            retry_max_backoff_ms: 5000,
            retry_strategy: "linear".to_string(),
            critical_namespaces: "conversation,language,role".to_string(),
            default_language: "uz".to_string(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Unset and blank are treated alike.
fn string_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
