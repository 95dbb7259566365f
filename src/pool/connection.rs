//! Connection Pool Module
//!
//! Reusable outbound HTTP connections, bounded per host and in total, with a
//! retry loop for transient failures.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, warn};

use crate::cache::BoundedTtlCache;
use crate::error::{Result, StateError};
use crate::pool::RetryPolicy;

// == Pool Config ==
/// Sizing and timing of a [`ConnectionPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of distinct hosts kept pooled at once
    pub pool_count: usize,
    /// Concurrent connections allowed per host
    pub per_pool: usize,
    /// How long `acquire` waits before giving up
    pub acquire_timeout: Duration,
    /// Timeout applied to every request
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl PoolConfig {
    /// Upper bound on connections in use across all hosts.
    pub fn max_connections(&self) -> usize {
        self.pool_count.max(1) * self.per_pool.max(1)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_count: 10,
            per_pool: 20,
            acquire_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

// == Connection ==
/// A keep-alive HTTP client owned by one pool slot.
#[derive(Debug)]
struct Connection {
    id: u64,
    client: reqwest::Client,
}

/// Per-host slot: concurrency limit plus the free-list of idle connections.
#[derive(Debug)]
struct HostPool {
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Connection>>,
}

impl HostPool {
    fn new(per_pool: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(per_pool.max(1))),
            idle: Mutex::new(Vec::new()),
        }
    }
}

// == Pooled Connection ==
/// Scoped connection handle. Dropping it returns the connection to its
/// host's free-list and releases both permits.
#[derive(Debug)]
pub struct PooledConnection {
    id: u64,
    client: reqwest::Client,
    host: Arc<HostPool>,
    _host_permit: OwnedSemaphorePermit,
    _total_permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Deref for PooledConnection {
    type Target = reqwest::Client;

    fn deref(&self) -> &reqwest::Client {
        &self.client
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        // reqwest clients share their connection state, the clone is a handle
        self.host.idle.lock().push(Connection {
            id: self.id,
            client: self.client.clone(),
        });
    }
}

// == Http Reply ==
/// Fully read response. The body is consumed while the connection is still
/// held, so the pool bound covers the whole exchange.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: StatusCode,
    pub body: String,
}

impl HttpReply {
    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| StateError::Transport(format!("Malformed response body: {}", e)))
    }
}

// == Connection Pool ==
/// Bounded pool of outbound connections.
///
/// Up to `pool_count` hosts are kept (least recently used host dropped
/// first), each allowing `per_pool` concurrent connections; a global
/// semaphore caps the total at `pool_count * per_pool`.
///
/// A host dropped from the LRU while it still has connections checked out
/// stays reachable through `live` until the last one is returned, so its
/// per-host limit keeps applying.
pub struct ConnectionPool {
    hosts: BoundedTtlCache<String, Arc<HostPool>>,
    live: Mutex<HashMap<String, Weak<HostPool>>>,
    total: Arc<Semaphore>,
    config: PoolConfig,
    next_id: AtomicU64,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            hosts: BoundedTtlCache::new(config.pool_count, None),
            live: Mutex::new(HashMap::new()),
            total: Arc::new(Semaphore::new(config.max_connections())),
            config,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Connections that could still be handed out right now.
    pub fn available(&self) -> usize {
        self.total.available_permits()
    }

    /// Idle connections parked for `host`.
    pub fn idle_connections(&self, host: &str) -> usize {
        self.hosts
            .get(&host.to_string())
            .map_or(0, |pool| pool.idle.lock().len())
    }

    // == Acquire ==
    /// Checks out a connection to `host`, waiting at most the configured
    /// acquire timeout.
    pub async fn acquire(&self, host: &str) -> Result<PooledConnection> {
        let pool = self.host_pool(host);

        let started = Instant::now();
        let permits = tokio::time::timeout(self.config.acquire_timeout, async {
            let host_permit = Arc::clone(&pool.permits).acquire_owned().await?;
            let total_permit = Arc::clone(&self.total).acquire_owned().await?;
            Ok::<_, tokio::sync::AcquireError>((host_permit, total_permit))
        })
        .await;

        let (host_permit, total_permit) = match permits {
            Ok(Ok(permits)) => permits,
            Ok(Err(_)) => return Err(StateError::Internal("Connection pool closed".to_string())),
            Err(_) => {
                let waited_ms = started.elapsed().as_millis() as u64;
                warn!(host, waited_ms, "Connection pool exhausted");
                return Err(StateError::PoolExhausted {
                    host: host.to_string(),
                    waited_ms,
                });
            }
        };

        let idle = pool.idle.lock().pop();
        let conn = match idle {
            Some(conn) => conn,
            None => self.connect(host)?,
        };

        Ok(PooledConnection {
            id: conn.id,
            client: conn.client,
            host: pool,
            _host_permit: host_permit,
            _total_permit: total_permit,
        })
    }

    // == Send ==
    /// Sends a request built by `build`, retrying connect/timeout errors and
    /// 5xx responses per the retry policy.
    ///
    /// 4xx and other responses are returned as-is. `PoolExhausted` is never
    /// retried here.
    pub async fn send<F>(&self, url: &Url, build: F) -> Result<HttpReply>
    where
        F: Fn(&reqwest::Client, &Url) -> RequestBuilder + Send + Sync,
    {
        let host = host_key(url);
        let host = host.as_str();
        let build = &build;
        let mut attempt = 0u32;

        Retry::spawn(self.config.retry.delays(), move || {
            attempt += 1;
            let n = attempt;
            async move { self.attempt(host, url, build, n).await }
        })
        .await
    }

    async fn attempt<F>(
        &self,
        host: &str,
        url: &Url,
        build: &F,
        attempt: u32,
    ) -> std::result::Result<HttpReply, RetryError<StateError>>
    where
        F: Fn(&reqwest::Client, &Url) -> RequestBuilder,
    {
        let conn = self.acquire(host).await.map_err(RetryError::Permanent)?;
        let max_attempts = self.config.retry.max_attempts;

        let response = match build(&conn, url).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() || e.is_connect() => {
                warn!(host, attempt, max_attempts, error = %e, "Transient transport error");
                return Err(RetryError::Transient {
                    err: StateError::Transport(e.to_string()),
                    retry_after: None,
                });
            }
            Err(e) => return Err(RetryError::Permanent(StateError::Transport(e.to_string()))),
        };

        let status = response.status();
        if status.is_server_error() {
            warn!(host, attempt, max_attempts, %status, "Transient server error");
            return Err(RetryError::Transient {
                err: StateError::Transport(format!("{} returned {}", url, status)),
                retry_after: None,
            });
        }

        let body = response.text().await.map_err(|e| RetryError::Transient {
            err: StateError::Transport(e.to_string()),
            retry_after: None,
        })?;
        debug!(host, attempt, %status, connection = conn.id(), "Request completed");

        Ok(HttpReply { status, body })
    }

    /// Slot for `host`: the cached one, else one still in use after being
    /// evicted, else a fresh one.
    fn host_pool(&self, host: &str) -> Arc<HostPool> {
        // Held across the lookup so two callers can't both create a slot
        let mut live = self.live.lock();
        let key = host.to_string();
        if let Some(pool) = self.hosts.get(&key) {
            return pool;
        }

        let pool = live
            .get(host)
            .and_then(Weak::upgrade)
            .unwrap_or_else(|| Arc::new(HostPool::new(self.config.per_pool)));
        live.retain(|_, slot| slot.strong_count() > 0);
        live.insert(key.clone(), Arc::downgrade(&pool));
        self.hosts.put(key, Arc::clone(&pool));
        pool
    }

    fn connect(&self, host: &str) -> Result<Connection> {
        let client = reqwest::Client::builder()
            .timeout(self.config.request_timeout)
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| StateError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(host, connection = id, "Opened new pooled connection");
        Ok(Connection { id, client })
    }
}

/// Pool key for a URL: scheme, host and port.
fn host_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Backoff;

    fn small_pool(pool_count: usize, per_pool: usize) -> ConnectionPool {
        ConnectionPool::new(PoolConfig {
            pool_count,
            per_pool,
            acquire_timeout: Duration::from_millis(50),
            request_timeout: Duration::from_secs(1),
            retry: RetryPolicy::none(),
        })
    }

    #[tokio::test]
    async fn test_released_connection_is_reused() {
        let pool = small_pool(2, 2);

        let first = pool.acquire("http://a").await.unwrap();
        let id = first.id();
        drop(first);

        assert_eq!(pool.idle_connections("http://a"), 1);
        let again = pool.acquire("http://a").await.unwrap();
        assert_eq!(again.id(), id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_host_limit_exhausts() {
        let pool = small_pool(2, 1);

        let _held = pool.acquire("http://a").await.unwrap();
        let err = pool.acquire("http://a").await.unwrap_err();

        assert!(matches!(err, StateError::PoolExhausted { ref host, .. } if host == "http://a"));
        assert!(err.is_retryable());
        // Another host still has room
        assert!(pool.acquire("http://b").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_limit_is_pool_count_times_per_pool() {
        let pool = small_pool(2, 1);
        assert_eq!(pool.available(), 2);

        let _a = pool.acquire("http://a").await.unwrap();
        let _b = pool.acquire("http://b").await.unwrap();
        assert_eq!(pool.available(), 0);

        // Third host evicts the least recently used host slot, but the
        // global bound still holds.
        let err = pool.acquire("http://c").await.unwrap_err();
        assert!(matches!(err, StateError::PoolExhausted { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_gets_connection_when_released() {
        let pool = Arc::new(ConnectionPool::new(PoolConfig {
            acquire_timeout: Duration::from_secs(5),
            per_pool: 1,
            ..PoolConfig::default()
        }));

        let held = pool.acquire("http://a").await.unwrap();
        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire("http://a").await.map(|c| c.id()) })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        let id = held.id();
        drop(held);

        assert_eq!(waiter.await.unwrap().unwrap(), id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicted_busy_host_keeps_its_limit() {
        let pool = small_pool(2, 1);

        let held_a = pool.acquire("http://a").await.unwrap();
        let b = pool.acquire("http://b").await.unwrap();
        // Pushes "a" out of the host LRU; fails on the global bound
        assert!(pool.acquire("http://c").await.is_err());
        drop(b);

        // A global permit is free again, but "a" is still at its limit
        let err = pool.acquire("http://a").await.unwrap_err();
        assert!(matches!(err, StateError::PoolExhausted { ref host, .. } if host == "http://a"));

        let id = held_a.id();
        drop(held_a);
        assert_eq!(pool.acquire("http://a").await.unwrap().id(), id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_does_not_retry_exhaustion() {
        let pool = ConnectionPool::new(PoolConfig {
            pool_count: 1,
            per_pool: 1,
            acquire_timeout: Duration::from_millis(50),
            request_timeout: Duration::from_secs(1),
            retry: RetryPolicy::new(5, Duration::from_secs(10), Duration::from_secs(10), Backoff::Fixed),
        });
        let url = Url::parse("http://127.0.0.1:9/v1/user_states/1").unwrap();
        let _held = pool.acquire(&host_key(&url)).await.unwrap();

        let started = Instant::now();
        let err = pool
            .send(&url, |client, url| client.get(url.clone()))
            .await
            .unwrap_err();

        assert!(matches!(err, StateError::PoolExhausted { .. }));
        // One acquire timeout, no backoff sleeps
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_host_key() {
        let url = Url::parse("https://store.example.com:8443/v1/user_states/1").unwrap();
        assert_eq!(host_key(&url), "https://store.example.com:8443");
    }

    #[test]
    fn test_reply_json() {
        let reply = HttpReply {
            status: StatusCode::OK,
            body: r#"{"a":1}"#.to_string(),
        };
        let value: serde_json::Value = reply.json().unwrap();
        assert_eq!(value["a"], 1);

        let bad = HttpReply {
            status: StatusCode::OK,
            body: "not json".to_string(),
        };
        assert!(bad.json::<serde_json::Value>().is_err());
    }
}
