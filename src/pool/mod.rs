//! Connection Pool Module
//!
//! Pooled outbound HTTP connections with bounded size and a retry policy
//! for transient failures.

mod connection;
mod retry;

pub use connection::{ConnectionPool, HttpReply, PoolConfig, PooledConnection};
pub use retry::{Backoff, RetryPolicy};
