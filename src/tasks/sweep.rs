//! Idle Sweep Task
//!
//! Background task that periodically drops cache entries past their idle TTL.
//! Expiry is also enforced lazily on read, so this only bounds how long dead
//! entries keep their memory.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::BoundedTtlCache;

/// Spawns a background task that sweeps expired entries every `interval`.
///
/// Returns the task handle so shutdown can abort it.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(BoundedTtlCache::new(1000, Some(Duration::from_secs(3600))));
/// let sweep_handle = spawn_sweep_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task<K, V>(cache: Arc<BoundedTtlCache<K, V>>, interval: Duration) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Starting idle sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.sweep();
            if removed > 0 {
                info!("Idle sweep: removed {} expired entries", removed);
            } else {
                debug!("Idle sweep: no expired entries found");
            }
        }
    })
}
