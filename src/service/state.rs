//! Cache-backed state service
//!
//! Single entry point for per-user state. Reads go through the cache and
//! fall back to the remote store; writes always land in the cache first and
//! reach the store synchronously only for critical namespaces.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::cache::{BoundedTtlCache, CacheStats};
use crate::error::{Result, StateError};
use crate::service::{Namespace, PersistencePolicy, StateCategory, StateKey};
use crate::store::{RemoteRecord, RemoteStore};

// == State Defaults ==
/// Values returned for users the store has never seen.
#[derive(Debug, Clone, PartialEq)]
pub struct StateDefaults {
    pub language: String,
}

impl StateDefaults {
    pub fn value_for(&self, namespace: Namespace) -> Value {
        match namespace {
            Namespace::Language => Value::String(self.language.clone()),
            Namespace::Conversation | Namespace::Role | Namespace::Ui => Value::Null,
        }
    }
}

impl Default for StateDefaults {
    fn default() -> Self {
        Self {
            language: "uz".to_string(),
        }
    }
}

/// Number of write lock stripes; keys hashing to the same stripe share one.
const WRITE_STRIPES: usize = 64;

// == State Service ==
pub struct StateService {
    cache: Arc<BoundedTtlCache<StateKey, Value>>,
    store: Arc<dyn RemoteStore>,
    policy: PersistencePolicy,
    defaults: StateDefaults,
    /// Orders writes to a key across both the cache and the store.
    write_locks: Vec<Mutex<()>>,
}

impl StateService {
    pub fn new(
        cache: Arc<BoundedTtlCache<StateKey, Value>>,
        store: Arc<dyn RemoteStore>,
        policy: PersistencePolicy,
        defaults: StateDefaults,
    ) -> Self {
        Self {
            cache,
            store,
            policy,
            defaults,
            write_locks: (0..WRITE_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Convenience constructor owning a fresh cache.
    pub fn with_store(
        store: Arc<dyn RemoteStore>,
        max_entries: usize,
        ttl: Option<Duration>,
    ) -> Self {
        Self::new(
            Arc::new(BoundedTtlCache::new(max_entries, ttl)),
            store,
            PersistencePolicy::default(),
            StateDefaults::default(),
        )
    }

    // == Get State ==
    /// Returns the user's state, reading through to the store on a miss.
    ///
    /// A record missing from the store yields the namespace default. Fails
    /// with `StateUnavailable` only when nothing is cached and the store
    /// can't be reached.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn get_state(&self, key: &StateKey) -> Result<Value> {
        if let Some(value) = self.cache.get(key) {
            debug!("State cache hit");
            return Ok(value);
        }

        let loaded = match self.store.load(key).await {
            Ok(record) => record.value,
            Err(StateError::NotFound(_)) => {
                debug!("No stored state, using default");
                self.defaults.value_for(key.namespace())
            }
            Err(err) => {
                warn!(store = self.store.name(), error = %err, "State read failed with nothing cached");
                return Err(StateError::StateUnavailable {
                    key: key.to_string(),
                    reason: err.to_string(),
                });
            }
        };

        // A write may have landed while the store was being read; it wins.
        Ok(self.cache.insert_if_absent(key.clone(), loaded))
    }

    // == Set State ==
    /// Writes the user's state.
    ///
    /// The cache is updated first and unconditionally. For `Critical` writes
    /// the store is then updated synchronously (a `null` value deletes the
    /// record); if that fails the call returns `PersistenceDeferred` while
    /// the new value stays visible.
    ///
    /// Writes to the same key are serialized through the store round trip,
    /// so the store never ends up behind the cache.
    #[instrument(skip(self, key, value), fields(key = %key))]
    pub async fn set_state(&self, key: &StateKey, value: Value, category: StateCategory) -> Result<()> {
        let _write = self.write_lock(key).lock().await;

        if let Some(evicted) = self.cache.put(key.clone(), value.clone()) {
            debug!(evicted = %evicted, "Evicted least recently used state");
        }

        if category == StateCategory::Ephemeral {
            return Ok(());
        }

        let persisted = if value.is_null() {
            self.store.delete(key).await
        } else {
            self.store.save(key, &RemoteRecord::new(value)).await
        };

        persisted.map_err(|err| {
            warn!(store = self.store.name(), error = %err, "Critical state kept in memory only");
            StateError::PersistenceDeferred {
                key: key.to_string(),
                reason: err.to_string(),
            }
        })
    }

    /// Writes with the category configured for the key's namespace.
    pub async fn set(&self, key: &StateKey, value: Value) -> Result<()> {
        let category = self.category(key.namespace());
        self.set_state(key, value, category).await
    }

    /// Resets the user's state to `null`, deleting the stored record for
    /// critical namespaces.
    pub async fn clear_state(&self, key: &StateKey) -> Result<()> {
        self.set(key, Value::Null).await
    }

    /// Drops the cached entry; the next read goes to the store.
    pub fn invalidate(&self, key: &StateKey) -> bool {
        self.cache.invalidate(key)
    }

    /// Removes idle entries now rather than on their next access.
    pub fn sweep(&self) -> usize {
        self.cache.sweep()
    }

    pub fn category(&self, namespace: Namespace) -> StateCategory {
        self.policy.category(namespace)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn write_lock(&self, key: &StateKey) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.write_locks[hasher.finish() as usize % self.write_locks.len()]
    }

    /// Shared handle on the cache, for the sweep task.
    pub fn cache(&self) -> Arc<BoundedTtlCache<StateKey, Value>> {
        Arc::clone(&self.cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;
    use serde_json::json;

    fn setup() -> (StateService, Arc<MemoryDocumentStore>) {
        let store = Arc::new(MemoryDocumentStore::new());
        let service = StateService::with_store(store.clone(), 100, Some(Duration::from_secs(3600)));
        (service, store)
    }

    fn key(ns: Namespace, user: &str) -> StateKey {
        StateKey::new(ns, user).unwrap()
    }

    #[tokio::test]
    async fn test_cache_hit_skips_store() {
        let (service, store) = setup();
        let k = key(Namespace::Ui, "1");

        service.set_state(&k, json!({"page": 2}), StateCategory::Ephemeral).await.unwrap();

        assert_eq!(service.get_state(&k).await.unwrap(), json!({"page": 2}));
        assert_eq!(store.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_miss_reads_through_once() {
        let (service, store) = setup();
        let k = key(Namespace::Language, "7");
        store.insert(k.clone(), json!("ru"));

        assert_eq!(service.get_state(&k).await.unwrap(), json!("ru"));
        assert_eq!(service.get_state(&k).await.unwrap(), json!("ru"));
        assert_eq!(store.calls().loads, 1);
    }

    #[tokio::test]
    async fn test_not_found_yields_namespace_default() {
        let (service, store) = setup();

        assert_eq!(service.get_state(&key(Namespace::Language, "1")).await.unwrap(), json!("uz"));
        assert_eq!(service.get_state(&key(Namespace::Conversation, "1")).await.unwrap(), Value::Null);
        // Defaults are cached too
        service.get_state(&key(Namespace::Language, "1")).await.unwrap();
        assert_eq!(store.calls().loads, 2);
    }

    #[tokio::test]
    async fn test_store_down_on_miss_is_state_unavailable() {
        let (service, store) = setup();
        store.set_available(false);

        let err = service.get_state(&key(Namespace::Role, "1")).await.unwrap_err();

        assert!(matches!(err, StateError::StateUnavailable { .. }));
        assert!(service.stats().total_entries == 0);
    }

    #[tokio::test]
    async fn test_critical_write_persists() {
        let (service, store) = setup();
        let k = key(Namespace::Conversation, "1");

        service.set_state(&k, json!({"step": "name"}), StateCategory::Critical).await.unwrap();

        assert_eq!(store.calls().saves, 1);
        assert_eq!(store.record(&k).unwrap().value, json!({"step": "name"}));
    }

    #[tokio::test]
    async fn test_critical_write_with_store_down_is_deferred_but_visible() {
        let (service, store) = setup();
        let k = key(Namespace::Role, "1");
        store.set_available(false);

        let err = service.set_state(&k, json!("admin"), StateCategory::Critical).await.unwrap_err();

        assert!(matches!(err, StateError::PersistenceDeferred { .. }));
        assert_eq!(service.get_state(&k).await.unwrap(), json!("admin"));
    }

    #[tokio::test]
    async fn test_clear_state_deletes_critical_record() {
        let (service, store) = setup();
        let k = key(Namespace::Conversation, "1");

        service.set(&k, json!({"step": "phone"})).await.unwrap();
        service.clear_state(&k).await.unwrap();

        assert!(store.record(&k).is_none());
        assert_eq!(store.calls().deletes, 1);
        assert_eq!(service.get_state(&k).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_set_uses_policy_category() {
        let (service, store) = setup();

        service.set(&key(Namespace::Ui, "1"), json!(1)).await.unwrap();
        assert_eq!(store.calls().saves, 0);

        service.set(&key(Namespace::Language, "1"), json!("en")).await.unwrap();
        assert_eq!(store.calls().saves, 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let (service, store) = setup();
        let k = key(Namespace::Language, "1");

        service.set(&k, json!("en")).await.unwrap();
        store.insert(k.clone(), json!("ru"));

        assert!(service.invalidate(&k));
        assert_eq!(service.get_state(&k).await.unwrap(), json!("ru"));
    }

    /// Holds saves of the value `"slow"` for a while before storing them.
    struct SlowSaves(MemoryDocumentStore);

    #[async_trait::async_trait]
    impl RemoteStore for SlowSaves {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn load(&self, key: &StateKey) -> Result<RemoteRecord> {
            self.0.load(key).await
        }

        async fn save(&self, key: &StateKey, record: &RemoteRecord) -> Result<()> {
            if record.value == json!("slow") {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            self.0.save(key, record).await
        }

        async fn delete(&self, key: &StateKey) -> Result<()> {
            self.0.delete(key).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_critical_writes_land_in_order() {
        let store = Arc::new(SlowSaves(MemoryDocumentStore::new()));
        let service = Arc::new(StateService::with_store(store.clone(), 100, None));
        let k = key(Namespace::Conversation, "1");

        let first = {
            let (service, k) = (Arc::clone(&service), k.clone());
            tokio::spawn(async move { service.set(&k, json!("slow")).await })
        };
        // Let the first write reach its slow save
        tokio::time::sleep(Duration::from_millis(10)).await;
        service.set(&k, json!("fast")).await.unwrap();
        first.await.unwrap().unwrap();

        assert_eq!(store.0.record(&k).unwrap().value, json!("fast"));
        assert_eq!(service.get_state(&k).await.unwrap(), json!("fast"));
    }

    #[test]
    fn test_defaults() {
        let defaults = StateDefaults {
            language: "en".to_string(),
        };
        assert_eq!(defaults.value_for(Namespace::Language), json!("en"));
        assert_eq!(defaults.value_for(Namespace::Ui), Value::Null);
    }
}
