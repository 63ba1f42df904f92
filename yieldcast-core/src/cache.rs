//! Expiring key/value cache shared by the resolvers.
//!
//! Entries live for a fixed TTL and an optional capacity bound evicts the entry closest to
//! expiry. Concurrent misses on one key are collapsed into a single upstream fetch whose outcome
//! every waiter receives; failed fetches are never stored. A fetch lives only as long as one of
//! its waiters: once all of them are dropped, the next caller starts afresh.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::Mutex;
use tokio::time::Instant;

type Flight<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;
type WeakFlight<V, E> = WeakShared<BoxFuture<'static, Result<V, E>>>;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

struct Store<K, V> {
    ttl: Duration,
    capacity: Option<usize>,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> Store<K, V> {
    fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(key)
            && entry.expires_at > now
        {
            return Some(entry.value.clone());
        }
        entries.remove(key);
        None
    }

    fn insert(&self, key: K, value: V) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if let Some(capacity) = self.capacity
            && !entries.contains_key(&key)
            && entries.len() >= capacity
        {
            entries.retain(|_, entry| entry.expires_at > now);
            if entries.len() >= capacity {
                let soonest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(candidate, _)| candidate.clone());
                if let Some(soonest) = soonest {
                    entries.remove(&soonest);
                }
            }
        }
        entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }
}

/// TTL cache with single-flight loading, keyed by `K`, holding `V`, sharing fetch errors `E`.
pub struct KeyedCache<K, V, E> {
    name: &'static str,
    store: Arc<Store<K, V>>,
    in_flight: Arc<Mutex<HashMap<K, WeakFlight<V, E>>>>,
}

impl<K, V, E> KeyedCache<K, V, E>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create an unbounded cache whose entries expire after `ttl`.
    #[must_use]
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            store: Arc::new(Store {
                ttl,
                capacity: None,
                entries: Mutex::new(HashMap::new()),
            }),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Bound the number of stored entries (at least one).
    #[must_use]
    pub fn with_capacity(self, capacity: usize) -> Self {
        Self {
            name: self.name,
            store: Arc::new(Store {
                ttl: self.store.ttl,
                capacity: Some(capacity.max(1)),
                entries: Mutex::new(HashMap::new()),
            }),
            in_flight: self.in_flight,
        }
    }

    /// Live value for `key`. Expired entries are dropped on the way.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.store.get(key)
    }

    /// Store `value`, evicting the entry closest to expiry when the cache is full.
    pub fn insert(&self, key: K, value: V) {
        self.store.insert(key, value);
    }

    /// Drop every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let purged = self.store.purge_expired();
        if purged > 0 {
            tracing::debug!(cache = self.name, purged, "purged expired entries");
        }
        purged
    }

    /// Number of stored entries, expired ones included until they are touched or purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.entries.lock().len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of fetches that still have a waiter.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|_, flight| flight.upgrade().is_some());
        in_flight.len()
    }

    /// Return the live value for `key`, or run `fetch` to load it.
    ///
    /// While a fetch for `key` is running, further callers wait on it instead of calling `fetch`
    /// again. A successful value is stored before the waiters see it.
    ///
    /// # Errors
    ///
    /// Returns the error of the shared fetch, unchanged, to every waiter.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if let Some(value) = self.store.get(&key) {
            tracing::debug!(cache = self.name, key = ?key, "cache hit");
            return Ok(value);
        }

        let flight = {
            let mut in_flight = self.in_flight.lock();
            if let Some(running) = in_flight.get(&key).and_then(WeakShared::upgrade) {
                tracing::debug!(cache = self.name, key = ?key, "joining running fetch");
                running
            } else if let Some(value) = self.store.get(&key) {
                // a fetch finished between the first check and taking the lock
                return Ok(value);
            } else {
                tracing::debug!(cache = self.name, key = ?key, "cache miss");
                let flight = self.launch(key.clone(), fetch());
                match flight.downgrade() {
                    Some(weak) => {
                        in_flight.insert(key, weak);
                    }
                    None => {
                        in_flight.remove(&key);
                    }
                }
                flight
            }
        };

        flight.await
    }

    fn launch<Fut>(&self, key: K, fetching: Fut) -> Flight<V, E>
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let registry = Arc::clone(&self.in_flight);
        async move {
            let outcome = fetching.await;
            if let Ok(value) = &outcome {
                store.insert(key.clone(), value.clone());
            }
            registry.lock().remove(&key);
            outcome
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::{advance, sleep};

    use super::*;

    const DAY: Duration = Duration::from_secs(86_400);

    fn cache() -> KeyedCache<String, u32, String> {
        KeyedCache::new("test", DAY)
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = cache();
        cache.insert("a".to_owned(), 1);
        assert_eq!(cache.get(&"a".to_owned()), Some(1));

        advance(DAY - Duration::from_secs(1)).await;
        assert_eq!(cache.get(&"a".to_owned()), Some(1));

        advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&"a".to_owned()), None);
        assert!(cache.is_empty(), "expired entry is dropped on read");
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired_entries() {
        let cache = cache();
        cache.insert("old".to_owned(), 1);
        advance(DAY / 2).await;
        cache.insert("new".to_owned(), 2);
        advance(DAY / 2).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"new".to_owned()), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_evicts_entry_closest_to_expiry() {
        let cache = cache().with_capacity(2);
        cache.insert("first".to_owned(), 1);
        advance(Duration::from_secs(1)).await;
        cache.insert("second".to_owned(), 2);
        advance(Duration::from_secs(1)).await;
        cache.insert("third".to_owned(), 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"first".to_owned()), None);
        assert_eq!(cache.get(&"second".to_owned()), Some(2));
        assert_eq!(cache.get(&"third".to_owned()), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_share_one_fetch() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let fetch = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                sleep(Duration::from_millis(50)).await;
                Ok::<_, String>(7)
            }
        };

        let (first, second, third) = tokio::join!(
            cache.get_or_fetch("k".to_owned(), fetch),
            cache.get_or_fetch("k".to_owned(), fetch),
            cache.get_or_fetch("k".to_owned(), fetch),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!((first, second, third), (Ok(7), Ok(7), Ok(7)));
        assert_eq!(cache.in_flight(), 0);
        assert_eq!(cache.get(&"k".to_owned()), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_is_shared_but_not_stored() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let failing = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                sleep(Duration::from_millis(50)).await;
                Err::<u32, _>("upstream down".to_owned())
            }
        };

        let (first, second) = tokio::join!(
            cache.get_or_fetch("k".to_owned(), failing),
            cache.get_or_fetch("k".to_owned(), failing),
        );
        assert_eq!(first, Err("upstream down".to_owned()));
        assert_eq!(second, Err("upstream down".to_owned()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());

        let retried = cache
            .get_or_fetch("k".to_owned(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, String>(9) }
            })
            .await;
        assert_eq!(retried, Ok(9));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_does_not_leave_a_stale_fetch() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let slow = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                sleep(Duration::from_secs(60)).await;
                Ok::<_, String>(1)
            }
        };

        let abandoned = tokio::time::timeout(
            Duration::from_secs(1),
            cache.get_or_fetch("k".to_owned(), slow),
        )
        .await;
        assert!(abandoned.is_err(), "caller gave up before the fetch finished");
        assert_eq!(cache.in_flight(), 0);

        advance(Duration::from_secs(120)).await;
        let fresh = cache
            .get_or_fetch("k".to_owned(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, String>(2) }
            })
            .await;
        assert_eq!(fresh, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.get(&"k".to_owned()), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_fetched_again() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let fetch = || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, String>(u32::try_from(call).unwrap_or(u32::MAX)) }
        };

        assert_eq!(cache.get_or_fetch("k".to_owned(), fetch).await, Ok(0));
        assert_eq!(cache.get_or_fetch("k".to_owned(), fetch).await, Ok(0));
        advance(DAY).await;
        assert_eq!(cache.get_or_fetch("k".to_owned(), fetch).await, Ok(1));
    }
}
