//! In-memory TTL cache with single-flight request de-duplication.
//!
//! Entries expire lazily: an expired entry is removed when it is next read or
//! when the store grows past `max_items`. When the store is over capacity,
//! expired entries go first and then the oldest insertions (FIFO standing in
//! for LRU).
//!
//! `wrap` coalesces concurrent misses on the same key into one producer call.
//! Every waiter observes the same `Result`; failures are never cached.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::{debug, trace};

type SharedResult<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

struct Entry<V> {
    value: V,
    expires_at: Instant,
    /// Insertion sequence, used to spot stale slots in `order`.
    seq: u64,
}

struct InFlight<V, E> {
    id: u64,
    future: SharedResult<V, E>,
}

struct Inner<V, E> {
    store: HashMap<String, Entry<V>>,
    /// Insertion order; may hold stale `(key, seq)` pairs for replaced or removed entries.
    order: VecDeque<(String, u64)>,
    in_flight: HashMap<String, InFlight<V, E>>,
    next_seq: u64,
}

impl<V: Clone, E> Inner<V, E> {
    fn get_fresh(&mut self, key: &str, now: Instant) -> Option<V> {
        let expired = match self.store.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            trace!(key, "Evicting expired cache entry");
            self.store.remove(key);
        }
        None
    }

    fn insert(&mut self, key: String, value: V, ttl: Duration, max_items: usize) {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.order.push_back((key.clone(), seq));
        self.store.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
                seq,
            },
        );
        self.prune_if_needed(max_items);
    }

    fn prune_if_needed(&mut self, max_items: usize) {
        if self.store.len() > max_items {
            let now = Instant::now();
            let before = self.store.len();
            self.store.retain(|_, entry| entry.expires_at > now);

            while self.store.len() > max_items {
                let Some((key, seq)) = self.order.pop_front() else {
                    break;
                };
                if self.store.get(&key).is_some_and(|entry| entry.seq == seq) {
                    self.store.remove(&key);
                }
            }
            debug!(removed = before - self.store.len(), remaining = self.store.len(), "Pruned cache");
        }

        if self.order.len() > self.store.len() * 2 + 16 {
            let store = &self.store;
            self.order
                .retain(|(key, seq)| store.get(key).is_some_and(|entry| entry.seq == *seq));
        }
    }
}

/// Keyed TTL cache shared between clones.
pub struct TtlCache<V, E> {
    inner: Arc<Mutex<Inner<V, E>>>,
    default_ttl: Duration,
    max_items: usize,
}

impl<V, E> Clone for TtlCache<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            default_ttl: self.default_ttl,
            max_items: self.max_items,
        }
    }
}

fn lock<V, E>(inner: &Mutex<Inner<V, E>>) -> MutexGuard<'_, Inner<V, E>> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<V, E> TtlCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration, max_items: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                store: HashMap::new(),
                order: VecDeque::new(),
                in_flight: HashMap::new(),
                next_seq: 0,
            })),
            default_ttl,
            max_items,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Cached value for `key`, if present and unexpired.
    pub fn get(&self, key: &str) -> Option<V> {
        lock(&self.inner).get_fresh(key, Instant::now())
    }

    /// Store `value` under `key` for `ttl`.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        lock(&self.inner).insert(key.into(), value, ttl, self.max_items);
    }

    /// Drop the cached value and any in-flight marker for `key`.
    pub fn del(&self, key: &str) {
        let mut inner = lock(&self.inner);
        inner.store.remove(key);
        inner.in_flight.remove(key);
    }

    pub fn clear(&self) {
        let mut inner = lock(&self.inner);
        inner.store.clear();
        inner.order.clear();
        inner.in_flight.clear();
    }

    /// Number of stored entries, expired ones included until they are evicted.
    pub fn len(&self) -> usize {
        lock(&self.inner).store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight_count(&self) -> usize {
        lock(&self.inner).in_flight.len()
    }

    /// Return the cached value for `key`, or run `producer` once for all
    /// concurrent callers and cache a successful result for `ttl`.
    pub async fn wrap<F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let pending = {
            let mut inner = lock(&self.inner);

            if let Some(value) = inner.get_fresh(key, Instant::now()) {
                trace!(key, "Cache hit");
                return Ok(value);
            }

            if let Some(in_flight) = inner.in_flight.get(key) {
                debug!(key, "Joining in-flight request");
                in_flight.future.clone()
            } else {
                debug!(key, "Cache miss");
                inner.next_seq += 1;
                let id = inner.next_seq;
                let future = self.settle(key.to_string(), id, ttl, producer);
                inner.in_flight.insert(
                    key.to_string(),
                    InFlight {
                        id,
                        future: future.clone(),
                    },
                );
                future
            }
        };

        pending.await
    }

    /// Wrap `producer` so that, once it settles, the in-flight marker is
    /// cleared and a success is stored. A marker replaced by `del`/`clear`
    /// in the meantime is left alone and the result is not stored.
    fn settle<F, Fut>(&self, key: String, id: u64, ttl: Duration, producer: F) -> SharedResult<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let cache = Arc::clone(&self.inner);
        let max_items = self.max_items;

        async move {
            let result = producer().await;

            let mut inner = lock(&cache);
            let still_ours = inner.in_flight.get(&key).is_some_and(|f| f.id == id);
            if still_ours {
                inner.in_flight.remove(&key);
                if let Ok(value) = &result {
                    inner.insert(key, value.clone(), ttl, max_items);
                }
            }
            result
        }
        .boxed()
        .shared()
    }
}
