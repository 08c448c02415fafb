//! Per-conversation state: prior turns and previously used context passages.
//!
//! Each store is a [`TtlLruCache`]: a bounded map whose entries expire a
//! fixed time after they were created and which drops the least recently
//! used entry when full. Values are shared handles, so a caller that mutates
//! the returned list sees its changes on the next lookup for the same id.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use helperbot_core::message::{ContextPassage, ConversationId, Turn};
use lru::LruCache;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// How often the background sweeper purges expired conversations.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// A mutable list shared between the cache and its callers.
pub type Shared<T> = Arc<Mutex<Vec<T>>>;

/// Bounded map with absolute expiry and least-recently-used eviction.
///
/// Reading an entry refreshes its LRU position but not its expiry.
pub struct TtlLruCache<K: Hash + Eq, V> {
    inner: LruCache<K, (Instant, V)>,
    ttl: Duration,
}

impl<K: Hash + Eq + Clone, V: Clone> TtlLruCache<K, V> {
    /// A `capacity` of zero is treated as one.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(capacity),
            ttl,
        }
    }

    /// Return the live value for `key`, creating it with `make` if it is
    /// missing or expired.
    pub fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> V {
        let now = Instant::now();
        if let Some((created, value)) = self.inner.get(&key) {
            if now.duration_since(*created) < self.ttl {
                return value.clone();
            }
        }

        self.inner.pop(&key);
        let value = make();
        if let Some((_, (evicted_at, _))) = self.inner.push(key, (now, value.clone())) {
            debug!(
                age_secs = now.duration_since(evicted_at).as_secs(),
                "Evicted least recently used entry"
            );
        }
        value
    }

    /// Return the live value for `key` without creating one.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = Instant::now();
        let expired = match self.inner.get(key) {
            Some((created, value)) if now.duration_since(*created) < self.ttl => {
                return Some(value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.inner.pop(key);
        }
        None
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<K> = self
            .inner
            .iter()
            .filter(|(_, (created, _))| now.duration_since(*created) >= self.ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.inner.pop(key);
        }
        expired.len()
    }

    /// Number of stored entries, including ones that expired but were not
    /// yet looked up.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Two independent stores keyed by conversation: turns and context passages.
///
/// Both use the same capacity and time-to-live.
pub struct ConversationCache {
    turns: Mutex<TtlLruCache<ConversationId, Shared<Turn>>>,
    contexts: Mutex<TtlLruCache<ConversationId, Shared<ContextPassage>>>,
}

impl ConversationCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            turns: Mutex::new(TtlLruCache::new(max_entries, ttl)),
            contexts: Mutex::new(TtlLruCache::new(max_entries, ttl)),
        }
    }

    /// The turn list for `id`, created empty on first access or after expiry.
    pub fn turns(&self, id: &ConversationId) -> Shared<Turn> {
        lock(&self.turns).get_or_insert_with(id.clone(), Default::default)
    }

    /// The context list for `id`, created empty on first access or after expiry.
    pub fn contexts(&self, id: &ConversationId) -> Shared<ContextPassage> {
        lock(&self.contexts).get_or_insert_with(id.clone(), Default::default)
    }

    /// Number of conversations with stored turns.
    pub fn conversations(&self) -> usize {
        lock(&self.turns).len()
    }

    /// Drop expired entries from both stores.
    pub fn purge_expired(&self) -> usize {
        lock(&self.turns).purge_expired() + lock(&self.contexts).purge_expired()
    }

    /// Purge expired conversations every `every` until the returned task is
    /// aborted. Expired entries otherwise stay resident until touched or
    /// pushed out by newer ones.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        let every = every.max(MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let purged = self.purge_expired();
                if purged > 0 {
                    debug!(purged, "Swept expired conversations");
                }
            }
        })
    }
}

/// Lock a mutex, recovering the data if another holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
