use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use foundation::ResourceKey;
use parking_lot::RwLock;
use tracing::trace;

use crate::status::SourceStatus;

type Listener = Arc<dyn Fn(&ResourceKey, SourceStatus) + Send + Sync>;

#[derive(Default)]
struct CacheInner {
    statuses: DashMap<ResourceKey, SourceStatus>,
    listeners: RwLock<HashMap<ResourceKey, Vec<(u64, Listener)>>>,
    next_listener: AtomicU64,
}

/// Process-wide status of every resource key seen so far.
///
/// Construct one per process (or per test) and hand clones to every
/// controller; clones share the same map.
///
/// Notes:
/// - Unknown keys read as [`SourceStatus::Idle`].
/// - Writes are last-write-wins per key.
/// - Listeners run synchronously inside [`set`](Self::set), after the new
///   value is visible, and with no cache lock held. Only listeners registered
///   before the call are notified.
/// - Entries are never evicted.
#[derive(Clone, Default)]
pub struct SharedStatusCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for SharedStatusCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStatusCache")
            .field("entries", &self.inner.statuses.len())
            .finish()
    }
}

impl SharedStatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ResourceKey) -> SourceStatus {
        self.inner
            .statuses
            .get(key)
            .map(|s| *s.value())
            .unwrap_or_default()
    }

    pub fn set(&self, key: &ResourceKey, status: SourceStatus) {
        self.inner.statuses.insert(key.clone(), status);
        trace!("source status {key} -> {status:?}");

        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .read()
            .get(key)
            .map(|ls| ls.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        for listener in listeners {
            listener(key, status);
        }
    }

    /// Registers `listener` for every subsequent `set` on `key`.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or [`Subscription::unsubscribe`] is called.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn subscribe<F>(&self, key: &ResourceKey, listener: F) -> Subscription
    where
        F: Fn(&ResourceKey, SourceStatus) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .write()
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(listener)));

        Subscription {
            cache: Arc::downgrade(&self.inner),
            key: key.clone(),
            id,
        }
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.inner.statuses.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.statuses.is_empty()
    }

    pub fn listener_count(&self, key: &ResourceKey) -> usize {
        self.inner
            .listeners
            .read()
            .get(key)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Handle returned by [`SharedStatusCache::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    cache: Weak<CacheInner>,
    key: ResourceKey,
    id: u64,
}

impl Subscription {
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn unsubscribe(self) {
        // Deregistration happens in Drop.
    }

    fn release(&self) {
        let Some(cache) = self.cache.upgrade() else {
            return;
        };
        let mut listeners = cache.listeners.write();
        if let Some(ls) = listeners.get_mut(&self.key) {
            ls.retain(|(id, _)| *id != self.id);
            if ls.is_empty() {
                listeners.remove(&self.key);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
