use std::sync::Arc;

use foundation::ResourceKey;
use runtime::ReadinessGate;

use crate::backoff::{JitterSource, RandomJitter};
use crate::cache::SharedStatusCache;
use crate::controller::LoadSignals;

/// Whatever actually fetches a resource (an image element, an HTTP client).
///
/// `begin` must issue a brand-new request every time it is called and report
/// progress only through the `signals` it was handed. Signals may be used
/// synchronously from inside `begin` or later from any thread.
pub trait LoadSource: Send + Sync {
    fn begin(&self, key: &ResourceKey, signals: LoadSignals);
}

impl<F> LoadSource for F
where
    F: Fn(&ResourceKey, LoadSignals) + Send + Sync,
{
    fn begin(&self, key: &ResourceKey, signals: LoadSignals) {
        self(key, signals)
    }
}

/// Everything load controllers share: built once, cloned into each mount.
#[derive(Clone)]
pub struct LoaderContext {
    cache: SharedStatusCache,
    gate: ReadinessGate,
    source: Arc<dyn LoadSource>,
    jitter: Arc<dyn JitterSource>,
}

impl std::fmt::Debug for LoaderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderContext")
            .field("cache", &self.cache)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl LoaderContext {
    pub fn new(
        cache: SharedStatusCache,
        gate: ReadinessGate,
        source: Arc<dyn LoadSource>,
    ) -> Self {
        Self {
            cache,
            gate,
            source,
            jitter: Arc::new(RandomJitter),
        }
    }

    pub fn with_jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn cache(&self) -> &SharedStatusCache {
        &self.cache
    }

    pub fn gate(&self) -> &ReadinessGate {
        &self.gate
    }

    pub fn source(&self) -> &Arc<dyn LoadSource> {
        &self.source
    }

    pub fn jitter(&self) -> &Arc<dyn JitterSource> {
        &self.jitter
    }
}
