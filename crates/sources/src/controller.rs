use std::sync::{Arc, Weak};

use foundation::{LoadId, ResourceKey};
use parking_lot::Mutex;
use runtime::{ScopedTimer, TimerTicket};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::backoff::Backoff;
use crate::cache::Subscription;
use crate::config::LoadConfig;
use crate::source::LoaderContext;
use crate::status::SourceStatus;

/// Where the current key's attempt sequence stands.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    /// Nothing issued yet (no key, or the gate is closed).
    Waiting,
    /// `current` has been handed to the source and may still report.
    InFlight,
    /// `current` failed; a retry timer is armed. A late success still counts.
    BackingOff,
    /// Complete, exhausted, adopted from the cache, or unmounted.
    Settled,
}

struct LoadState {
    key: Option<ResourceKey>,
    generation: u64,
    current: LoadId,
    phase: Phase,
    watchdog: ScopedTimer,
    retry: ScopedTimer,
    readiness: Option<JoinHandle<()>>,
    mounted: bool,
}

impl LoadState {
    fn accepts(&self, id: LoadId, phases: &[Phase]) -> bool {
        self.mounted && self.current == id && phases.contains(&self.phase)
    }

    fn clear_timers(&mut self) {
        self.watchdog.cancel();
        self.retry.cancel();
    }
}

struct Shared {
    ctx: LoaderContext,
    config: LoadConfig,
    backoff: Backoff,
    state: Mutex<LoadState>,
}

/// Which of a controller's timers are outstanding.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PendingTimers {
    pub watchdog: bool,
    pub retry: bool,
}

impl PendingTimers {
    pub fn any(&self) -> bool {
        self.watchdog || self.retry
    }
}

/// Drives one consumer's load of a resource key.
///
/// The controller starts a load once the readiness gate is open, arms a
/// watchdog when the source reports the load started, and on failure or
/// watchdog expiry either schedules a backed-off restart or gives up and
/// records `Error` in the shared cache.
///
/// Dropping the controller unmounts it: timers are cancelled and nothing it
/// started writes to the cache afterwards.
pub struct LoadController {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for LoadController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("LoadController")
            .field("key", &state.key)
            .field("current", &state.current)
            .field("phase", &state.phase)
            .finish()
    }
}

impl LoadController {
    /// Mounts a controller for `key`. Must be called inside a Tokio runtime.
    pub fn mount(ctx: &LoaderContext, key: Option<ResourceKey>, config: LoadConfig) -> Self {
        let backoff = Backoff::new(config.delay, ctx.jitter().clone());
        let shared = Arc::new(Shared {
            ctx: ctx.clone(),
            config,
            backoff,
            state: Mutex::new(LoadState {
                key,
                generation: 0,
                current: LoadId::new(0, 0),
                phase: Phase::Waiting,
                watchdog: ScopedTimer::new(),
                retry: ScopedTimer::new(),
                readiness: None,
                mounted: true,
            }),
        });
        shared.sync();
        Self { shared }
    }

    /// Status to render. A missing key renders as `Error` without touching
    /// the cache.
    pub fn status(&self) -> SourceStatus {
        match self.key() {
            Some(key) => self.shared.ctx.cache().get(&key),
            None => SourceStatus::Error,
        }
    }

    pub fn shows_fallback(&self) -> bool {
        self.status() == SourceStatus::Error
    }

    pub fn shows_indicator(&self) -> bool {
        self.status().is_pending()
    }

    pub fn key(&self) -> Option<ResourceKey> {
        self.shared.state.lock().key.clone()
    }

    /// Restarts issued so far for the current key.
    pub fn attempt(&self) -> u32 {
        self.shared.state.lock().current.attempt()
    }

    /// Identity of the attempt the controller is currently waiting on.
    pub fn current_load(&self) -> Option<LoadId> {
        let state = self.shared.state.lock();
        match state.phase {
            Phase::InFlight | Phase::BackingOff => Some(state.current),
            Phase::Waiting | Phase::Settled => None,
        }
    }

    pub fn pending_timers(&self) -> PendingTimers {
        let state = self.shared.state.lock();
        PendingTimers {
            watchdog: state.watchdog.is_armed(),
            retry: state.retry.is_armed(),
        }
    }

    pub fn config(&self) -> &LoadConfig {
        &self.shared.config
    }

    /// Registers a re-render hook for status changes of the current key.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn subscribe<F>(&self, listener: F) -> Option<Subscription>
    where
        F: Fn(&ResourceKey, SourceStatus) + Send + Sync + 'static,
    {
        let key = self.key()?;
        Some(self.shared.ctx.cache().subscribe(&key, listener))
    }

    /// Switches to another resource. Resets the attempt count and discards
    /// every timer and signal belonging to the previous key.
    pub fn set_key(&self, key: Option<ResourceKey>) {
        {
            let mut state = self.shared.state.lock();
            if state.key == key {
                return;
            }
            state.clear_timers();
            state.generation += 1;
            state.current = LoadId::new(state.generation, 0);
            state.phase = Phase::Waiting;
            state.key = key;
        }
        self.shared.sync();
    }
}

impl Drop for LoadController {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.mounted = false;
        state.phase = Phase::Settled;
        state.clear_timers();
        if let Some(task) = state.readiness.take() {
            task.abort();
        }
    }
}

impl Shared {
    /// Starts the first attempt for the current key if nothing stands in the
    /// way.
    fn sync(self: &Arc<Self>) {
        let (key, id, write_loading) = {
            let mut state = self.state.lock();
            if !state.mounted || state.phase != Phase::Waiting {
                return;
            }
            let Some(key) = state.key.clone() else {
                return;
            };
            if !self.ctx.gate().is_ready() {
                self.await_readiness(&mut state);
                return;
            }

            let cached = self.ctx.cache().get(&key);
            if cached.is_terminal() {
                trace!("{key} already {cached:?}; nothing to load");
                state.phase = Phase::Settled;
                return;
            }

            state.phase = Phase::InFlight;
            (key, state.current, cached == SourceStatus::Idle)
        };

        if write_loading {
            self.ctx.cache().set(&key, SourceStatus::Loading);
        }
        self.issue(key, id);
    }

    fn await_readiness(self: &Arc<Self>, state: &mut LoadState) {
        if state.readiness.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        let weak = Arc::downgrade(self);
        let gate = self.ctx.gate().clone();
        state.readiness = Some(tokio::spawn(async move {
            gate.ready().await;
            if let Some(shared) = weak.upgrade() {
                shared.sync();
            }
        }));
    }

    fn issue(self: &Arc<Self>, key: ResourceKey, id: LoadId) {
        debug!("loading {key} (attempt {})", id.attempt());
        let signals = LoadSignals {
            id,
            key: key.clone(),
            shared: Arc::downgrade(self),
        };
        self.ctx.source().begin(&key, signals);
    }

    fn on_started(self: &Arc<Self>, id: LoadId) {
        let mut state = self.state.lock();
        if !state.accepts(id, &[Phase::InFlight]) {
            trace!("ignoring start of stale load {id}");
            return;
        }
        state.retry.cancel();
        let weak = Arc::downgrade(self);
        state.watchdog.arm(self.config.timeout(), move |ticket| {
            if let Some(shared) = weak.upgrade() {
                shared.on_watchdog(ticket);
            }
        });
    }

    fn on_succeeded(&self, id: LoadId) {
        let key = {
            let mut state = self.state.lock();
            if !state.accepts(id, &[Phase::InFlight, Phase::BackingOff]) {
                trace!("ignoring success of stale load {id}");
                return;
            }
            state.clear_timers();
            state.phase = Phase::Settled;
            state.key.clone()
        };
        if let Some(key) = key {
            debug!("loaded {key} (attempt {})", id.attempt());
            self.ctx.cache().set(&key, SourceStatus::Complete);
        }
    }

    fn on_failed(self: &Arc<Self>, id: LoadId) {
        // Jitter sources are user code; sample before taking the lock.
        let jitter = self.backoff.sample();
        let exhausted = {
            let mut state = self.state.lock();
            if !state.accepts(id, &[Phase::InFlight]) {
                trace!("ignoring failure of stale load {id}");
                return;
            }
            state.watchdog.cancel();
            self.decide_retry(&mut state, jitter)
        };
        self.give_up(exhausted);
    }

    fn on_watchdog(self: &Arc<Self>, ticket: TimerTicket) {
        let jitter = self.backoff.sample();
        let exhausted = {
            let mut state = self.state.lock();
            if !state.mounted || !state.watchdog.claim(ticket) || state.phase != Phase::InFlight {
                return;
            }
            if let Some(key) = &state.key {
                debug!(
                    "{key} timed out after {}ms (attempt {})",
                    self.config.timeout_ms,
                    state.current.attempt()
                );
            }
            self.decide_retry(&mut state, jitter)
        };
        self.give_up(exhausted);
    }

    /// Schedules the next restart, or returns the key to mark as failed.
    ///
    /// Nothing is scheduled or written once another consumer has settled the
    /// key in the cache.
    fn decide_retry(self: &Arc<Self>, state: &mut LoadState, jitter: f64) -> Option<ResourceKey> {
        let attempt = state.current.attempt();
        let key = state.key.clone()?;

        if self.adopt_settled(state, &key) {
            return None;
        }

        if attempt < self.config.retries {
            let delay = self.backoff.delay_with(attempt, jitter);
            debug!(
                "retrying {key} in {delay:?} ({} of {})",
                attempt + 1,
                self.config.retries
            );
            state.phase = Phase::BackingOff;
            let weak = Arc::downgrade(self);
            state.retry.arm(delay, move |ticket| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_retry(ticket);
                }
            });
            None
        } else {
            warn!("giving up on {key} after {} attempts", attempt + 1);
            state.clear_timers();
            state.phase = Phase::Settled;
            Some(key)
        }
    }

    /// Stops this consumer if the key is already `Complete` or `Error`.
    fn adopt_settled(&self, state: &mut LoadState, key: &ResourceKey) -> bool {
        let cached = self.ctx.cache().get(key);
        if !cached.is_terminal() {
            return false;
        }
        trace!("{key} settled elsewhere as {cached:?}; dropping attempt {}", state.current);
        state.clear_timers();
        state.phase = Phase::Settled;
        true
    }

    fn give_up(&self, key: Option<ResourceKey>) {
        if let Some(key) = key {
            self.ctx.cache().set(&key, SourceStatus::Error);
        }
    }

    fn on_retry(self: &Arc<Self>, ticket: TimerTicket) {
        let (key, id) = {
            let mut state = self.state.lock();
            if !state.mounted || !state.retry.claim(ticket) || state.phase != Phase::BackingOff {
                return;
            }
            let Some(key) = state.key.clone() else {
                return;
            };
            if self.adopt_settled(&mut state, &key) {
                return;
            }
            state.watchdog.cancel();
            state.current = state.current.next_attempt();
            state.phase = Phase::InFlight;
            (key, state.current)
        };
        self.issue(key, id);
    }
}

/// Progress reporter bound to exactly one load attempt.
///
/// Reports from an attempt that has been superseded (restarted, re-keyed or
/// unmounted) are dropped.
#[derive(Clone)]
pub struct LoadSignals {
    id: LoadId,
    key: ResourceKey,
    shared: Weak<Shared>,
}

impl std::fmt::Debug for LoadSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadSignals")
            .field("id", &self.id)
            .field("key", &self.key)
            .finish()
    }
}

impl LoadSignals {
    pub fn id(&self) -> LoadId {
        self.id
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// The request is on the wire; arms the watchdog.
    pub fn started(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_started(self.id);
        }
    }

    pub fn succeeded(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_succeeded(self.id);
        }
    }

    pub fn failed(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_failed(self.id);
        }
    }
}
