use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use runtime::{ScopedTimer, TimerTicket};
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{debug, trace};

use crate::config::ActionConfig;
use crate::error::ActionFailure;
use crate::status::ButtonStatus;

pub type ActionFuture<E> = BoxFuture<'static, Result<(), E>>;

type ActionFn<E> = Arc<dyn Fn() -> ActionFuture<E> + Send + Sync>;
type SuccessHook = Arc<dyn Fn() + Send + Sync>;
type ErrorHook<E> = Arc<dyn Fn(&ActionFailure<E>) + Send + Sync>;

/// Configures an [`ActionController`] before it is mounted.
pub struct ActionControllerBuilder<E> {
    action: ActionFn<E>,
    config: ActionConfig,
    on_success: Option<SuccessHook>,
    on_error: Option<ErrorHook<E>>,
}

impl<E: Send + Sync + 'static> ActionControllerBuilder<E> {
    pub fn new<F, Fut>(action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        Self {
            action: Arc::new(move || action().boxed()),
            config: ActionConfig::default(),
            on_success: None,
            on_error: None,
        }
    }

    pub fn config(mut self, config: ActionConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs once the success hold has elapsed.
    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(hook));
        self
    }

    /// Runs with the failure once the error hold has elapsed.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ActionFailure<E>) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn mount(self) -> ActionController<E> {
        let (status, _) = watch::channel(ButtonStatus::Idle);
        ActionController {
            shared: Arc::new(Shared {
                config: self.config,
                action: self.action,
                on_success: self.on_success,
                on_error: self.on_error,
                status,
                state: Mutex::new(ActionState {
                    status: ButtonStatus::Idle,
                    failure: None,
                    cycle: 0,
                    pending: ScopedTimer::new(),
                    mounted: true,
                }),
            }),
        }
    }
}

struct ActionState<E> {
    status: ButtonStatus,
    failure: Option<Arc<ActionFailure<E>>>,
    cycle: u64,
    // Hold timer, then reset timer; never both.
    pending: ScopedTimer,
    mounted: bool,
}

struct Shared<E> {
    config: ActionConfig,
    action: ActionFn<E>,
    on_success: Option<SuccessHook>,
    on_error: Option<ErrorHook<E>>,
    status: watch::Sender<ButtonStatus>,
    state: Mutex<ActionState<E>>,
}

enum Settled<E> {
    Success,
    Error(Arc<ActionFailure<E>>),
}

/// Runs one user action at a time and times its success/error feedback.
///
/// `Idle → Loading → Success | Error → (hold) callback → (reset delay) Idle`
///
/// Triggers while `Loading` are ignored. A trigger accepted during a hold or
/// reset delay cancels that pending timer first, so a previous cycle's
/// callback or reset can never fire into the new one. Dropping the
/// controller cancels its timer and suppresses further callbacks; the action
/// itself is left to finish on its own.
pub struct ActionController<E> {
    shared: Arc<Shared<E>>,
}

impl<E: Send + Sync + 'static> ActionController<E> {
    pub fn builder<F, Fut>(action: F) -> ActionControllerBuilder<E>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        ActionControllerBuilder::new(action)
    }

    /// Starts the action. Returns `false` if the trigger was ignored.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn trigger(&self) -> bool {
        let cycle = {
            let mut state = self.shared.state.lock();
            if !state.mounted || state.status == ButtonStatus::Loading {
                trace!("ignoring trigger while {:?}", state.status);
                return false;
            }
            state.pending.cancel();
            state.cycle += 1;
            state.failure = None;
            self.shared.publish(&mut state, ButtonStatus::Loading);
            state.cycle
        };

        // Called inside the task so a panic while building the future is
        // captured like one raised while polling it.
        let action = self.shared.action.clone();
        let run = tokio::spawn(async move { action().await });
        let weak = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            let outcome = run.await;
            if let Some(shared) = weak.upgrade() {
                shared.settle(cycle, outcome);
            }
        });
        true
    }

    pub fn status(&self) -> ButtonStatus {
        self.shared.state.lock().status
    }

    /// The failure being displayed, if the last cycle failed.
    pub fn failure(&self) -> Option<Arc<ActionFailure<E>>> {
        self.shared.state.lock().failure.clone()
    }

    pub fn is_disabled(&self) -> bool {
        self.status() == ButtonStatus::Loading
    }

    pub fn has_pending_timer(&self) -> bool {
        self.shared.state.lock().pending.is_armed()
    }

    /// Re-render hook: observes every status transition.
    pub fn watch(&self) -> watch::Receiver<ButtonStatus> {
        self.shared.status.subscribe()
    }

    pub fn config(&self) -> &ActionConfig {
        &self.shared.config
    }
}

impl<E> Drop for ActionController<E> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.mounted = false;
        state.pending.cancel();
    }
}

impl<E: Send + Sync + 'static> Shared<E> {
    fn publish(&self, state: &mut ActionState<E>, status: ButtonStatus) {
        state.status = status;
        self.status.send_replace(status);
    }

    fn settle(self: &Arc<Self>, cycle: u64, outcome: Result<Result<(), E>, JoinError>) {
        let mut state = self.state.lock();
        if !state.mounted || state.cycle != cycle || state.status != ButtonStatus::Loading {
            return;
        }

        let next = match outcome {
            Ok(Ok(())) => ButtonStatus::Success,
            Ok(Err(e)) => {
                state.failure = Some(Arc::new(ActionFailure::Rejected(e)));
                ButtonStatus::Error
            }
            Err(join) => {
                state.failure = Some(Arc::new(ActionFailure::from_join(join)));
                ButtonStatus::Error
            }
        };
        debug!("action settled as {next:?}; holding for {}ms", self.config.wait_ms);
        self.publish(&mut state, next);

        let weak = Arc::downgrade(self);
        state.pending.arm(self.config.wait(), move |ticket| {
            if let Some(shared) = weak.upgrade() {
                shared.on_hold_elapsed(ticket);
            }
        });
    }

    fn on_hold_elapsed(self: &Arc<Self>, ticket: TimerTicket) {
        let settled = {
            let mut state = self.state.lock();
            if !state.mounted || !state.pending.claim(ticket) {
                return;
            }
            // Armed before the hook runs so a trigger from inside the hook
            // cancels it.
            if self.config.auto_reset {
                let weak = Arc::downgrade(self);
                state.pending.arm(self.config.reset_delay(), move |ticket| {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_reset(ticket);
                    }
                });
            }
            match state.status {
                ButtonStatus::Success => Some(Settled::Success),
                ButtonStatus::Error => state.failure.clone().map(Settled::Error),
                ButtonStatus::Idle | ButtonStatus::Loading => None,
            }
        };

        match settled {
            Some(Settled::Success) => {
                if let Some(hook) = &self.on_success {
                    hook();
                }
            }
            Some(Settled::Error(failure)) => {
                if let Some(hook) = &self.on_error {
                    hook(&failure);
                }
            }
            None => {}
        }
    }

    fn on_reset(&self, ticket: TimerTicket) {
        let mut state = self.state.lock();
        if !state.mounted || !state.pending.claim(ticket) {
            return;
        }
        state.failure = None;
        self.publish(&mut state, ButtonStatus::Idle);
        debug!("action control reset");
    }
}
