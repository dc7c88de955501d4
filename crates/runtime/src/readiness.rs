use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Where the gate is being evaluated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GateMode {
    /// A pre-render pass. The gate never opens.
    PreRender,
    /// The interactive client. The gate opens once, when confirmed.
    Client,
}

#[derive(Debug)]
struct GateInner {
    mode: GateMode,
    ready: watch::Sender<bool>,
}

/// Reports whether work may start in the final interactive context.
///
/// The value is a one-way latch: `false` until [`confirm_interactive`] is
/// called on a client gate, `true` from then on. Repeated reads never
/// flicker. A pre-render gate is fixed at `false`.
///
/// Clones share the same latch.
///
/// [`confirm_interactive`]: ReadinessGate::confirm_interactive
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    inner: Arc<GateInner>,
}

impl ReadinessGate {
    fn with(mode: GateMode, ready: bool) -> Self {
        let (ready, _) = watch::channel(ready);
        Self {
            inner: Arc::new(GateInner { mode, ready }),
        }
    }

    pub fn pre_render() -> Self {
        Self::with(GateMode::PreRender, false)
    }

    /// A client gate that has not yet been confirmed.
    pub fn client() -> Self {
        Self::with(GateMode::Client, false)
    }

    /// A client gate that is already open.
    pub fn interactive() -> Self {
        Self::with(GateMode::Client, true)
    }

    pub fn mode(&self) -> GateMode {
        self.inner.mode
    }

    pub fn is_ready(&self) -> bool {
        self.inner.mode == GateMode::Client && *self.inner.ready.borrow()
    }

    /// Opens the gate.
    ///
    /// Returns `true` only for the call that actually flipped it. Ignored on a
    /// pre-render gate.
    pub fn confirm_interactive(&self) -> bool {
        if self.inner.mode == GateMode::PreRender {
            return false;
        }
        let flipped = self.inner.ready.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });
        if flipped {
            debug!("readiness gate opened");
        }
        flipped
    }

    /// Resolves once the gate is open. Never resolves on a pre-render gate.
    pub async fn ready(&self) {
        if self.inner.mode == GateMode::PreRender {
            return std::future::pending().await;
        }
        let mut rx = self.inner.ready.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{GateMode, ReadinessGate};

    #[test]
    fn pre_render_gate_stays_closed() {
        let gate = ReadinessGate::pre_render();
        assert_eq!(gate.mode(), GateMode::PreRender);
        assert!(!gate.confirm_interactive());
        assert!(!gate.is_ready());
        assert!(!gate.is_ready());
    }

    #[test]
    fn client_gate_latches_open() {
        let gate = ReadinessGate::client();
        let other = gate.clone();
        assert!(!gate.is_ready());

        assert!(other.confirm_interactive());
        assert!(!other.confirm_interactive());
        assert!(gate.is_ready());
        assert!(gate.is_ready());
        assert!(ReadinessGate::interactive().is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn ready_resolves_when_confirmed() {
        let gate = ReadinessGate::client();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.ready().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        gate.confirm_interactive();
        tokio::time::timeout(Duration::from_millis(10), waiter)
            .await
            .expect("waiter resolves")
            .expect("waiter task");
    }

    #[tokio::test(start_paused = true)]
    async fn ready_never_resolves_before_render() {
        let gate = ReadinessGate::pre_render();
        gate.confirm_interactive();
        let outcome = tokio::time::timeout(Duration::from_secs(60), gate.ready()).await;
        assert!(outcome.is_err());
    }
}
