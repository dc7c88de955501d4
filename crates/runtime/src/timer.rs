use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

/// Identifies one arming of a [`ScopedTimer`].
///
/// The fired callback receives its ticket and must hand it back to
/// [`ScopedTimer::claim`] (under the owner's lock) before mutating anything.
/// A ticket from a cancelled or superseded arming never claims.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TimerTicket(u64);

#[derive(Debug)]
struct Armed {
    ticket: TimerTicket,
    deadline: Option<Instant>,
    task: JoinHandle<()>,
}

/// A single-slot delayed callback owned by one controller.
///
/// At most one callback is outstanding: arming again cancels the previous
/// one first. Dropping the timer cancels whatever is armed.
///
/// Arming spawns onto the current Tokio runtime, so it must happen inside
/// one.
#[derive(Debug, Default)]
pub struct ScopedTimer {
    next_ticket: u64,
    armed: Option<Armed>,
}

impl ScopedTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `fire` to run once `delay` has elapsed.
    pub fn arm<F>(&mut self, delay: Duration, fire: F) -> TimerTicket
    where
        F: FnOnce(TimerTicket) + Send + 'static,
    {
        self.cancel();

        let ticket = TimerTicket(self.next_ticket);
        self.next_ticket = self.next_ticket.wrapping_add(1);

        // The deadline is fixed at arming time, not when the task first polls.
        let deadline = Instant::now().checked_add(delay);
        let task = tokio::spawn(async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
            fire(ticket);
        });

        self.armed = Some(Armed {
            ticket,
            deadline,
            task,
        });
        ticket
    }

    /// Cancels the outstanding callback.
    ///
    /// Returns `true` if something was armed.
    pub fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some(armed) => {
                armed.task.abort();
                true
            }
            None => false,
        }
    }

    /// Accepts a fired ticket if it is still the current arming.
    ///
    /// On success the slot becomes empty; the caller is now the one allowed to
    /// act on the expiry.
    pub fn claim(&mut self, ticket: TimerTicket) -> bool {
        match &self.armed {
            Some(armed) if armed.ticket == ticket => {
                // Detach rather than abort: we are running inside that task.
                self.armed = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.as_ref().and_then(|a| a.deadline)
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
