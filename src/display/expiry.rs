//! Expiry timers for the display.
//!
//! Every detection change arms its own short-lived task that waits out the
//! expiry delay and then runs a clear action. Tasks hold an [`ExpiryToken`];
//! cancelling the token wakes the task and turns the action into a no-op.

use anyhow::{Context, Result};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// What happens to pending timers when a newer change arms another one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExpiryPolicy {
    /// Every armed timer fires and clears the display, including timers
    /// armed for changes that have since been superseded. A stale timer can
    /// therefore blank a display that was updated less than one delay ago.
    #[default]
    FireAll,
    /// Arming a timer cancels all pending ones, so the display always lives
    /// a full delay after the latest change.
    CancelSuperseded,
}

impl ExpiryPolicy {
    pub fn from_cancel_flag(cancel_superseded: bool) -> Self {
        if cancel_superseded {
            ExpiryPolicy::CancelSuperseded
        } else {
            ExpiryPolicy::FireAll
        }
    }
}

/// Cancellation handle shared between the scheduler and one task.
#[derive(Debug, Default)]
pub struct ExpiryToken {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl ExpiryToken {
    pub fn cancel(&self) {
        match self.cancelled.lock() {
            Ok(mut cancelled) => *cancelled = true,
            Err(poisoned) => *poisoned.into_inner() = true,
        }
        self.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.lock().map(|c| *c).unwrap_or(true)
    }

    /// Block for `delay` or until cancelled. Returns true when cancelled.
    fn wait(&self, delay: Duration) -> bool {
        let Ok(guard) = self.cancelled.lock() else {
            return true;
        };
        match self.wake.wait_timeout_while(guard, delay, |cancelled| !*cancelled) {
            Ok((cancelled, _)) => *cancelled,
            Err(_) => true,
        }
    }
}

struct PendingExpiry {
    token: Arc<ExpiryToken>,
    join: JoinHandle<()>,
}

/// Spawns and tracks expiry tasks.
pub struct ExpiryScheduler {
    policy: ExpiryPolicy,
    pending: Vec<PendingExpiry>,
    armed: u64,
}

impl ExpiryScheduler {
    pub fn new(policy: ExpiryPolicy) -> Self {
        Self {
            policy,
            pending: Vec::new(),
            armed: 0,
        }
    }

    /// Run `action` after `delay` on a separate thread, unless cancelled first.
    ///
    /// Does not cancel anything itself; callers apply the supersede policy
    /// via [`ExpiryScheduler::supersede`] so they can do it under their own lock.
    pub fn arm<F>(&mut self, delay: Duration, action: F) -> Result<()>
    where
        F: FnOnce(&ExpiryToken) + Send + 'static,
    {
        self.reap();

        let token = Arc::new(ExpiryToken::default());
        let task_token = Arc::clone(&token);
        let join = thread::Builder::new()
            .name("display-expiry".to_string())
            .spawn(move || {
                if task_token.wait(delay) {
                    return;
                }
                action(&task_token);
            })
            .context("spawn display expiry task")?;

        self.pending.push(PendingExpiry { token, join });
        self.armed += 1;
        Ok(())
    }

    /// Apply the policy to pending tasks ahead of arming a new one.
    pub fn supersede(&mut self) {
        if self.policy == ExpiryPolicy::CancelSuperseded {
            self.cancel_pending();
        }
    }

    /// Cancel every pending task without waiting for it to exit.
    pub fn cancel_pending(&mut self) {
        for task in &self.pending {
            task.token.cancel();
        }
    }

    /// Cancel every pending task and wait for all of them to exit.
    pub fn shutdown(&mut self) {
        self.cancel_pending();
        for task in self.pending.drain(..) {
            if task.join.join().is_err() {
                log::error!("display expiry task panicked");
            }
        }
    }

    /// Tasks that have not finished yet.
    pub fn pending(&self) -> usize {
        self.pending.iter().filter(|t| !t.join.is_finished()).count()
    }

    /// Total tasks armed over the scheduler's lifetime.
    pub fn armed(&self) -> u64 {
        self.armed
    }

    fn reap(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|t| t.join.is_finished());
        self.pending = running;
        for task in finished {
            if task.join.join().is_err() {
                log::error!("display expiry task panicked");
            }
        }
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
