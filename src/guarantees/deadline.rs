//! Deadline-bound cancellation scopes.
//!
//! [`DeadlineContext`] is handed down into every sub-call made under an
//! execution so in-flight work is cancelled the moment the execution's
//! duration elapses. It is a child of a caller-supplied
//! [`CancellationToken`], so cancelling the parent cancels it too.

use std::future::Future;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancellation scope bound to an execution's deadline.
#[derive(Debug, Clone)]
pub struct DeadlineContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

/// Releases a [`DeadlineContext`]. Dropping the guard cancels the context.
#[derive(Debug)]
pub struct DeadlineGuard {
    token: CancellationToken,
    timer: Option<JoinHandle<()>>,
}

impl DeadlineContext {
    /// Derive a child scope of `parent` that expires at `deadline`.
    ///
    /// A deadline already in the past yields a context that is cancelled on
    /// return. When called inside a Tokio runtime a timer task cancels the
    /// token at the deadline; without one, expiry is still observed by
    /// [`is_done`](Self::is_done) and [`done`](Self::done).
    pub(crate) fn new(parent: &CancellationToken, deadline: Option<Instant>) -> (Self, DeadlineGuard) {
        let token = parent.child_token();
        let mut timer = None;

        match deadline {
            Some(at) if at <= Instant::now() => token.cancel(),
            Some(at) => {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    let timer_token = token.clone();
                    timer = Some(handle.spawn(async move {
                        tokio::select! {
                            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(at)) => {
                                timer_token.cancel();
                            }
                            _ = timer_token.cancelled() => {}
                        }
                    }));
                }
            }
            None => {}
        }

        let guard = DeadlineGuard {
            token: token.clone(),
            timer,
        };
        (Self { token, deadline }, guard)
    }

    /// Instant at which the scope expires; `None` when time is unlimited.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Token to pass into cancellable sub-calls.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Whether the scope has been cancelled or its deadline has passed.
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|at| Instant::now() >= at)
    }

    /// Resolves once the scope is cancelled or expires.
    pub async fn done(&self) {
        match self.deadline {
            Some(at) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(tokio::time::Instant::from_std(at)) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Run `work` unless the scope ends first; `None` if it was cut short.
    pub async fn run<F: Future>(&self, work: F) -> Option<F::Output> {
        if self.is_done() {
            return None;
        }
        tokio::select! {
            output = work => Some(output),
            _ = self.done() => None,
        }
    }
}

impl DeadlineGuard {
    /// Cancel the scope now.
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.token.cancel();
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.release();
    }
}
