//! Wait budgets for awaits.
//!
//! An [`AwaitContext`] bounds how long an await keeps waiting for a passing
//! value: by a deadline, by an explicit cancel signal, or both. It never
//! interrupts a lookup that is already running.

use std::future::pending;

use statecheck_core::FetchError;
use tokio::sync::watch;
use tokio::time::{sleep_until, Duration, Instant};

/// Deadline and cancellation for one or more awaits.
///
/// Cloning is cheap; clones share the cancel signal.
#[derive(Debug, Clone, Default)]
pub struct AwaitContext {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Cancels every [`AwaitContext`] created from it.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl AwaitContext {
    /// No deadline and no cancellation: waits until a value passes or the
    /// stream ends.
    pub fn background() -> Self {
        Self::default()
    }

    /// Expire `timeout` from now. A timeout too large to represent as an
    /// instant never expires.
    pub fn timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::until(deadline),
            None => Self::background(),
        }
    }

    /// Expire at `deadline`.
    pub fn until(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: None,
        }
    }

    /// A background context plus the handle that cancels it.
    pub fn cancellable() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            deadline: None,
            cancel: Some(rx),
        };
        (CancelHandle { tx }, ctx)
    }

    /// Attach a cancel signal to this context; `true` on the channel cancels.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Tighten the deadline; an earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// True once the deadline has passed or the context was cancelled.
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.deadline.is_some_and(|d| d <= Instant::now())
    }

    /// Resolve when the context ends, with the reason as a fetch error.
    ///
    /// Never resolves for a background context. Cancellation wins when both
    /// conditions already hold.
    pub async fn done(&self) -> FetchError {
        let expired = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => pending::<()>().await,
            }
        };

        let cancelled = async {
            match self.cancel.clone() {
                Some(mut rx) => loop {
                    if *rx.borrow_and_update() {
                        break;
                    }
                    if rx.changed().await.is_err() {
                        // handle dropped without cancelling
                        pending::<()>().await;
                    }
                },
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => FetchError::cancelled(),
            _ = expired => FetchError::deadline_exceeded(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statecheck_core::FetchErrorKind;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_expires() {
        let ctx = AwaitContext::timeout(Duration::from_secs(2));
        assert!(!ctx.is_done());
        assert_eq!(ctx.remaining(), Some(Duration::from_secs(2)));

        let cause = ctx.done().await;
        assert!(cause.is_timeout());
        assert!(ctx.is_done());
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_resolves_done() {
        let (handle, ctx) = AwaitContext::cancellable();
        let waiter = ctx.clone();
        let task = tokio::spawn(async move { waiter.done().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!ctx.is_done());
        handle.cancel();

        let cause = task.await.unwrap();
        assert_eq!(cause.kind(), FetchErrorKind::Cancelled);
        assert!(ctx.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_wait_wins_over_deadline() {
        let (handle, ctx) = AwaitContext::cancellable();
        let ctx = ctx.with_deadline(Instant::now());
        handle.cancel();
        assert_eq!(ctx.done().await.kind(), FetchErrorKind::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_never_resolves() {
        let ctx = AwaitContext::background();
        let result = tokio::time::timeout(Duration::from_secs(3600), ctx.done()).await;
        assert!(result.is_err());
        assert!(ctx.remaining().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_does_not_cancel() {
        let (handle, ctx) = AwaitContext::cancellable();
        drop(handle);
        let ctx = ctx.with_deadline(Instant::now() + Duration::from_secs(1));
        assert!(ctx.done().await.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_timeout_never_expires() {
        let ctx = AwaitContext::timeout(Duration::MAX);
        assert!(ctx.deadline().is_none());
        assert!(!ctx.is_done());
        let result = tokio::time::timeout(Duration::from_secs(3600), ctx.done()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_with_deadline_keeps_earliest() {
        let now = Instant::now();
        let ctx = AwaitContext::until(now + Duration::from_secs(1))
            .with_deadline(now + Duration::from_secs(5));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(1)));
    }
}
