//! Caller-supplied cancellation for `wait`.
//!
//! A `WaitContext` may carry a deadline, an external cancel signal, both,
//! or neither. Clones observe the same cancel signal.
use std::future::pending;

use tokio::sync::watch;
use tokio::time::{sleep_until, Duration, Instant};

use crate::error::ShareLimitError;

#[derive(Clone, Debug, Default)]
pub struct WaitContext {
    deadline: Option<Instant>,
    cancelled: Option<watch::Receiver<bool>>,
}

/// Fires every clone of the context it was created with
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // send_replace never fails, even with no receivers left
        self.tx.send_replace(true);
    }
}

impl WaitContext {
    /// A context that never fires
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().timeout(timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self::background().deadline_at(deadline)
    }

    pub fn cancellable() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            deadline: None,
            cancelled: Some(rx),
        };
        (ctx, CancelHandle { tx })
    }

    /// Tighten the deadline to at most `timeout` from now
    pub fn timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline_at(deadline)
    }

    /// Tighten the deadline to at most `deadline`
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Report an already-fired context without waiting
    pub fn check(&self) -> Option<ShareLimitError> {
        if let Some(rx) = &self.cancelled {
            if *rx.borrow() {
                return Some(ShareLimitError::Cancelled);
            }
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ShareLimitError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context fires. Arms at most one timer.
    pub async fn done(&self) -> ShareLimitError {
        let cancelled = async {
            match self.cancelled.clone() {
                Some(mut rx) => loop {
                    if *rx.borrow_and_update() {
                        return;
                    }
                    if rx.changed().await.is_err() {
                        // handle dropped without cancelling: can never fire
                        pending::<()>().await;
                    }
                },
                None => pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => ShareLimitError::Cancelled,
            _ = expired => ShareLimitError::DeadlineExceeded,
        }
    }
}
