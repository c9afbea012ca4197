//! Cancellable request context
//!
//! A context carries an optional deadline and any number of cancellation
//! signals inherited from its ancestors. Deriving a child never loosens the
//! parent: the child deadline is the earlier of the two and the child is
//! cancelled whenever the parent is.
//!
//! Cancellation is cooperative. Work observes it through `err()` or `done()`;
//! nothing is interrupted.

use std::time::Duration;

use futures::future::select_all;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

/// Why a context finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    DeadlineExceeded,
    Cancelled,
}

/// Deadline and cancellation scope for one unit of request work.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancellations: Vec<watch::Receiver<bool>>,
}

/// Cancels the context it was created with. Dropping it cancels too.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.tx.send_replace(true);
    }
}

impl RequestContext {
    /// A root context: no deadline, never cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a child that can be cancelled independently of the parent.
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let mut cancellations = self.cancellations.clone();
        cancellations.push(rx);

        let child = Self {
            deadline: self.deadline,
            cancellations,
        };
        (child, CancelHandle { tx })
    }

    /// Derive a child that is done after `timeout` at the latest.
    pub fn with_timeout(&self, timeout: Duration) -> (Self, CancelHandle) {
        let (mut child, handle) = self.with_cancel();
        let deadline = Instant::now() + timeout;
        child.deadline = Some(match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        });
        (child, handle)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `None` while the context is live.
    pub fn err(&self) -> Option<DoneReason> {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(DoneReason::DeadlineExceeded);
        }
        if self.cancellations.iter().any(|rx| *rx.borrow()) {
            return Some(DoneReason::Cancelled);
        }
        None
    }

    /// Resolves once the deadline passes or any cancellation fires.
    pub async fn done(&self) -> DoneReason {
        if let Some(reason) = self.err() {
            return reason;
        }

        let deadline = async {
            match self.deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        let cancelled = async {
            if self.cancellations.is_empty() {
                return std::future::pending::<()>().await;
            }
            let waits = self.cancellations.iter().cloned().map(|mut rx| {
                Box::pin(async move {
                    let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
                    if closed {
                        // Sender gone without cancelling; this signal can never fire.
                        std::future::pending::<()>().await;
                    }
                })
            });
            select_all(waits).await;
        };

        tokio::select! {
            _ = deadline => DoneReason::DeadlineExceeded,
            _ = cancelled => DoneReason::Cancelled,
        }
    }
}
