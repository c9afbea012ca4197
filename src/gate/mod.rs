//! Deadline gate
//!
//! Runs one unit of request work concurrently and guarantees the caller
//! exactly one response: the work's outcome if it arrives first, otherwise a
//! timeout (or cancellation) envelope. Work that finishes after the gate has
//! answered can still report; its outcome is discarded without blocking.

pub mod context;
pub mod outcome;

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use hyper::StatusCode;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use context::{CancelHandle, DoneReason, RequestContext};
pub use outcome::{Envelope, EnvelopeStatus, ExecutionOutcome, GateResponse, Responder};

/// Default request deadline in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// What happens to work still running when the deadline fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeadlinePolicy {
    /// Leave it running; it observes cancellation through its context.
    #[default]
    Abandon,
    /// Abort the task at its next await point.
    Abort,
}

impl FromStr for DeadlinePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abandon" => Ok(Self::Abandon),
            "abort" => Ok(Self::Abort),
            other => Err(format!("unknown deadline policy: {other} (expected abandon or abort)")),
        }
    }
}

impl std::fmt::Display for DeadlinePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Abandon => f.write_str("abandon"),
            Self::Abort => f.write_str("abort"),
        }
    }
}

/// Bounds request work by a fixed timeout.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineGate {
    timeout: Duration,
    policy: DeadlinePolicy,
}

impl Default for DeadlineGate {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }
}

impl DeadlineGate {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            policy: DeadlinePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DeadlinePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn policy(&self) -> DeadlinePolicy {
        self.policy
    }

    /// Run `work` under a fresh root context.
    pub async fn handle<F, Fut>(&self, work: F) -> GateResponse
    where
        F: FnOnce(RequestContext, Responder) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.run(&RequestContext::background(), work).await
    }

    /// Run `work` under a child of `parent` bounded by the gate timeout.
    ///
    /// The work receives the child context and a [`Responder`]. When the
    /// gate returns, the child context is cancelled.
    pub async fn run<F, Fut>(&self, parent: &RequestContext, work: F) -> GateResponse
    where
        F: FnOnce(RequestContext, Responder) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (ctx, cancel) = parent.with_timeout(self.timeout);
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(work(ctx.clone(), Responder::new(tx)));

        let response = tokio::select! {
            biased;

            received = rx => match received {
                Ok(outcome) => GateResponse::from_outcome(outcome),
                // Sender dropped unused. Work that stopped because the context
                // ended is answered for that reason.
                Err(_) => match ctx.err() {
                    Some(reason) => self.context_done(reason, &task),
                    None => {
                        warn!("request work ended without reporting an outcome");
                        GateResponse::failure(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "Request handler produced no response",
                        )
                    }
                },
            },

            reason = ctx.done() => self.context_done(reason, &task),
        };

        cancel.cancel();
        response
    }

    fn context_done(&self, reason: DoneReason, task: &JoinHandle<()>) -> GateResponse {
        if self.policy == DeadlinePolicy::Abort {
            task.abort();
        }
        match reason {
            DoneReason::DeadlineExceeded => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    policy = %self.policy,
                    "request deadline exceeded"
                );
                GateResponse::deadline_exceeded()
            }
            DoneReason::Cancelled => {
                debug!("request cancelled by caller");
                GateResponse::cancelled()
            }
        }
    }
}
