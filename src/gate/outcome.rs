//! Work outcomes and the response envelope the gate emits

use hyper::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::types::TurnstileError;

/// What a unit of work reports back through its [`Responder`].
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub status: StatusCode,
    pub error: Option<TurnstileError>,
    pub message: String,
    pub data: Option<Value>,
}

impl ExecutionOutcome {
    pub fn success(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            error: None,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn failure(status: StatusCode, error: TurnstileError) -> Self {
        Self {
            status,
            message: error.to_string(),
            error: Some(error),
            data: None,
        }
    }

    /// Failure classified by the error's own status code.
    pub fn from_error(error: TurnstileError) -> Self {
        Self::failure(error.status_code(), error)
    }
}

/// Single-use write end of the result channel.
///
/// Sending never blocks. If the gate has already answered (deadline or
/// cancellation) the outcome is dropped and `send` returns `false`.
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<ExecutionOutcome>,
}

impl Responder {
    pub(crate) fn new(tx: oneshot::Sender<ExecutionOutcome>) -> Self {
        Self { tx }
    }

    pub fn send(self, outcome: ExecutionOutcome) -> bool {
        match self.tx.send(outcome) {
            Ok(()) => true,
            Err(late) => {
                debug!(status = %late.status, "gate already answered, outcome discarded");
                false
            }
        }
    }

    pub fn ok(self, status: StatusCode, message: impl Into<String>, data: Option<Value>) -> bool {
        let mut outcome = ExecutionOutcome::success(status, message);
        outcome.data = data;
        self.send(outcome)
    }

    pub fn fail(self, error: TurnstileError) -> bool {
        self.send(ExecutionOutcome::from_error(error))
    }

    /// True once nobody is waiting for the outcome any more.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

/// JSON body of every gated response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub status: EnvelopeStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// HTTP status plus envelope, ready to be written by a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct GateResponse {
    pub status: StatusCode,
    pub envelope: Envelope,
}

impl GateResponse {
    pub fn success(status: StatusCode, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            status,
            envelope: Envelope {
                status: EnvelopeStatus::Success,
                message: message.into(),
                data,
            },
        }
    }

    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            envelope: Envelope {
                status: EnvelopeStatus::Error,
                message: message.into(),
                data: None,
            },
        }
    }

    pub fn deadline_exceeded() -> Self {
        let err = TurnstileError::DeadlineExceeded;
        Self::failure(err.status_code(), err.to_string())
    }

    pub fn cancelled() -> Self {
        Self::failure(StatusCode::SERVICE_UNAVAILABLE, "Request was cancelled")
    }

    /// Translate a work outcome.
    ///
    /// An outcome whose error is itself `DeadlineExceeded` is rendered as a
    /// success, carrying the outcome's status and message.
    pub fn from_outcome(outcome: ExecutionOutcome) -> Self {
        match outcome.error {
            Some(err) if !matches!(err, TurnstileError::DeadlineExceeded) => {
                Self::failure(outcome.status, err.to_string())
            }
            _ => Self::success(outcome.status, outcome.message, outcome.data),
        }
    }

    pub fn is_success(&self) -> bool {
        self.envelope.status == EnvelopeStatus::Success
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.envelope).unwrap_or_else(|_| "{}".to_string())
    }
}
