//! Terminal submission phase of a form.
//!
//! The controller guarantees at most one attempt in flight. Each attempt gets
//! an [`AttemptId`]; completing with any other id (after a cancel or a reset)
//! is a no-op, so a late answer can never flip the controller to `Succeeded`.

use super::contract::Receipt;
use super::errors::{FlowError, FlowResult, TransportError};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubmissionStatus {
    Idle,
    Pending,
    Succeeded,
    Failed,
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionStatus::Idle => write!(f, "idle"),
            SubmissionStatus::Pending => write!(f, "sending"),
            SubmissionStatus::Succeeded => write!(f, "sent"),
            SubmissionStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptId(u64);

/// How [`SubmissionController::complete`] resolved an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Succeeded(Receipt),
    Failed(FlowError),
    /// The attempt was no longer in flight; nothing changed.
    Discarded,
}

/// Drives the single asynchronous submit of a form.
///
/// # Examples
///
/// ```
/// use formstage::domain::{Completion, Receipt, SubmissionController, SubmissionStatus};
///
/// let mut controller = SubmissionController::new();
/// let attempt = controller.begin("payload").unwrap();
/// assert_eq!(controller.status(), SubmissionStatus::Pending);
///
/// let done = controller.complete(attempt, Ok(Receipt::default()));
/// assert!(matches!(done, Completion::Succeeded(_)));
/// assert_eq!(controller.status(), SubmissionStatus::Succeeded);
/// ```
#[derive(Debug, Clone)]
pub struct SubmissionController<P> {
    status: SubmissionStatus,
    last_error: Option<FlowError>,
    receipt: Option<Receipt>,
    payload: Option<P>,
    sequence: u64,
    in_flight: Option<AttemptId>,
}

impl<P> Default for SubmissionController<P> {
    fn default() -> Self {
        Self {
            status: SubmissionStatus::Idle,
            last_error: None,
            receipt: None,
            payload: None,
            sequence: 0,
            in_flight: None,
        }
    }
}

impl<P> SubmissionController<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SubmissionStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == SubmissionStatus::Pending
    }

    pub fn last_error(&self) -> Option<&FlowError> {
        self.last_error.as_ref()
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        self.receipt.as_ref()
    }

    /// Payload of the latest attempt.
    pub fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }

    /// Enters `Pending` for `payload`.
    ///
    /// Only `Idle` and `Failed` may start an attempt; a second call while one
    /// is in flight is rejected rather than queued.
    pub fn begin(&mut self, payload: P) -> FlowResult<AttemptId> {
        match self.status {
            SubmissionStatus::Pending => {
                tracing::warn!("submit called while a submission is pending");
                return Err(FlowError::DuplicateSubmission);
            }
            SubmissionStatus::Succeeded => return Err(FlowError::AlreadyCompleted),
            SubmissionStatus::Idle | SubmissionStatus::Failed => {}
        }

        self.sequence += 1;
        let attempt = AttemptId(self.sequence);
        self.status = SubmissionStatus::Pending;
        self.in_flight = Some(attempt);
        self.last_error = None;
        self.payload = Some(payload);
        tracing::info!(?attempt, "submission started");
        Ok(attempt)
    }

    /// Records the outcome of `attempt`.
    pub fn complete(
        &mut self,
        attempt: AttemptId,
        outcome: Result<Receipt, TransportError>,
    ) -> Completion {
        if self.in_flight != Some(attempt) {
            tracing::debug!(?attempt, "discarding result of superseded submission");
            return Completion::Discarded;
        }
        self.in_flight = None;

        match outcome {
            Ok(receipt) => {
                self.status = SubmissionStatus::Succeeded;
                self.receipt = Some(receipt.clone());
                tracing::info!(?attempt, reference = ?receipt.reference, "submission accepted");
                Completion::Succeeded(receipt)
            }
            Err(err) => {
                let error = FlowError::SubmissionFailed(err.to_string());
                self.status = SubmissionStatus::Failed;
                self.last_error = Some(error.clone());
                tracing::warn!(?attempt, error = %err, "submission failed");
                Completion::Failed(error)
            }
        }
    }

    /// Drops the in-flight attempt and returns to `Idle`.
    pub fn cancel(&mut self) -> bool {
        if self.in_flight.take().is_some() {
            self.status = SubmissionStatus::Idle;
            tracing::info!("pending submission cancelled");
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.in_flight = None;
        self.status = SubmissionStatus::Idle;
        self.last_error = None;
        self.receipt = None;
        self.payload = None;
    }
}

impl<P: Clone> SubmissionController<P> {
    /// Starts a new attempt with the payload of the failed one.
    pub fn retry(&mut self) -> FlowResult<(AttemptId, P)> {
        if self.status != SubmissionStatus::Failed {
            return Err(match self.status {
                SubmissionStatus::Pending => FlowError::DuplicateSubmission,
                SubmissionStatus::Succeeded => FlowError::AlreadyCompleted,
                _ => FlowError::SubmissionFailed("nothing to retry".to_string()),
            });
        }
        let payload = match self.payload.clone() {
            Some(payload) => payload,
            None => return Err(FlowError::SubmissionFailed("nothing to retry".to_string())),
        };
        let attempt = self.begin(payload.clone())?;
        Ok((attempt, payload))
    }

    /// Runs one attempt to completion with a blocking `deliver`.
    pub fn submit<F>(&mut self, payload: P, deliver: F) -> FlowResult<Receipt>
    where
        F: FnOnce(&P) -> Result<Receipt, TransportError>,
    {
        let attempt = self.begin(payload.clone())?;
        match self.complete(attempt, deliver(&payload)) {
            Completion::Succeeded(receipt) => Ok(receipt),
            Completion::Failed(err) => Err(err),
            Completion::Discarded => Err(FlowError::SubmissionFailed("attempt was cancelled".to_string())),
        }
    }
}
