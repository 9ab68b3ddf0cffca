//! Runs remote calls off the event loop.
//!
//! Each job runs on its own thread against the shared backend and reports back
//! through a channel. The event loop drains finished jobs and applies them to
//! the owning form, so state transitions stay serialized.

use super::flow::{FormPayload, PendingSubmission};
use crate::domain::{
    AttemptId, Backend, ContactMessageRequest, OtpIssueRequest, OtpIssueResponse,
    OtpVerifyResponse, PendingVerification, Receipt, RegistrationRequest, TransportError,
    VerifyTicket,
};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

#[derive(Debug, Clone)]
pub enum Job {
    IssueOtp {
        request_id: u64,
        request: OtpIssueRequest,
    },
    VerifyOtp(PendingVerification),
    SubmitRegistration(PendingSubmission<RegistrationRequest>),
    SendContact(PendingSubmission<ContactMessageRequest>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    OtpIssued {
        request_id: u64,
        result: Result<OtpIssueResponse, TransportError>,
    },
    OtpChecked {
        ticket: VerifyTicket,
        result: Result<OtpVerifyResponse, TransportError>,
    },
    Registration {
        attempt: AttemptId,
        result: Result<Receipt, TransportError>,
    },
    Contact {
        attempt: AttemptId,
        result: Result<Receipt, TransportError>,
    },
}

impl Job {
    fn name(&self) -> &'static str {
        match self {
            Job::IssueOtp { .. } => "issue_otp",
            Job::VerifyOtp(_) => "verify_otp",
            Job::SubmitRegistration(_) => "submit_registration",
            Job::SendContact(_) => "send_contact",
        }
    }

    pub fn run(self, backend: &dyn Backend) -> JobOutcome {
        match self {
            Job::IssueOtp { request_id, request } => JobOutcome::OtpIssued {
                request_id,
                result: backend.issue_otp(&request),
            },
            Job::VerifyOtp(pending) => JobOutcome::OtpChecked {
                ticket: pending.ticket,
                result: backend.verify_otp(&pending.request),
            },
            Job::SubmitRegistration(pending) => JobOutcome::Registration {
                attempt: pending.attempt,
                result: pending.payload.deliver(backend),
            },
            Job::SendContact(pending) => JobOutcome::Contact {
                attempt: pending.attempt,
                result: pending.payload.deliver(backend),
            },
        }
    }
}

pub struct JobRunner {
    backend: Arc<dyn Backend>,
    sender: Sender<JobOutcome>,
    receiver: Receiver<JobOutcome>,
    in_flight: usize,
}

impl JobRunner {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            backend,
            sender,
            receiver,
            in_flight: 0,
        }
    }

    pub fn spawn(&mut self, job: Job) {
        let backend = Arc::clone(&self.backend);
        let sender = self.sender.clone();
        let name = job.name();
        tracing::debug!(job = name, "spawning job");
        self.in_flight += 1;
        thread::spawn(move || {
            let outcome = job.run(backend.as_ref());
            if sender.send(outcome).is_err() {
                tracing::debug!(job = name, "job finished after the app shut down");
            }
        });
    }

    /// Finished jobs, without blocking.
    pub fn drain(&mut self) -> Vec<JobOutcome> {
        let done: Vec<_> = self.receiver.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(done.len());
        done
    }

    /// Blocks until the next job finishes.
    pub fn wait(&mut self) -> Option<JobOutcome> {
        let outcome = self.receiver.recv().ok()?;
        self.in_flight = self.in_flight.saturating_sub(1);
        Some(outcome)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}
