//! One-time-code verification as a bounded state machine.
//!
//! ```text
//! NotRequested --issue--> Issued --begin_verify--> Verifying --match--> Verified
//!                           |  ^                       |
//!                      expiry  |                       +--mismatch--> Failed --begin_verify--> ...
//!                           v  +------issue (resend)----------------------+
//!                        Expired
//! ```
//!
//! Verification is split into [`OtpChallenge::begin_verify`] and
//! [`OtpChallenge::finish_verify`] so the remote check can run off the event
//! loop; [`OtpChallenge::verify`] does both in one blocking call.

use super::contract::{Backend, OtpIssueResponse, OtpVerifyRequest, OtpVerifyResponse};
use super::errors::{FieldIssue, FlowError, FlowResult, TransportError};
use super::fields::normalize_code;
use super::models::FieldId;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Field that holds the code the user typed.
pub const CODE_FIELD: FieldId = FieldId::new("otp");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OtpStatus {
    NotRequested,
    Issued,
    Verifying,
    Verified,
    Failed,
    Expired,
}

impl std::fmt::Display for OtpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OtpStatus::NotRequested => "not requested",
            OtpStatus::Issued => "issued",
            OtpStatus::Verifying => "verifying",
            OtpStatus::Verified => "verified",
            OtpStatus::Failed => "failed",
            OtpStatus::Expired => "expired",
        };
        f.write_str(label)
    }
}

/// Bounds applied to every challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpPolicy {
    pub max_attempts: u32,
    pub ttl: TimeDelta,
    pub code_length: usize,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            ttl: TimeDelta::minutes(5),
            code_length: 6,
        }
    }
}

/// Handle for one verification attempt; results for any other ticket are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VerifyTicket(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingVerification {
    pub ticket: VerifyTicket,
    pub request: OtpVerifyRequest,
}

#[derive(Debug, Clone)]
pub struct OtpChallenge {
    policy: OtpPolicy,
    status: OtpStatus,
    code_entered: String,
    attempts_remaining: u32,
    challenge_id: Option<String>,
    issued_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    sequence: u64,
    in_flight: Option<VerifyTicket>,
    resume_status: OtpStatus,
}

impl OtpChallenge {
    pub fn new(policy: OtpPolicy) -> Self {
        Self {
            policy,
            status: OtpStatus::NotRequested,
            code_entered: String::new(),
            attempts_remaining: policy.max_attempts,
            challenge_id: None,
            issued_at: None,
            expires_at: None,
            sequence: 0,
            in_flight: None,
            resume_status: OtpStatus::NotRequested,
        }
    }

    pub fn policy(&self) -> OtpPolicy {
        self.policy
    }

    pub fn status(&self) -> OtpStatus {
        self.status
    }

    pub fn is_verified(&self) -> bool {
        self.status == OtpStatus::Verified
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.attempts_remaining
    }

    pub fn code_entered(&self) -> &str {
        &self.code_entered
    }

    pub fn challenge_id(&self) -> Option<&str> {
        self.challenge_id.as_deref()
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Time left before the current challenge expires.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        match self.status {
            OtpStatus::Issued | OtpStatus::Failed | OtpStatus::Verifying => {
                self.expires_at.map(|at| (at - now).max(TimeDelta::zero()))
            }
            _ => None,
        }
    }

    /// Starts a fresh challenge from the backend's grant.
    ///
    /// Resets the attempt budget and discards any verification still in flight.
    /// The expiry is the earlier of the backend's and the local policy's.
    pub fn issue(&mut self, grant: OtpIssueResponse, now: DateTime<Utc>) {
        let local_expiry = now + self.policy.ttl;
        self.status = OtpStatus::Issued;
        self.code_entered.clear();
        self.attempts_remaining = self.policy.max_attempts;
        self.challenge_id = Some(grant.challenge_id);
        self.issued_at = Some(now);
        self.expires_at = Some(grant.expires_at.min(local_expiry));
        self.sequence += 1;
        self.in_flight = None;
        tracing::info!(expires_at = ?self.expires_at, "otp challenge issued");
    }

    /// Moves an outstanding challenge to `Expired` once its deadline passes.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        let live = matches!(self.status, OtpStatus::Issued | OtpStatus::Failed);
        if live && self.is_past_deadline(now) {
            tracing::debug!("otp challenge expired");
            self.status = OtpStatus::Expired;
            return true;
        }
        false
    }

    fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Checks every local precondition and, if they hold, enters `Verifying`.
    pub fn begin_verify(&mut self, code: &str, now: DateTime<Utc>) -> FlowResult<PendingVerification> {
        match self.status {
            OtpStatus::Issued => {}
            OtpStatus::Failed if self.attempts_remaining > 0 => {}
            OtpStatus::Failed => return Err(FlowError::OtpAttemptsExceeded),
            OtpStatus::Expired => return Err(FlowError::OtpExpired),
            other => return Err(FlowError::OtpUnavailable(other)),
        }

        if self.is_past_deadline(now) {
            self.status = OtpStatus::Expired;
            tracing::warn!("verification attempted after expiry");
            return Err(FlowError::OtpExpired);
        }

        let normalized = normalize_code(code);
        let well_formed = normalized.len() == self.policy.code_length
            && normalized.chars().all(|c| c.is_ascii_digit());
        if !well_formed {
            return Err(FlowError::Validation {
                field: CODE_FIELD,
                issue: FieldIssue::Malformed("enter the full numeric code"),
            });
        }

        let challenge_id = match &self.challenge_id {
            Some(id) => id.clone(),
            None => return Err(FlowError::OtpUnavailable(self.status)),
        };

        self.sequence += 1;
        let ticket = VerifyTicket(self.sequence);
        self.resume_status = self.status;
        self.status = OtpStatus::Verifying;
        self.code_entered = normalized.clone();
        self.in_flight = Some(ticket);

        Ok(PendingVerification {
            ticket,
            request: OtpVerifyRequest {
                challenge_id,
                code: normalized,
            },
        })
    }

    /// Applies the backend's answer for `ticket`.
    ///
    /// Answers for a ticket that is no longer in flight (cancelled, or
    /// superseded by a resend) are discarded and leave the state untouched.
    pub fn finish_verify(
        &mut self,
        ticket: VerifyTicket,
        outcome: Result<OtpVerifyResponse, TransportError>,
    ) -> FlowResult<()> {
        if self.in_flight != Some(ticket) {
            tracing::debug!(?ticket, "discarding stale verification result");
            return Ok(());
        }
        self.in_flight = None;

        match outcome {
            Ok(response) if response.verified => {
                self.status = OtpStatus::Verified;
                tracing::info!("otp verified");
                Ok(())
            }
            Ok(response) => {
                self.attempts_remaining = self
                    .attempts_remaining
                    .saturating_sub(1)
                    .min(response.attempts_remaining);
                self.status = OtpStatus::Failed;
                tracing::warn!(attempts_remaining = self.attempts_remaining, "otp mismatch");
                Err(FlowError::OtpMismatch {
                    attempts_remaining: self.attempts_remaining,
                })
            }
            Err(err) => {
                self.status = self.resume_status;
                tracing::warn!(error = %err, "otp verification call failed");
                Err(FlowError::Transport(err))
            }
        }
    }

    /// Runs a whole verification against `backend` in one blocking call.
    pub fn verify(&mut self, code: &str, backend: &dyn Backend, now: DateTime<Utc>) -> FlowResult<()> {
        let pending = self.begin_verify(code, now)?;
        let outcome = backend.verify_otp(&pending.request);
        self.finish_verify(pending.ticket, outcome)
    }

    /// Abandons an in-flight verification, restoring the state it started from.
    pub fn cancel(&mut self) -> bool {
        if self.in_flight.take().is_some() {
            self.status = self.resume_status;
            tracing::debug!("otp verification cancelled");
            return true;
        }
        false
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.policy);
    }
}
