use super::models::FieldId;
use super::otp::OtpStatus;
use thiserror::Error;

/// Why a single field failed its validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldIssue {
    /// Nothing has been entered.
    Missing,
    /// Something was entered but it does not have the expected shape.
    Malformed(&'static str),
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldIssue::Missing => write!(f, "required"),
            FieldIssue::Malformed(hint) => write!(f, "{}", hint),
        }
    }
}

/// Every recoverable failure a form instance can report.
///
/// None of these are fatal: validation and OTP failures are rendered as state,
/// submission failures leave the controller ready for another attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("{field}: {issue}")]
    Validation { field: FieldId, issue: FieldIssue },

    #[error("code does not match ({attempts_remaining} attempts left)")]
    OtpMismatch { attempts_remaining: u32 },

    #[error("code has expired, request a new one")]
    OtpExpired,

    #[error("too many incorrect codes, request a new one")]
    OtpAttemptsExceeded,

    #[error("verification is not possible while the challenge is {0}")]
    OtpUnavailable(OtpStatus),

    #[error("verify your code before continuing")]
    OtpRequired,

    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    #[error("a submission is already in flight")]
    DuplicateSubmission,

    #[error("navigation is locked until the pending request resolves")]
    NavigationLocked,

    #[error("form has already been completed")]
    AlreadyCompleted,

    #[error("invalid flow definition: {0}")]
    InvalidDefinition(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures below the protocol level, reported by a [`Backend`](super::contract::Backend).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("request was rejected")]
    Rejected,

    #[error("malformed response: {0}")]
    Decode(String),
}

pub type FlowResult<T> = Result<T, FlowError>;
