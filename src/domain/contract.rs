//! Shapes exchanged with the remote backend.
//!
//! The engine only depends on these types and on the [`Backend`] trait; the
//! transport behind it lives in the infrastructure layer.

use super::errors::TransportError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub full_name: String,
    pub email: String,
    pub mobile: String,
    pub category: String,
    pub business_name: String,
    pub role: String,
    pub about: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub status: RegistrationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_id: Option<String>,
}

/// Where a one-time code is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpChannel {
    #[default]
    Email,
    Mobile,
}

impl std::fmt::Display for OtpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OtpChannel::Email => write!(f, "email"),
            OtpChannel::Mobile => write!(f, "mobile"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpIssueRequest {
    pub channel: OtpChannel,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpIssueResponse {
    pub challenge_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpVerifyRequest {
    pub challenge_id: String,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpVerifyResponse {
    pub verified: bool,
    pub attempts_remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessageRequest {
    pub role: String,
    pub reason: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    Queued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessageResponse {
    pub status: ContactStatus,
}

/// What a successful submission hands back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Receipt {
    pub reference: Option<String>,
}

/// Remote operations the form engine relies on.
///
/// Implementations block until the remote call resolves; callers that must stay
/// responsive run them off the event loop.
pub trait Backend: Send + Sync {
    fn submit_registration(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, TransportError>;

    fn issue_otp(&self, request: &OtpIssueRequest) -> Result<OtpIssueResponse, TransportError>;

    fn verify_otp(&self, request: &OtpVerifyRequest) -> Result<OtpVerifyResponse, TransportError>;

    fn send_contact_message(
        &self,
        request: &ContactMessageRequest,
    ) -> Result<ContactMessageResponse, TransportError>;
}
