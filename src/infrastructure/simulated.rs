//! Offline stand-in for the remote backend.
//!
//! Calls sleep for a fixed delay to mimic network latency. Issued codes are
//! kept in memory and the most recent one is exposed so the terminal UI can
//! show it, since nothing is actually sent. Issuing a code retires expired
//! challenges and any earlier one for the same target.

use crate::domain::{
    Backend, Clock, ContactMessageRequest, ContactMessageResponse, ContactStatus, OtpIssueRequest,
    OtpIssueResponse, OtpPolicy, OtpVerifyRequest, OtpVerifyResponse, RegistrationRequest,
    RegistrationResponse, RegistrationStatus, SystemClock, TransportError,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct IssuedCode {
    target: String,
    code: String,
    expires_at: DateTime<Utc>,
    attempts_remaining: u32,
}

pub struct SimulatedBackend {
    delay: Duration,
    policy: OtpPolicy,
    reject_registrations: bool,
    clock: Arc<dyn Clock>,
    codes: Mutex<HashMap<String, IssuedCode>>,
    last_code: Mutex<Option<String>>,
}

impl SimulatedBackend {
    pub fn new(delay: Duration, policy: OtpPolicy) -> Self {
        Self {
            delay,
            policy,
            reject_registrations: false,
            clock: Arc::new(SystemClock),
            codes: Mutex::new(HashMap::new()),
            last_code: Mutex::new(None),
        }
    }

    pub fn rejecting_registrations(mut self, reject: bool) -> Self {
        self.reject_registrations = reject;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The code handed out by the most recent `issue_otp`.
    pub fn last_code(&self) -> Option<String> {
        self.last_code.lock().ok().and_then(|code| code.clone())
    }

    fn pause(&self) {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }

    fn generate_code(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.policy.code_length)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }

    fn codes(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, IssuedCode>>, TransportError> {
        self.codes
            .lock()
            .map_err(|_| TransportError::Request("simulated backend state is poisoned".to_string()))
    }
}

impl Backend for SimulatedBackend {
    fn submit_registration(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, TransportError> {
        self.pause();
        if self.reject_registrations {
            tracing::info!(email = %request.email, "simulated registration rejected");
            return Ok(RegistrationResponse {
                status: RegistrationStatus::Rejected,
                registration_id: None,
            });
        }
        let id = format!("REG-{}", &Uuid::new_v4().simple().to_string()[..8]).to_uppercase();
        tracing::info!(email = %request.email, %id, "simulated registration accepted");
        Ok(RegistrationResponse {
            status: RegistrationStatus::Accepted,
            registration_id: Some(id),
        })
    }

    fn issue_otp(&self, request: &OtpIssueRequest) -> Result<OtpIssueResponse, TransportError> {
        self.pause();
        let challenge_id = Uuid::new_v4().to_string();
        let code = self.generate_code();
        let now = self.clock.now();
        let expires_at = now + self.policy.ttl;

        let mut codes = self.codes()?;
        codes.retain(|_, issued| issued.expires_at > now && issued.target != request.target);
        codes.insert(
            challenge_id.clone(),
            IssuedCode {
                target: request.target.clone(),
                code: code.clone(),
                expires_at,
                attempts_remaining: self.policy.max_attempts,
            },
        );
        drop(codes);
        if let Ok(mut last) = self.last_code.lock() {
            *last = Some(code);
        }
        tracing::info!(channel = %request.channel, %challenge_id, "simulated code issued");

        Ok(OtpIssueResponse {
            challenge_id,
            expires_at,
        })
    }

    fn verify_otp(&self, request: &OtpVerifyRequest) -> Result<OtpVerifyResponse, TransportError> {
        self.pause();
        let now = self.clock.now();
        let mut codes = self.codes()?;
        let Some(issued) = codes.get_mut(&request.challenge_id) else {
            return Err(TransportError::Status(404));
        };

        if now >= issued.expires_at || issued.attempts_remaining == 0 {
            return Ok(OtpVerifyResponse {
                verified: false,
                attempts_remaining: 0,
            });
        }

        if issued.code == request.code {
            codes.remove(&request.challenge_id);
            return Ok(OtpVerifyResponse {
                verified: true,
                attempts_remaining: self.policy.max_attempts,
            });
        }

        issued.attempts_remaining -= 1;
        Ok(OtpVerifyResponse {
            verified: false,
            attempts_remaining: issued.attempts_remaining,
        })
    }

    fn send_contact_message(
        &self,
        request: &ContactMessageRequest,
    ) -> Result<ContactMessageResponse, TransportError> {
        self.pause();
        tracing::info!(role = %request.role, reason = %request.reason, "simulated message queued");
        Ok(ContactMessageResponse {
            status: ContactStatus::Queued,
        })
    }
}
