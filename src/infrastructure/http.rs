use crate::domain::{
    Backend, ContactMessageRequest, ContactMessageResponse, OtpIssueRequest, OtpIssueResponse,
    OtpVerifyRequest, OtpVerifyResponse, RegistrationRequest, RegistrationResponse, TransportError,
};
use reqwest::blocking::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// JSON-over-HTTP backend.
///
/// Every operation is a `POST` of the request body to a fixed path under
/// `base_url`; any non-2xx status becomes [`TransportError::Status`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn post<B, R>(&self, path: &str, body: &B) -> Result<R, TransportError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path);
        tracing::debug!(%url, "POST");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%url, status = status.as_u16(), "request failed");
            return Err(TransportError::Status(status.as_u16()));
        }

        response
            .json::<R>()
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

impl Backend for HttpBackend {
    fn submit_registration(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, TransportError> {
        self.post("registrations", request)
    }

    fn issue_otp(&self, request: &OtpIssueRequest) -> Result<OtpIssueResponse, TransportError> {
        self.post("otp/issue", request)
    }

    fn verify_otp(&self, request: &OtpVerifyRequest) -> Result<OtpVerifyResponse, TransportError> {
        self.post("otp/verify", request)
    }

    fn send_contact_message(
        &self,
        request: &ContactMessageRequest,
    ) -> Result<ContactMessageResponse, TransportError> {
        self.post("contact-messages", request)
    }
}
