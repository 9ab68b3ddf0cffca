//! The two concrete forms: professional registration and the contact form.

use super::flow::{FormFlow, FormPayload, OtpTargets};
use crate::domain::{
    Backend, BranchBinding, BranchResolver, Clock, ContactMessageRequest, FieldStore, FlowResult,
    OtpPolicy, Receipt, RegistrationRequest, RegistrationStatus, Step, TransportError, Validator,
    CODE_FIELD,
};
use std::sync::Arc;

/// Four-step expert registration: account, verification, category, profile.
pub mod registration {
    use crate::domain::FieldId;

    pub const FULL_NAME: FieldId = FieldId::new("fullName");
    pub const EMAIL: FieldId = FieldId::new("email");
    pub const MOBILE: FieldId = FieldId::new("mobile");
    pub const CATEGORY: FieldId = FieldId::new("category");
    pub const BUSINESS_NAME: FieldId = FieldId::new("businessName");
    pub const ROLE: FieldId = FieldId::new("role");
    pub const ABOUT: FieldId = FieldId::new("about");

    pub const CATEGORIES: [&str; 4] = [
        "Branding",
        "Strategic Marketing",
        "Advertising",
        "Marketing Collateral",
    ];

    pub fn label(id: FieldId) -> &'static str {
        match id.as_str() {
            "fullName" => "Full Name",
            "email" => "Email",
            "mobile" => "Mobile",
            "otp" => "Verification Code",
            "category" => "Category",
            "businessName" => "Business Name",
            "role" => "Role / Specialty",
            "about" => "About (optional)",
            _ => "Field",
        }
    }
}

/// Two-step contact form whose reasons depend on the chosen role.
pub mod contact {
    use crate::domain::FieldId;

    pub const ROLE: FieldId = FieldId::new("role");
    pub const REASON: FieldId = FieldId::new("reason");
    pub const NAME: FieldId = FieldId::new("name");
    pub const EMAIL: FieldId = FieldId::new("email");
    pub const COMPANY: FieldId = FieldId::new("company");
    pub const MESSAGE: FieldId = FieldId::new("message");

    /// Role keys and the labels shown for them.
    pub const ROLES: [(&str, &str); 3] = [
        ("seeker", "Service Seeker (Business)"),
        ("provider", "Service Provider (Marketing Expert)"),
        ("other", "Other / General Inquiry"),
    ];

    pub const SEEKER_REASONS: [&str; 5] = [
        "Hiring guidance",
        "Using search & filters",
        "Account or access issue",
        "Payments / invoicing",
        "Other",
    ];

    pub const PROVIDER_REASONS: [&str; 5] = [
        "Profile onboarding",
        "Verification & compliance",
        "Discovery & visibility",
        "Payments / payouts",
        "Other",
    ];

    pub const OTHER_REASONS: [&str; 5] = [
        "Partnerships",
        "Media / press",
        "Feedback / suggestions",
        "Careers",
        "Other",
    ];

    pub const RESPONSE_NOTE: &str = "We usually respond within 24–48 hours.";

    pub fn label(id: FieldId) -> &'static str {
        match id.as_str() {
            "role" => "I am a",
            "reason" => "Reason",
            "name" => "Name",
            "email" => "Email",
            "company" => "Company (optional)",
            "message" => "Message",
            _ => "Field",
        }
    }

    pub fn role_label(key: &str) -> &str {
        ROLES
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, label)| *label)
            .unwrap_or(key)
    }
}

pub type RegistrationFlow = FormFlow<RegistrationRequest>;
pub type ContactFlow = FormFlow<ContactMessageRequest>;

fn strings(options: &[&str]) -> Vec<String> {
    options.iter().map(|s| s.to_string()).collect()
}

pub fn registration_steps() -> Vec<Step> {
    use registration::*;
    vec![
        Step::new(0, "Account Setup")
            .required(FULL_NAME)
            .required(EMAIL)
            .required(MOBILE),
        Step::new(1, "Verify").required(CODE_FIELD).otp_gated(),
        Step::new(2, "Confirm Role").required(CATEGORY),
        Step::new(3, "Profile")
            .required(BUSINESS_NAME)
            .required(ROLE)
            .optional(ABOUT),
    ]
}

pub fn registration_flow(policy: OtpPolicy, clock: Arc<dyn Clock>) -> FlowResult<RegistrationFlow> {
    use registration::*;
    let fields = FieldStore::new()
        .with(FULL_NAME, Validator::NonEmpty)
        .with(EMAIL, Validator::Email)
        .with(MOBILE, Validator::Phone)
        .with(CATEGORY, Validator::OneOf(strings(&CATEGORIES)))
        .with(BUSINESS_NAME, Validator::NonEmpty)
        .with(ROLE, Validator::NonEmpty)
        .with(ABOUT, Validator::Any);

    Ok(FormFlow::new(registration_steps(), fields, clock)?
        .with_otp(policy, OtpTargets { email: EMAIL, mobile: MOBILE }))
}

impl FormPayload for RegistrationRequest {
    fn collect(fields: &FieldStore) -> Self {
        use registration::*;
        Self {
            full_name: fields.text(FULL_NAME).to_string(),
            email: fields.text(EMAIL).to_string(),
            mobile: fields.text(MOBILE).to_string(),
            category: fields.text(CATEGORY).to_string(),
            business_name: fields.text(BUSINESS_NAME).to_string(),
            role: fields.text(ROLE).to_string(),
            about: fields.text(ABOUT).to_string(),
        }
    }

    fn deliver(&self, backend: &dyn Backend) -> Result<Receipt, TransportError> {
        let response = backend.submit_registration(self)?;
        match response.status {
            RegistrationStatus::Accepted => Ok(Receipt {
                reference: response.registration_id,
            }),
            RegistrationStatus::Rejected => Err(TransportError::Rejected),
        }
    }
}

/// Role → reason table of the contact form.
pub fn contact_reasons() -> BranchResolver {
    use contact::*;
    BranchResolver::new([
        ("seeker", SEEKER_REASONS),
        ("provider", PROVIDER_REASONS),
        ("other", OTHER_REASONS),
    ])
}

pub fn contact_steps() -> Vec<Step> {
    use contact::*;
    vec![
        Step::new(0, "How can we help").required(ROLE).required(REASON),
        Step::new(1, "Your details")
            .required(NAME)
            .required(EMAIL)
            .optional(COMPANY)
            .required(MESSAGE),
    ]
}

pub fn contact_flow(clock: Arc<dyn Clock>) -> FlowResult<ContactFlow> {
    use contact::*;
    let roles = ROLES.iter().map(|(key, _)| key.to_string()).collect();
    let fields = FieldStore::new()
        .with(ROLE, Validator::OneOf(roles))
        .with(NAME, Validator::NonEmpty)
        .with(EMAIL, Validator::Email)
        .with(COMPANY, Validator::Any)
        .with(MESSAGE, Validator::NonEmpty);

    Ok(FormFlow::new(contact_steps(), fields, clock)?
        .with_branch(BranchBinding::new(ROLE, REASON, contact_reasons())))
}

impl FormPayload for ContactMessageRequest {
    fn collect(fields: &FieldStore) -> Self {
        use contact::*;
        let company = fields.text(COMPANY);
        Self {
            role: fields.text(ROLE).to_string(),
            reason: fields.text(REASON).to_string(),
            name: fields.text(NAME).to_string(),
            email: fields.text(EMAIL).to_string(),
            company: (!company.is_empty()).then(|| company.to_string()),
            message: fields.text(MESSAGE).to_string(),
        }
    }

    fn deliver(&self, backend: &dyn Backend) -> Result<Receipt, TransportError> {
        backend.send_contact_message(self)?;
        Ok(Receipt::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::flow::AdvanceOutcome;
    use crate::domain::{
        Completion, ContactMessageResponse, ContactStatus, FieldValue, FlowError, ManualClock,
        OtpChannel, OtpIssueRequest, OtpIssueResponse, OtpVerifyRequest, OtpVerifyResponse,
        RegistrationResponse, SubmissionStatus,
    };
    use chrono::{DateTime, TimeDelta};
    use std::sync::Mutex;

    /// Backend that records calls and accepts the code "246810".
    #[derive(Default)]
    struct RecordingBackend {
        registrations: Mutex<Vec<RegistrationRequest>>,
        messages: Mutex<Vec<ContactMessageRequest>>,
        reject: bool,
    }

    impl Backend for RecordingBackend {
        fn submit_registration(&self, request: &RegistrationRequest) -> Result<RegistrationResponse, TransportError> {
            self.registrations.lock().unwrap().push(request.clone());
            if self.reject {
                return Ok(RegistrationResponse { status: RegistrationStatus::Rejected, registration_id: None });
            }
            Ok(RegistrationResponse {
                status: RegistrationStatus::Accepted,
                registration_id: Some("reg-42".to_string()),
            })
        }

        fn issue_otp(&self, _: &OtpIssueRequest) -> Result<OtpIssueResponse, TransportError> {
            Ok(OtpIssueResponse {
                challenge_id: "c-1".to_string(),
                expires_at: DateTime::UNIX_EPOCH + TimeDelta::minutes(5),
            })
        }

        fn verify_otp(&self, request: &OtpVerifyRequest) -> Result<OtpVerifyResponse, TransportError> {
            Ok(OtpVerifyResponse { verified: request.code == "246810", attempts_remaining: 2 })
        }

        fn send_contact_message(&self, request: &ContactMessageRequest) -> Result<ContactMessageResponse, TransportError> {
            self.messages.lock().unwrap().push(request.clone());
            Ok(ContactMessageResponse { status: ContactStatus::Queued })
        }
    }

    fn fill_registration(flow: &mut RegistrationFlow, backend: &RecordingBackend) {
        use registration::*;
        flow.set_field(FULL_NAME, FieldValue::text("Asha Rao"));
        flow.set_field(EMAIL, FieldValue::text("asha@studio.in"));
        flow.set_field(MOBILE, FieldValue::text("+91 98765 43210"));
        assert_eq!(flow.advance(), Ok(AdvanceOutcome::Moved(1)));

        flow.issue_otp(OtpChannel::Email, backend).unwrap();
        flow.set_field(CODE_FIELD, FieldValue::text("246 810"));
        flow.verify_otp(backend).unwrap();
        assert_eq!(flow.advance(), Ok(AdvanceOutcome::Moved(2)));

        assert!(flow.cycle_choice(CATEGORY, true));
        assert_eq!(flow.fields().text(CATEGORY), "Branding");
        assert_eq!(flow.advance(), Ok(AdvanceOutcome::Moved(3)));

        flow.set_field(BUSINESS_NAME, FieldValue::text("Studio Rao"));
        flow.set_field(ROLE, FieldValue::text("Creative Director"));
    }

    #[test]
    fn test_provider_reasons_in_order() {
        let resolver = contact_reasons();
        assert_eq!(
            resolver.resolve("provider"),
            [
                "Profile onboarding",
                "Verification & compliance",
                "Discovery & visibility",
                "Payments / payouts",
                "Other"
            ]
        );
        assert_eq!(resolver.resolve("seeker")[0], "Hiring guidance");
        assert_eq!(resolver.resolve("other")[3], "Careers");
        assert!(resolver.resolve("").is_empty());
    }

    #[test]
    fn test_role_labels() {
        assert_eq!(contact::role_label("provider"), "Service Provider (Marketing Expert)");
        assert_eq!(contact::role_label("unknown"), "unknown");
    }

    #[test]
    fn test_registration_submits_and_completes() {
        let backend = RecordingBackend::default();
        let mut flow = registration_flow(OtpPolicy::default(), Arc::new(ManualClock::default())).unwrap();
        fill_registration(&mut flow, &backend);

        assert_eq!(flow.submission().status(), SubmissionStatus::Idle);
        let pending = match flow.advance().unwrap() {
            AdvanceOutcome::Submitting(pending) => pending,
            other => panic!("expected submission, got {other:?}"),
        };
        assert_eq!(flow.submission().status(), SubmissionStatus::Pending);
        assert_eq!(pending.payload.full_name, "Asha Rao");
        assert_eq!(pending.payload.category, "Branding");
        assert_eq!(pending.payload.about, "");

        let completion = flow.deliver(pending, &backend);
        assert_eq!(
            completion,
            Completion::Succeeded(Receipt { reference: Some("reg-42".to_string()) })
        );
        assert_eq!(flow.submission().status(), SubmissionStatus::Succeeded);
        assert!(flow.is_completed());
        assert_eq!(flow.progress().fraction(), 1.0);
        assert_eq!(backend.registrations.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_rejected_registration_fails_and_stays_on_profile() {
        let backend = RecordingBackend { reject: true, ..Default::default() };
        let mut flow = registration_flow(OtpPolicy::default(), Arc::new(ManualClock::default())).unwrap();
        fill_registration(&mut flow, &backend);

        let pending = match flow.advance().unwrap() {
            AdvanceOutcome::Submitting(pending) => pending,
            other => panic!("expected submission, got {other:?}"),
        };
        let completion = flow.deliver(pending, &backend);
        assert_eq!(
            completion,
            Completion::Failed(FlowError::SubmissionFailed("request was rejected".to_string()))
        );
        assert!(!flow.is_completed());
        assert_eq!(flow.sequencer().current_index(), 3);
        assert_eq!(flow.fields().text(registration::BUSINESS_NAME), "Studio Rao");
    }

    #[test]
    fn test_registration_cannot_skip_verification() {
        use registration::*;
        let mut flow = registration_flow(OtpPolicy::default(), Arc::new(ManualClock::default())).unwrap();
        flow.set_field(FULL_NAME, FieldValue::text("Asha Rao"));
        flow.set_field(EMAIL, FieldValue::text("asha@studio.in"));
        flow.set_field(MOBILE, FieldValue::text("+91 98765 43210"));
        flow.advance().unwrap();

        flow.set_field(CODE_FIELD, FieldValue::text("123456"));
        assert_eq!(flow.advance(), Err(FlowError::OtpRequired));
        assert_eq!(flow.sequencer().current_index(), 1);
    }

    #[test]
    fn test_contact_flow_routes_and_resets_reason() {
        use contact::*;
        let backend = RecordingBackend::default();
        let mut flow = contact_flow(Arc::new(ManualClock::default())).unwrap();

        flow.set_field(ROLE, FieldValue::choice("seeker"));
        flow.set_field(REASON, FieldValue::choice("Payments / invoicing"));
        flow.set_field(ROLE, FieldValue::choice("provider"));
        assert_eq!(flow.fields().value(REASON), &FieldValue::Empty);
        assert!(matches!(flow.advance(), Err(FlowError::Validation { field: REASON, .. })));

        flow.set_field(REASON, FieldValue::choice("Payments / payouts"));
        assert_eq!(flow.advance(), Ok(AdvanceOutcome::Moved(1)));

        flow.set_field(NAME, FieldValue::text("Asha"));
        flow.set_field(EMAIL, FieldValue::text("asha@studio.in"));
        flow.set_field(MESSAGE, FieldValue::text("Payout is late."));
        let pending = match flow.advance().unwrap() {
            AdvanceOutcome::Submitting(pending) => pending,
            other => panic!("expected submission, got {other:?}"),
        };
        assert!(matches!(flow.deliver(pending, &backend), Completion::Succeeded(_)));

        let sent = backend.messages.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].role, "provider");
        assert_eq!(sent[0].reason, "Payments / payouts");
        assert_eq!(sent[0].company, None);
    }

    #[test]
    fn test_contact_back_and_forth_keeps_values() {
        use contact::*;
        let mut flow = contact_flow(Arc::new(ManualClock::default())).unwrap();
        flow.set_field(ROLE, FieldValue::choice("other"));
        flow.set_field(REASON, FieldValue::choice("Careers"));
        flow.advance().unwrap();
        flow.set_field(NAME, FieldValue::text("Asha"));

        assert_eq!(flow.retreat(), Ok(true));
        assert_eq!(flow.advance(), Ok(AdvanceOutcome::Moved(1)));
        assert_eq!(flow.fields().text(NAME), "Asha");
        assert_eq!(flow.fields().text(REASON), "Careers");
    }
}
