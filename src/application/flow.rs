//! A single form instance and the transitions it allows.
//!
//! `FormFlow` owns its field store, sequencer, optional OTP challenge and
//! submission controller exclusively. All transitions go through `&mut self`,
//! so a form instance is a single logical actor; the only suspending work
//! (remote calls) is handed out as pending tickets and fed back in.

use crate::domain::{
    Advance, AttemptId, Backend, BranchBinding, Clock, Completion, FieldId, FieldStore,
    FieldValue, FlowError, FlowResult, OtpChallenge, OtpChannel, OtpIssueRequest,
    OtpIssueResponse, OtpPolicy, OtpStatus, OtpVerifyResponse, PendingVerification, ProgressView,
    Receipt, Step, StepGate, StepSequencer, SubmissionController, TransportError, VerifyTicket,
    CODE_FIELD,
};
use serde::Serialize;
use std::sync::Arc;

/// Data a form hands to the backend once its last step passes.
pub trait FormPayload: Clone + Serialize + Send + 'static {
    /// Builds the payload from the current field values.
    fn collect(fields: &FieldStore) -> Self;

    /// Sends the payload and turns the backend's answer into a receipt.
    fn deliver(&self, backend: &dyn Backend) -> Result<Receipt, TransportError>;
}

/// Submission that has entered `Pending` and still has to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission<P> {
    pub attempt: AttemptId,
    pub payload: P,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome<P> {
    Moved(usize),
    Submitting(PendingSubmission<P>),
}

/// Which field supplies the delivery target for each OTP channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpTargets {
    pub email: FieldId,
    pub mobile: FieldId,
}

pub struct FormFlow<P> {
    fields: FieldStore,
    sequencer: StepSequencer,
    otp: Option<OtpChallenge>,
    otp_targets: Option<OtpTargets>,
    branch: Option<BranchBinding>,
    submission: SubmissionController<P>,
    clock: Arc<dyn Clock>,
    last_rejection: Option<FlowError>,
}

impl<P> std::fmt::Debug for FormFlow<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormFlow")
            .field("step", &self.sequencer.current_index())
            .field("completed", &self.sequencer.is_completed())
            .field("otp", &self.otp.as_ref().map(OtpChallenge::status))
            .field("submission", &self.submission.status())
            .finish()
    }
}

impl<P: FormPayload> FormFlow<P> {
    pub fn new(steps: Vec<Step>, fields: FieldStore, clock: Arc<dyn Clock>) -> FlowResult<Self> {
        Ok(Self {
            fields,
            sequencer: StepSequencer::new(steps)?,
            otp: None,
            otp_targets: None,
            branch: None,
            submission: SubmissionController::new(),
            clock,
            last_rejection: None,
        })
    }

    /// Attaches an OTP challenge for steps gated on verification.
    pub fn with_otp(mut self, policy: OtpPolicy, targets: OtpTargets) -> Self {
        self.fields.register(CODE_FIELD, crate::domain::Validator::Digits(policy.code_length));
        self.otp = Some(OtpChallenge::new(policy));
        self.otp_targets = Some(targets);
        self
    }

    /// Makes `binding.derived` follow the options resolved from `binding.choice`.
    pub fn with_branch(mut self, binding: BranchBinding) -> Self {
        binding.reconcile(&mut self.fields);
        self.branch = Some(binding);
        self
    }

    pub fn fields(&self) -> &FieldStore {
        &self.fields
    }

    pub fn sequencer(&self) -> &StepSequencer {
        &self.sequencer
    }

    pub fn current_step(&self) -> &Step {
        self.sequencer.current_step()
    }

    pub fn otp(&self) -> Option<&OtpChallenge> {
        self.otp.as_ref()
    }

    pub fn submission(&self) -> &SubmissionController<P> {
        &self.submission
    }

    pub fn is_completed(&self) -> bool {
        self.sequencer.is_completed()
    }

    /// The most recent refusal to move forward, cleared by the next success.
    pub fn last_rejection(&self) -> Option<&FlowError> {
        self.last_rejection.as_ref()
    }

    pub fn progress(&self) -> ProgressView {
        self.sequencer.progress(&self.fields, self.otp.as_ref())
    }

    /// Options currently offered for a choice field.
    pub fn options(&self, field: FieldId) -> Option<&[String]> {
        self.fields.validator(field).and_then(|v| v.options())
    }

    fn is_busy(&self) -> bool {
        self.submission.is_pending() || self.otp.as_ref().is_some_and(OtpChallenge::is_in_flight)
    }

    /// Writes one field; a change to a branch choice re-derives its options.
    ///
    /// Changing the email or mobile a code is delivered to drops the current
    /// challenge, so a new code has to be verified for the new address.
    pub fn set_field(&mut self, id: FieldId, value: FieldValue) {
        let retargets = self
            .otp_targets
            .is_some_and(|targets| id == targets.email || id == targets.mobile)
            && self.fields.value(id) != &value;
        self.fields.set_field(id, value);
        if retargets
            && let Some(otp) = self.otp.as_mut()
            && otp.status() != OtpStatus::NotRequested
        {
            tracing::info!(field = %id, "verification target changed, challenge dropped");
            otp.reset();
            self.fields.clear_field(CODE_FIELD);
        }
        if let Some(binding) = &self.branch
            && binding.choice == id
        {
            binding.reconcile(&mut self.fields);
        }
    }

    /// Cycles a choice field through its options; `forward` picks the direction.
    pub fn cycle_choice(&mut self, id: FieldId, forward: bool) -> bool {
        let options = match self.options(id) {
            Some(options) if !options.is_empty() => options.to_vec(),
            _ => return false,
        };
        let current = options.iter().position(|o| o == self.fields.text(id));
        let next = match (current, forward) {
            (None, true) => 0,
            (None, false) => options.len() - 1,
            (Some(i), true) => (i + 1) % options.len(),
            (Some(i), false) => (i + options.len() - 1) % options.len(),
        };
        self.set_field(id, FieldValue::choice(options[next].clone()));
        true
    }

    /// Attempts to leave the current step.
    ///
    /// From the last step a passing gate starts the submission: the controller
    /// is `Pending` before this returns and the caller delivers the payload.
    pub fn advance(&mut self) -> FlowResult<AdvanceOutcome<P>> {
        if self.is_busy() {
            return Err(FlowError::NavigationLocked);
        }
        if let Some(otp) = self.otp.as_mut() {
            otp.tick(self.clock.now());
        }

        let result = match self.sequencer.advance(&self.fields, self.otp.as_ref()) {
            Ok(Advance::Moved(index)) => Ok(AdvanceOutcome::Moved(index)),
            Ok(Advance::Submit) => self.start_submission(),
            Err(err) => Err(err),
        };

        match &result {
            Ok(_) => self.last_rejection = None,
            Err(err) => self.last_rejection = Some(err.clone()),
        }
        result
    }

    fn start_submission(&mut self) -> FlowResult<AdvanceOutcome<P>> {
        let payload = P::collect(&self.fields);
        let attempt = self.submission.begin(payload.clone())?;
        Ok(AdvanceOutcome::Submitting(PendingSubmission { attempt, payload }))
    }

    /// Goes back one step, keeping every value entered so far.
    pub fn retreat(&mut self) -> FlowResult<bool> {
        if self.is_busy() {
            return Err(FlowError::NavigationLocked);
        }
        self.last_rejection = None;
        Ok(self.sequencer.retreat())
    }

    /// Applies the result of a delivery started by [`FormFlow::advance`].
    ///
    /// Success completes the form and clears its values.
    pub fn complete_submission(
        &mut self,
        attempt: AttemptId,
        outcome: Result<Receipt, TransportError>,
    ) -> Completion {
        let completion = self.submission.complete(attempt, outcome);
        if let Completion::Succeeded(_) = completion {
            self.sequencer.mark_completed();
            self.fields.clear();
            if let Some(binding) = &self.branch {
                binding.reconcile(&mut self.fields);
            }
        }
        completion
    }

    /// Delivers a pending submission on the calling thread.
    pub fn deliver(&mut self, pending: PendingSubmission<P>, backend: &dyn Backend) -> Completion {
        let outcome = pending.payload.deliver(backend);
        self.complete_submission(pending.attempt, outcome)
    }

    /// Resubmits the payload of a failed attempt.
    pub fn retry_submission(&mut self) -> FlowResult<PendingSubmission<P>> {
        let (attempt, payload) = self.submission.retry()?;
        Ok(PendingSubmission { attempt, payload })
    }

    /// Builds the request for a new code, sent to the field bound to `channel`.
    pub fn otp_request(&self, channel: OtpChannel) -> FlowResult<OtpIssueRequest> {
        let (otp, targets) = match (&self.otp, &self.otp_targets) {
            (Some(otp), Some(targets)) => (otp, targets),
            _ => return Err(FlowError::InvalidDefinition("form has no verification step".to_string())),
        };
        if otp.is_in_flight() {
            return Err(FlowError::OtpUnavailable(otp.status()));
        }
        let field = match channel {
            OtpChannel::Email => targets.email,
            OtpChannel::Mobile => targets.mobile,
        };
        if let Some(issue) = self.fields.issue(field) {
            return Err(FlowError::Validation {
                field,
                issue: issue.clone(),
            });
        }
        Ok(OtpIssueRequest {
            channel,
            target: self.fields.text(field).to_string(),
        })
    }

    /// Starts a fresh challenge from the backend's grant and clears the typed code.
    pub fn accept_otp(&mut self, grant: OtpIssueResponse) {
        let now = self.clock.now();
        if let Some(otp) = self.otp.as_mut() {
            otp.issue(grant, now);
            self.fields.clear_field(CODE_FIELD);
        }
    }

    /// Requests and installs a new challenge on the calling thread.
    pub fn issue_otp(&mut self, channel: OtpChannel, backend: &dyn Backend) -> FlowResult<()> {
        let request = self.otp_request(channel)?;
        let grant = backend.issue_otp(&request)?;
        self.accept_otp(grant);
        Ok(())
    }

    /// Checks the typed code locally and enters `Verifying`.
    pub fn begin_otp_verification(&mut self) -> FlowResult<PendingVerification> {
        if self.submission.is_pending() {
            return Err(FlowError::NavigationLocked);
        }
        let now = self.clock.now();
        let code = self.fields.text(CODE_FIELD).to_string();
        match self.otp.as_mut() {
            Some(otp) => otp.begin_verify(&code, now),
            None => Err(FlowError::InvalidDefinition("form has no verification step".to_string())),
        }
    }

    pub fn finish_otp_verification(
        &mut self,
        ticket: VerifyTicket,
        outcome: Result<OtpVerifyResponse, TransportError>,
    ) -> FlowResult<()> {
        match self.otp.as_mut() {
            Some(otp) => otp.finish_verify(ticket, outcome),
            None => Ok(()),
        }
    }

    /// Verifies the typed code on the calling thread.
    pub fn verify_otp(&mut self, backend: &dyn Backend) -> FlowResult<()> {
        let pending = self.begin_otp_verification()?;
        let outcome = backend.verify_otp(&pending.request);
        self.finish_otp_verification(pending.ticket, outcome)
    }

    /// Whether the current step waits on a verification that has not happened.
    pub fn needs_verification(&self) -> bool {
        self.current_step().gate == StepGate::Otp
            && !self.otp.as_ref().is_some_and(OtpChallenge::is_verified)
    }

    /// Expires an outstanding challenge whose deadline has passed.
    pub fn tick(&mut self) -> bool {
        let now = self.clock.now();
        self.otp.as_mut().is_some_and(|otp| otp.tick(now))
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Cancels anything in flight, as when the form is closed.
    ///
    /// Late results for the cancelled work are discarded when they arrive.
    pub fn cancel_pending(&mut self) {
        let submission = self.submission.cancel();
        let verification = self.otp.as_mut().is_some_and(OtpChallenge::cancel);
        if submission || verification {
            tracing::info!(submission, verification, "form closed with work in flight");
        }
    }

    /// Back to a blank first step.
    pub fn reset(&mut self) {
        self.submission.reset();
        self.sequencer.restart();
        self.fields.clear();
        if let Some(otp) = self.otp.as_mut() {
            otp.reset();
        }
        if let Some(binding) = &self.branch {
            binding.reconcile(&mut self.fields);
        }
        self.last_rejection = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BranchResolver, ContactMessageRequest, ContactMessageResponse, FieldIssue, ManualClock,
        OtpVerifyRequest, RegistrationRequest, RegistrationResponse,
        SubmissionStatus, Validator,
    };
    use chrono::TimeDelta;
    use serde::Deserialize;
    use std::sync::Mutex;

    const TOPIC: FieldId = FieldId::new("topic");
    const DETAIL: FieldId = FieldId::new("detail");
    const EMAIL: FieldId = FieldId::new("email");
    const PHONE: FieldId = FieldId::new("phone");

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        topic: String,
        detail: String,
    }

    impl FormPayload for Note {
        fn collect(fields: &FieldStore) -> Self {
            Self {
                topic: fields.text(TOPIC).to_string(),
                detail: fields.text(DETAIL).to_string(),
            }
        }

        fn deliver(&self, _backend: &dyn Backend) -> Result<Receipt, TransportError> {
            Ok(Receipt { reference: Some(format!("{}/{}", self.topic, self.detail)) })
        }
    }

    struct CodeBackend {
        verify_calls: Mutex<u32>,
    }

    impl Backend for CodeBackend {
        fn submit_registration(&self, _: &RegistrationRequest) -> Result<RegistrationResponse, TransportError> {
            unreachable!()
        }

        fn issue_otp(&self, request: &OtpIssueRequest) -> Result<OtpIssueResponse, TransportError> {
            Ok(OtpIssueResponse {
                challenge_id: format!("challenge-for-{}", request.target),
                expires_at: chrono::DateTime::UNIX_EPOCH + TimeDelta::days(365),
            })
        }

        fn verify_otp(&self, request: &OtpVerifyRequest) -> Result<OtpVerifyResponse, TransportError> {
            *self.verify_calls.lock().unwrap() += 1;
            Ok(OtpVerifyResponse { verified: request.code == "111111", attempts_remaining: 3 })
        }

        fn send_contact_message(&self, _: &ContactMessageRequest) -> Result<ContactMessageResponse, TransportError> {
            unreachable!()
        }
    }

    fn branched_flow() -> FormFlow<Note> {
        let fields = FieldStore::new()
            .with(TOPIC, Validator::OneOf(vec!["billing".to_string(), "press".to_string()]))
            .with(DETAIL, Validator::NonEmpty);
        let steps = vec![Step::new(0, "Topic").required(TOPIC).required(DETAIL)];
        FormFlow::new(steps, fields, Arc::new(ManualClock::default()))
            .unwrap()
            .with_branch(BranchBinding::new(
                TOPIC,
                DETAIL,
                BranchResolver::new([
                    ("billing", vec!["Refund", "Invoice"]),
                    ("press", vec!["Interview", "Other"]),
                ]),
            ))
    }

    fn verified_flow(clock: ManualClock) -> FormFlow<Note> {
        let fields = FieldStore::new()
            .with(EMAIL, Validator::Email)
            .with(PHONE, Validator::Phone)
            .with(TOPIC, Validator::NonEmpty)
            .with(DETAIL, Validator::Any);
        let steps = vec![
            Step::new(0, "Contact").required(EMAIL).optional(PHONE),
            Step::new(1, "Verify").required(CODE_FIELD).otp_gated(),
            Step::new(2, "Topic").required(TOPIC).optional(DETAIL),
        ];
        FormFlow::new(steps, fields, Arc::new(clock))
            .unwrap()
            .with_otp(OtpPolicy::default(), OtpTargets { email: EMAIL, mobile: PHONE })
    }

    #[test]
    fn test_branch_options_follow_choice() {
        let mut flow = branched_flow();
        assert_eq!(flow.options(DETAIL), Some(&[][..]));

        flow.set_field(TOPIC, FieldValue::choice("billing"));
        assert_eq!(flow.options(DETAIL).unwrap(), ["Refund", "Invoice"]);

        flow.set_field(DETAIL, FieldValue::choice("Invoice"));
        flow.set_field(TOPIC, FieldValue::choice("press"));
        assert_eq!(flow.fields().value(DETAIL), &FieldValue::Empty);
        assert_eq!(flow.options(DETAIL).unwrap(), ["Interview", "Other"]);
    }

    #[test]
    fn test_cycle_choice_wraps() {
        let mut flow = branched_flow();
        assert!(flow.cycle_choice(TOPIC, true));
        assert_eq!(flow.fields().text(TOPIC), "billing");
        assert!(flow.cycle_choice(TOPIC, true));
        assert_eq!(flow.fields().text(TOPIC), "press");
        assert!(flow.cycle_choice(TOPIC, true));
        assert_eq!(flow.fields().text(TOPIC), "billing");
        assert!(flow.cycle_choice(DETAIL, false));
        assert_eq!(flow.fields().text(DETAIL), "Invoice");

        let mut empty = branched_flow();
        assert!(!empty.cycle_choice(DETAIL, true));
    }

    #[test]
    fn test_single_step_submit_and_complete() {
        let mut flow = branched_flow();
        let rejected = flow.advance();
        assert!(matches!(rejected, Err(FlowError::Validation { field: TOPIC, .. })));
        assert!(flow.last_rejection().is_some());

        flow.set_field(TOPIC, FieldValue::choice("press"));
        flow.set_field(DETAIL, FieldValue::choice("Interview"));
        let pending = match flow.advance().unwrap() {
            AdvanceOutcome::Submitting(pending) => pending,
            other => panic!("expected submission, got {other:?}"),
        };
        assert!(flow.last_rejection().is_none());
        assert_eq!(flow.submission().status(), SubmissionStatus::Pending);
        assert_eq!(pending.payload, Note { topic: "press".into(), detail: "Interview".into() });

        assert_eq!(flow.advance(), Err(FlowError::NavigationLocked));
        assert_eq!(flow.retreat(), Err(FlowError::NavigationLocked));

        let backend = CodeBackend { verify_calls: Mutex::new(0) };
        let completion = flow.deliver(pending, &backend);
        assert_eq!(
            completion,
            Completion::Succeeded(Receipt { reference: Some("press/Interview".into()) })
        );
        assert!(flow.is_completed());
        assert_eq!(flow.fields().value(TOPIC), &FieldValue::Empty);
        assert_eq!(flow.advance(), Err(FlowError::AlreadyCompleted));
    }

    #[test]
    fn test_cancel_pending_discards_late_result() {
        let mut flow = branched_flow();
        flow.set_field(TOPIC, FieldValue::choice("billing"));
        flow.set_field(DETAIL, FieldValue::choice("Refund"));
        let pending = match flow.advance().unwrap() {
            AdvanceOutcome::Submitting(pending) => pending,
            other => panic!("expected submission, got {other:?}"),
        };

        flow.cancel_pending();
        assert_eq!(flow.submission().status(), SubmissionStatus::Idle);

        let late = flow.complete_submission(pending.attempt, Ok(Receipt::default()));
        assert_eq!(late, Completion::Discarded);
        assert_eq!(flow.submission().status(), SubmissionStatus::Idle);
        assert!(!flow.is_completed());
        assert_eq!(flow.fields().text(DETAIL), "Refund");
    }

    #[test]
    fn test_failed_submission_can_be_retried() {
        let mut flow = branched_flow();
        flow.set_field(TOPIC, FieldValue::choice("billing"));
        flow.set_field(DETAIL, FieldValue::choice("Refund"));
        let pending = match flow.advance().unwrap() {
            AdvanceOutcome::Submitting(pending) => pending,
            other => panic!("expected submission, got {other:?}"),
        };

        let failed = flow.complete_submission(pending.attempt, Err(TransportError::Request("offline".into())));
        assert!(matches!(failed, Completion::Failed(FlowError::SubmissionFailed(_))));
        assert!(!flow.is_completed());

        let again = flow.retry_submission().unwrap();
        assert_eq!(again.payload, pending.payload);
        assert!(matches!(
            flow.complete_submission(again.attempt, Ok(Receipt::default())),
            Completion::Succeeded(_)
        ));
    }

    #[test]
    fn test_otp_gate_in_flow() {
        let clock = ManualClock::default();
        let backend = CodeBackend { verify_calls: Mutex::new(0) };
        let mut flow = verified_flow(clock.clone());

        assert!(matches!(
            flow.otp_request(OtpChannel::Email),
            Err(FlowError::Validation { field: EMAIL, issue: FieldIssue::Missing })
        ));

        flow.set_field(EMAIL, FieldValue::text("asha@studio.in"));
        assert_eq!(flow.advance(), Ok(AdvanceOutcome::Moved(1)));
        assert!(flow.needs_verification());

        flow.issue_otp(OtpChannel::Email, &backend).unwrap();
        assert_eq!(
            flow.otp().and_then(OtpChallenge::challenge_id),
            Some("challenge-for-asha@studio.in")
        );

        flow.set_field(CODE_FIELD, FieldValue::text("222222"));
        assert_eq!(flow.advance(), Err(FlowError::OtpRequired));
        assert!(matches!(flow.verify_otp(&backend), Err(FlowError::OtpMismatch { attempts_remaining: 2 })));

        flow.set_field(CODE_FIELD, FieldValue::text("111 111"));
        flow.verify_otp(&backend).unwrap();
        assert!(!flow.needs_verification());
        assert_eq!(flow.advance(), Ok(AdvanceOutcome::Moved(2)));
        assert_eq!(*backend.verify_calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_otp_expires_through_clock() {
        let clock = ManualClock::default();
        let backend = CodeBackend { verify_calls: Mutex::new(0) };
        let mut flow = verified_flow(clock.clone());
        flow.set_field(EMAIL, FieldValue::text("asha@studio.in"));
        flow.advance().unwrap();
        flow.issue_otp(OtpChannel::Email, &backend).unwrap();

        clock.advance(TimeDelta::minutes(6));
        assert!(flow.tick());
        assert_eq!(flow.otp().map(OtpChallenge::status), Some(OtpStatus::Expired));

        flow.set_field(CODE_FIELD, FieldValue::text("111111"));
        assert_eq!(flow.verify_otp(&backend), Err(FlowError::OtpExpired));

        flow.issue_otp(OtpChannel::Email, &backend).unwrap();
        assert_eq!(flow.fields().value(CODE_FIELD), &FieldValue::Empty);
        flow.set_field(CODE_FIELD, FieldValue::text("111111"));
        assert!(flow.verify_otp(&backend).is_ok());
    }

    #[test]
    fn test_navigation_locked_while_verifying() {
        let clock = ManualClock::default();
        let backend = CodeBackend { verify_calls: Mutex::new(0) };
        let mut flow = verified_flow(clock);
        flow.set_field(EMAIL, FieldValue::text("asha@studio.in"));
        flow.advance().unwrap();
        flow.issue_otp(OtpChannel::Email, &backend).unwrap();
        flow.set_field(CODE_FIELD, FieldValue::text("111111"));

        let pending = flow.begin_otp_verification().unwrap();
        assert_eq!(flow.retreat(), Err(FlowError::NavigationLocked));
        assert!(matches!(flow.otp_request(OtpChannel::Email), Err(FlowError::OtpUnavailable(_))));

        flow.cancel_pending();
        assert_eq!(flow.otp().map(OtpChallenge::status), Some(OtpStatus::Issued));
        flow.finish_otp_verification(pending.ticket, Ok(OtpVerifyResponse { verified: true, attempts_remaining: 3 }))
            .unwrap();
        assert!(flow.needs_verification());
        assert_eq!(flow.retreat(), Ok(true));
    }

    #[test]
    fn test_reset_returns_to_blank_first_step() {
        let clock = ManualClock::default();
        let backend = CodeBackend { verify_calls: Mutex::new(0) };
        let mut flow = verified_flow(clock);
        flow.set_field(EMAIL, FieldValue::text("asha@studio.in"));
        flow.advance().unwrap();
        flow.issue_otp(OtpChannel::Email, &backend).unwrap();

        flow.reset();
        assert_eq!(flow.sequencer().current_index(), 0);
        assert_eq!(flow.fields().value(EMAIL), &FieldValue::Empty);
        assert_eq!(flow.otp().map(OtpChallenge::status), Some(OtpStatus::NotRequested));
    }

    #[test]
    fn test_changing_code_target_requires_new_code() {
        let clock = ManualClock::default();
        let backend = CodeBackend { verify_calls: Mutex::new(0) };
        let mut flow = verified_flow(clock);
        flow.set_field(EMAIL, FieldValue::text("asha@studio.in"));
        flow.advance().unwrap();
        flow.issue_otp(OtpChannel::Email, &backend).unwrap();
        flow.set_field(CODE_FIELD, FieldValue::text("111111"));
        flow.verify_otp(&backend).unwrap();

        assert_eq!(flow.retreat(), Ok(true));
        flow.set_field(EMAIL, FieldValue::text("asha@studio.in"));
        assert!(flow.otp().is_some_and(OtpChallenge::is_verified));

        flow.set_field(EMAIL, FieldValue::text("someone@else.in"));
        assert_eq!(flow.otp().map(OtpChallenge::status), Some(OtpStatus::NotRequested));
        assert_eq!(flow.fields().value(CODE_FIELD), &FieldValue::Empty);
        assert_eq!(flow.advance(), Ok(AdvanceOutcome::Moved(1)));
        flow.set_field(CODE_FIELD, FieldValue::text("111111"));
        assert_eq!(flow.advance(), Err(FlowError::OtpRequired));

        flow.issue_otp(OtpChannel::Email, &backend).unwrap();
        assert_eq!(
            flow.otp().and_then(OtpChallenge::challenge_id),
            Some("challenge-for-someone@else.in")
        );
        flow.set_field(PHONE, FieldValue::text("+91 98765 43210"));
        assert_eq!(flow.otp().map(OtpChallenge::status), Some(OtpStatus::NotRequested));
    }
}
