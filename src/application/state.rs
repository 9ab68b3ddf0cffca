//! Application state for the terminal front-end.
//!
//! `App` owns one instance of each form plus the background job runner. Key
//! handlers call into it, and the event loop calls [`App::tick`] to fold
//! finished remote calls back into the forms.

use super::flow::{AdvanceOutcome, FormFlow, FormPayload, PendingSubmission};
use super::forms::{self, ContactFlow, RegistrationFlow, contact, registration};
use super::jobs::{Job, JobOutcome, JobRunner};
use crate::domain::{
    Backend, Clock, Completion, FieldId, FieldStore, FieldValue, FlowError, FlowResult,
    OtpChallenge, OtpChannel, OtpPolicy, OtpStatus, ProgressView, Receipt, Step,
    SubmissionStatus,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// The forms reachable from the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Registration,
    Contact,
}

impl FormKind {
    pub const ALL: [FormKind; 2] = [FormKind::Registration, FormKind::Contact];

    pub fn title(self) -> &'static str {
        match self {
            FormKind::Registration => "Register as an Expert",
            FormKind::Contact => "Contact Us",
        }
    }

    pub fn field_label(self, id: FieldId) -> &'static str {
        match self {
            FormKind::Registration => registration::label(id),
            FormKind::Contact => contact::label(id),
        }
    }
}

/// Represents the current mode of the application.
///
/// Determines how key presses are interpreted and what is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// Form picker
    Menu,
    /// Filling in a form
    Form(FormKind),
    /// Help popup, remembering which form to return to
    Help(Option<FormKind>),
}

/// Read-only snapshot of the active form, handed to the renderer.
pub struct FormView<'a> {
    pub kind: FormKind,
    pub fields: &'a FieldStore,
    pub step: &'a Step,
    pub progress: ProgressView,
    pub otp: Option<&'a OtpChallenge>,
    pub submission: SubmissionStatus,
    pub submission_error: Option<&'a FlowError>,
    pub receipt: Option<&'a Receipt>,
    pub rejection: Option<&'a FlowError>,
    pub now: DateTime<Utc>,
}

impl<'a> FormView<'a> {
    fn of<P: FormPayload>(kind: FormKind, flow: &'a FormFlow<P>) -> Self {
        Self {
            kind,
            fields: flow.fields(),
            step: flow.current_step(),
            progress: flow.progress(),
            otp: flow.otp(),
            submission: flow.submission().status(),
            submission_error: flow.submission().last_error(),
            receipt: flow.submission().receipt(),
            rejection: flow.last_rejection(),
            now: flow.now(),
        }
    }

    pub fn options(&self, id: FieldId) -> Option<&'a [String]> {
        self.fields.validator(id).and_then(|v| v.options())
    }

    /// What to print for a field's current value.
    pub fn display_value(&self, id: FieldId) -> String {
        let raw = self.fields.value(id).as_str();
        if self.kind == FormKind::Contact && id == contact::ROLE {
            return contact::role_label(raw).to_string();
        }
        raw.to_string()
    }
}

/// Source of the last issued code when the backend is simulated.
pub type CodeHint = Box<dyn Fn() -> Option<String> + Send>;

enum Advanced {
    Moved(usize),
    Spawn(Job),
}

fn advance_flow<P: FormPayload>(
    flow: &mut FormFlow<P>,
    to_job: fn(PendingSubmission<P>) -> Job,
) -> FlowResult<Advanced> {
    Ok(match flow.advance()? {
        AdvanceOutcome::Moved(index) => Advanced::Moved(index),
        AdvanceOutcome::Submitting(pending) => Advanced::Spawn(to_job(pending)),
    })
}

fn byte_offset(text: &str, cursor: usize) -> usize {
    text.char_indices()
        .nth(cursor)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

/// Runs `$body` with `$flow` bound to the form selected by `$kind`.
macro_rules! on_form {
    ($app:expr, $kind:expr, |$flow:ident| $body:expr) => {
        match $kind {
            FormKind::Registration => {
                let $flow = &mut $app.registration;
                $body
            }
            FormKind::Contact => {
                let $flow = &mut $app.contact;
                $body
            }
        }
    };
}

/// Main application state.
pub struct App {
    pub mode: AppMode,
    /// Highlighted entry in the menu
    pub menu_index: usize,
    pub registration: RegistrationFlow,
    pub contact: ContactFlow,
    /// Index of the focused field within the current step
    pub focus: usize,
    /// Cursor within the focused text field, in characters
    pub cursor_position: usize,
    pub help_scroll: usize,
    pub status_message: Option<String>,
    /// Where verification codes are sent
    pub otp_channel: OtpChannel,
    jobs: JobRunner,
    otp_requests: u64,
    awaiting_code: Option<u64>,
    code_hint: Option<CodeHint>,
}

impl App {
    pub fn new(
        backend: Arc<dyn Backend>,
        policy: OtpPolicy,
        otp_channel: OtpChannel,
        clock: Arc<dyn Clock>,
    ) -> FlowResult<Self> {
        Ok(Self {
            mode: AppMode::Menu,
            menu_index: 0,
            registration: forms::registration_flow(policy, Arc::clone(&clock))?,
            contact: forms::contact_flow(clock)?,
            focus: 0,
            cursor_position: 0,
            help_scroll: 0,
            status_message: None,
            otp_channel,
            jobs: JobRunner::new(backend),
            otp_requests: 0,
            awaiting_code: None,
            code_hint: None,
        })
    }

    /// Shows the issued code in the status line after each issuance.
    pub fn with_code_hint(mut self, hint: impl Fn() -> Option<String> + Send + 'static) -> Self {
        self.code_hint = Some(Box::new(hint));
        self
    }

    pub fn active_form(&self) -> Option<FormKind> {
        match self.mode {
            AppMode::Form(kind) | AppMode::Help(Some(kind)) => Some(kind),
            _ => None,
        }
    }

    pub fn form_view(&self, kind: FormKind) -> FormView<'_> {
        match kind {
            FormKind::Registration => FormView::of(kind, &self.registration),
            FormKind::Contact => FormView::of(kind, &self.contact),
        }
    }

    /// Whether any remote call is still running.
    pub fn is_busy(&self) -> bool {
        self.jobs.in_flight() > 0
    }

    pub fn is_awaiting_code(&self) -> bool {
        self.awaiting_code.is_some()
    }

    fn step_fields(&self, kind: FormKind) -> Vec<FieldId> {
        match kind {
            FormKind::Registration => self.registration.current_step().fields().to_vec(),
            FormKind::Contact => self.contact.current_step().fields().to_vec(),
        }
    }

    fn is_completed(&self, kind: FormKind) -> bool {
        match kind {
            FormKind::Registration => self.registration.is_completed(),
            FormKind::Contact => self.contact.is_completed(),
        }
    }

    fn is_choice(&self, kind: FormKind, id: FieldId) -> bool {
        match kind {
            FormKind::Registration => self.registration.options(id).is_some(),
            FormKind::Contact => self.contact.options(id).is_some(),
        }
    }

    /// The form and field that keystrokes currently go to.
    pub fn focused_field(&self) -> Option<(FormKind, FieldId)> {
        let AppMode::Form(kind) = self.mode else {
            return None;
        };
        if self.is_completed(kind) {
            return None;
        }
        self.step_fields(kind).get(self.focus).map(|id| (kind, *id))
    }

    fn set_focus(&mut self, index: usize) {
        self.focus = index;
        self.cursor_position = match self.focused_field() {
            Some((FormKind::Registration, id)) => self.registration.fields().value(id).as_str().chars().count(),
            Some((FormKind::Contact, id)) => self.contact.fields().value(id).as_str().chars().count(),
            None => 0,
        };
    }

    fn report(&mut self, err: FlowError) {
        tracing::warn!(error = %err, "action refused");
        if let FlowError::Validation { field, .. } = &err
            && let AppMode::Form(kind) = self.mode
            && let Some(index) = self.step_fields(kind).iter().position(|id| id == field)
        {
            self.set_focus(index);
        }
        let message = match &err {
            FlowError::Validation { field, issue } => match self.active_form() {
                Some(kind) => format!("{}: {issue}", kind.field_label(*field)),
                None => err.to_string(),
            },
            FlowError::SubmissionFailed(_) => format!("{err}. Press Enter to try again."),
            _ => err.to_string(),
        };
        self.status_message = Some(message);
    }

    // Menu

    pub fn menu_up(&mut self) {
        self.menu_index = self.menu_index.saturating_sub(1);
    }

    pub fn menu_down(&mut self) {
        self.menu_index = (self.menu_index + 1).min(FormKind::ALL.len() - 1);
    }

    pub fn open_selected(&mut self) {
        if let Some(kind) = FormKind::ALL.get(self.menu_index).copied() {
            self.open_form(kind);
        }
    }

    pub fn open_form(&mut self, kind: FormKind) {
        tracing::info!(form = kind.title(), "form opened");
        self.mode = AppMode::Form(kind);
        self.status_message = None;
        self.set_focus(0);
        if kind == FormKind::Registration {
            self.request_code_if_needed();
        }
    }

    /// Closes the active form, cancelling anything it has in flight.
    ///
    /// Entered values are kept for the next visit.
    pub fn leave_form(&mut self) {
        let Some(kind) = self.active_form() else {
            return;
        };
        on_form!(self, kind, |flow| flow.cancel_pending());
        if kind == FormKind::Registration {
            self.awaiting_code = None;
        }
        self.mode = AppMode::Menu;
        self.status_message = None;
    }

    fn finish_completed(&mut self, kind: FormKind) {
        on_form!(self, kind, |flow| flow.reset());
        self.mode = AppMode::Menu;
        self.status_message = None;
    }

    // Help

    pub fn show_help(&mut self) {
        self.mode = AppMode::Help(self.active_form());
        self.help_scroll = 0;
    }

    pub fn close_help(&mut self) {
        self.mode = match self.mode {
            AppMode::Help(Some(kind)) => AppMode::Form(kind),
            _ => AppMode::Menu,
        };
    }

    // Field focus and editing

    pub fn focus_next(&mut self) {
        if let Some(kind) = self.active_form() {
            let count = self.step_fields(kind).len();
            if count > 0 {
                self.set_focus((self.focus + 1) % count);
            }
        }
    }

    pub fn focus_prev(&mut self) {
        if let Some(kind) = self.active_form() {
            let count = self.step_fields(kind).len();
            if count > 0 {
                self.set_focus((self.focus + count - 1) % count);
            }
        }
    }

    fn edit_focused(&mut self, edit: impl FnOnce(&mut String, &mut usize)) {
        let Some((kind, id)) = self.focused_field() else {
            return;
        };
        if self.is_choice(kind, id) {
            return;
        }
        let mut cursor = self.cursor_position;
        let changed = on_form!(self, kind, |flow| {
            let before = flow.fields().value(id).as_str().to_string();
            let mut text = before.clone();
            cursor = cursor.min(text.chars().count());
            edit(&mut text, &mut cursor);
            let changed = text != before;
            flow.set_field(id, FieldValue::text(text));
            changed
        });
        self.cursor_position = cursor;
        if changed
            && kind == FormKind::Registration
            && (id == registration::EMAIL || id == registration::MOBILE)
            && let Some(request_id) = self.awaiting_code.take()
        {
            tracing::debug!(request_id, "code target edited while sending, grant will be dropped");
        }
    }

    pub fn insert_char(&mut self, c: char) {
        self.edit_focused(|text, cursor| {
            text.insert(byte_offset(text, *cursor), c);
            *cursor += 1;
        });
    }

    /// Inserts pasted text at the cursor; line breaks become spaces.
    pub fn insert_text(&mut self, pasted: &str) {
        let clean: String = pasted
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        self.edit_focused(|text, cursor| {
            text.insert_str(byte_offset(text, *cursor), &clean);
            *cursor += clean.chars().count();
        });
    }

    pub fn backspace(&mut self) {
        self.edit_focused(|text, cursor| {
            if *cursor > 0 {
                *cursor -= 1;
                text.remove(byte_offset(text, *cursor));
            }
        });
    }

    pub fn delete(&mut self) {
        self.edit_focused(|text, cursor| {
            if *cursor < text.chars().count() {
                text.remove(byte_offset(text, *cursor));
            }
        });
    }

    /// Moves the cursor, or steps backwards through a choice field's options.
    pub fn move_left(&mut self) {
        self.move_or_cycle(false);
    }

    /// Moves the cursor, or steps forwards through a choice field's options.
    pub fn move_right(&mut self) {
        self.move_or_cycle(true);
    }

    fn move_or_cycle(&mut self, forward: bool) {
        let Some((kind, id)) = self.focused_field() else {
            return;
        };
        if self.is_choice(kind, id) {
            let cycled = on_form!(self, kind, |flow| flow.cycle_choice(id, forward));
            if !cycled {
                self.status_message = Some("No options yet, answer the previous question first".to_string());
            }
            return;
        }
        let len = match kind {
            FormKind::Registration => self.registration.fields().value(id).as_str().chars().count(),
            FormKind::Contact => self.contact.fields().value(id).as_str().chars().count(),
        };
        self.cursor_position = if forward {
            (self.cursor_position + 1).min(len)
        } else {
            self.cursor_position.saturating_sub(1)
        };
    }

    pub fn cursor_home(&mut self) {
        self.cursor_position = 0;
    }

    pub fn cursor_end(&mut self) {
        self.set_focus(self.focus);
    }

    // Navigation

    /// Enter: continue, verify, submit, or leave a completed form.
    pub fn submit(&mut self) {
        let AppMode::Form(kind) = self.mode else {
            return;
        };
        self.status_message = None;
        if self.is_completed(kind) {
            self.finish_completed(kind);
            return;
        }
        if kind == FormKind::Registration && self.registration.needs_verification() {
            self.verify_or_request();
            return;
        }

        let advanced = match kind {
            FormKind::Registration => advance_flow(&mut self.registration, Job::SubmitRegistration),
            FormKind::Contact => advance_flow(&mut self.contact, Job::SendContact),
        };
        match advanced {
            Ok(Advanced::Moved(index)) => {
                tracing::debug!(form = kind.title(), step = index, "advanced");
                self.set_focus(0);
                if kind == FormKind::Registration {
                    self.request_code_if_needed();
                }
            }
            Ok(Advanced::Spawn(job)) => {
                self.jobs.spawn(job);
                self.status_message = Some("Submitting…".to_string());
            }
            Err(err) => self.report(err),
        }
    }

    /// Esc: one step back, or out of the form from its first step.
    pub fn back(&mut self) {
        let AppMode::Form(kind) = self.mode else {
            return;
        };
        if self.is_completed(kind) {
            self.finish_completed(kind);
            return;
        }
        let at_start = match kind {
            FormKind::Registration => self.registration.sequencer().current_index() == 0,
            FormKind::Contact => self.contact.sequencer().current_index() == 0,
        };
        if at_start {
            self.leave_form();
            return;
        }
        match on_form!(self, kind, |flow| flow.retreat()) {
            Ok(_) => {
                self.status_message = None;
                self.set_focus(0);
            }
            Err(err) => self.report(err),
        }
    }

    // Verification

    fn request_code_if_needed(&mut self) {
        let untouched = self
            .registration
            .otp()
            .is_some_and(|otp| otp.status() == OtpStatus::NotRequested);
        if self.registration.needs_verification() && untouched && self.awaiting_code.is_none() {
            self.request_code();
        }
    }

    fn request_code(&mut self) {
        match self.registration.otp_request(self.otp_channel) {
            Ok(request) => {
                self.otp_requests += 1;
                self.awaiting_code = Some(self.otp_requests);
                self.jobs.spawn(Job::IssueOtp {
                    request_id: self.otp_requests,
                    request,
                });
                self.status_message = Some(format!("Sending a code to your {}…", self.otp_channel));
            }
            Err(err) => self.report(err),
        }
    }

    fn verify_or_request(&mut self) {
        if self.awaiting_code.is_some() {
            self.status_message = Some("Still sending your code…".to_string());
            return;
        }
        match self.registration.otp().map(OtpChallenge::status) {
            Some(OtpStatus::NotRequested) | Some(OtpStatus::Expired) => self.request_code(),
            _ => match self.registration.begin_otp_verification() {
                Ok(pending) => {
                    self.jobs.spawn(Job::VerifyOtp(pending));
                    self.status_message = Some("Checking your code…".to_string());
                }
                Err(err) => self.report(err),
            },
        }
    }

    /// Ctrl+R on the verification step.
    pub fn resend_code(&mut self) {
        if self.mode != AppMode::Form(FormKind::Registration) || !self.registration.needs_verification() {
            return;
        }
        if self.awaiting_code.is_some() {
            self.status_message = Some("Still sending your code…".to_string());
            return;
        }
        self.request_code();
    }

    /// Switches between email and mobile delivery for the next code.
    pub fn toggle_channel(&mut self) {
        self.otp_channel = match self.otp_channel {
            OtpChannel::Email => OtpChannel::Mobile,
            OtpChannel::Mobile => OtpChannel::Email,
        };
        self.status_message = Some(format!(
            "Codes will go to your {}. Press Ctrl+R to send one.",
            self.otp_channel
        ));
    }

    // Background work

    /// Applies finished remote calls and expires stale codes.
    pub fn tick(&mut self) {
        for outcome in self.jobs.drain() {
            self.apply(outcome);
        }
        if self.registration.tick() {
            self.status_message = Some("Your code expired. Press Ctrl+R for a new one.".to_string());
        }
    }

    /// Blocks until every running job has been applied.
    pub fn settle(&mut self) {
        while self.jobs.in_flight() > 0 {
            match self.jobs.wait() {
                Some(outcome) => self.apply(outcome),
                None => break,
            }
        }
        self.tick();
    }

    fn apply(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::OtpIssued { request_id, result } => {
                if self.awaiting_code != Some(request_id) {
                    tracing::debug!(request_id, "dropping code issued for a closed form");
                    return;
                }
                self.awaiting_code = None;
                match result {
                    Ok(grant) => {
                        self.registration.accept_otp(grant);
                        if self.mode == AppMode::Form(FormKind::Registration) {
                            self.set_focus(0);
                        }
                        let hint = self.code_hint.as_ref().and_then(|hint| hint());
                        self.status_message = Some(match hint {
                            Some(code) => format!("Code sent to your {}. Demo code: {code}", self.otp_channel),
                            None => format!("Code sent to your {}.", self.otp_channel),
                        });
                    }
                    Err(err) => self.report(err.into()),
                }
            }
            JobOutcome::OtpChecked { ticket, result } => {
                match self.registration.finish_otp_verification(ticket, result) {
                    Ok(()) if self.registration.otp().is_some_and(OtpChallenge::is_verified) => {
                        self.status_message = Some("Verified. Press Enter to continue.".to_string());
                    }
                    Ok(()) => {}
                    Err(err) => self.report(err),
                }
            }
            JobOutcome::Registration { attempt, result } => {
                match self.registration.complete_submission(attempt, result) {
                    Completion::Succeeded(receipt) => {
                        self.status_message = Some(match receipt.reference {
                            Some(reference) => format!("Registration received. Reference {reference}."),
                            None => "Registration received.".to_string(),
                        });
                    }
                    Completion::Failed(err) => self.report(err),
                    Completion::Discarded => {}
                }
            }
            JobOutcome::Contact { attempt, result } => {
                match self.contact.complete_submission(attempt, result) {
                    Completion::Succeeded(_) => {
                        self.contact.reset();
                        if self.mode == AppMode::Form(FormKind::Contact) {
                            self.set_focus(0);
                        }
                        self.status_message = Some(format!("Message sent. {}", contact::RESPONSE_NOTE));
                    }
                    Completion::Failed(err) => self.report(err),
                    Completion::Discarded => {}
                }
            }
        }
    }
}
