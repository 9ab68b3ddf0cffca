//! Ordered, gated steps of a form.

use super::errors::{FlowError, FlowResult};
use super::fields::FieldStore;
use super::models::{Step, StepGate};
use super::otp::OtpChallenge;
use super::progress::{ProgressView, StepMarker, StepProgress};

/// Result of a permitted forward move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Now on the step with this index.
    Moved(usize),
    /// The last step passed its gate; the form is ready to submit.
    Submit,
}

/// Owns the step list and the current position within it.
///
/// The index is always a valid step index. `Completed` is a separate flag that
/// only [`StepSequencer::mark_completed`] sets, after a successful submission.
#[derive(Debug, Clone)]
pub struct StepSequencer {
    steps: Vec<Step>,
    current: usize,
    completed: bool,
}

impl StepSequencer {
    /// Orders `steps` by id and rejects empty or duplicated tables.
    pub fn new(mut steps: Vec<Step>) -> FlowResult<Self> {
        if steps.is_empty() {
            return Err(FlowError::InvalidDefinition("a form needs at least one step".to_string()));
        }
        steps.sort_by_key(|s| s.id);
        if let Some(pair) = steps.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(FlowError::InvalidDefinition(format!(
                "step id {} is used twice",
                pair[0].id
            )));
        }
        Ok(Self {
            steps,
            current: 0,
            completed: false,
        })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_step(&self) -> &Step {
        &self.steps[self.current]
    }

    pub fn last_index(&self) -> usize {
        self.steps.len() - 1
    }

    pub fn is_last(&self) -> bool {
        self.current == self.last_index()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Whether the gate of the current step is open.
    ///
    /// On failure the error names the first blocking field, or says that the
    /// OTP challenge still needs verifying.
    pub fn check_gate(&self, fields: &FieldStore, otp: Option<&OtpChallenge>) -> FlowResult<()> {
        Self::gate(self.current_step(), fields, otp)
    }

    fn gate(step: &Step, fields: &FieldStore, otp: Option<&OtpChallenge>) -> FlowResult<()> {
        if let Some((field, issue)) = fields.first_unmet(step) {
            return Err(FlowError::Validation { field, issue });
        }
        if step.gate == StepGate::Otp && !otp.is_some_and(OtpChallenge::is_verified) {
            return Err(FlowError::OtpRequired);
        }
        Ok(())
    }

    /// Moves forward if the current step's gate is open.
    ///
    /// A closed gate leaves the position unchanged. From the last step a
    /// passing gate yields [`Advance::Submit`] instead of moving.
    pub fn advance(&mut self, fields: &FieldStore, otp: Option<&OtpChallenge>) -> FlowResult<Advance> {
        if self.completed {
            return Err(FlowError::AlreadyCompleted);
        }
        if let Err(err) = self.check_gate(fields, otp) {
            tracing::debug!(step = self.current, error = %err, "advance blocked");
            return Err(err);
        }
        if self.is_last() {
            return Ok(Advance::Submit);
        }
        self.current += 1;
        tracing::debug!(step = self.current, "advanced");
        Ok(Advance::Moved(self.current))
    }

    /// Moves back one step. Returns false on the first step or once completed.
    pub fn retreat(&mut self) -> bool {
        if self.completed || self.current == 0 {
            return false;
        }
        self.current -= 1;
        tracing::debug!(step = self.current, "retreated");
        true
    }

    pub fn mark_completed(&mut self) {
        self.completed = true;
    }

    pub fn restart(&mut self) {
        self.current = 0;
        self.completed = false;
    }

    /// Read-only summary for a stepper display.
    pub fn progress(&self, fields: &FieldStore, otp: Option<&OtpChallenge>) -> ProgressView {
        let steps = self
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let marker = if self.completed || index < self.current {
                    StepMarker::Done
                } else if index == self.current {
                    StepMarker::Active
                } else {
                    StepMarker::Upcoming
                };
                StepProgress {
                    id: step.id,
                    title: step.title,
                    marker,
                    ready: Self::gate(step, fields, otp).is_ok(),
                }
            })
            .collect();

        ProgressView {
            current: self.current,
            completed: self.completed,
            steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract::OtpIssueResponse;
    use crate::domain::errors::FieldIssue;
    use crate::domain::models::{FieldId, FieldValue};
    use crate::domain::{OtpPolicy, Validator};
    use chrono::{DateTime, TimeDelta};

    const NAME: FieldId = FieldId::new("name");
    const CODE: FieldId = FieldId::new("otp");
    const NOTE: FieldId = FieldId::new("note");

    fn create_test_sequencer() -> StepSequencer {
        StepSequencer::new(vec![
            Step::new(0, "Basics").required(NAME),
            Step::new(1, "Verify").required(CODE).otp_gated(),
            Step::new(2, "Extra").optional(NOTE),
        ])
        .unwrap()
    }

    fn create_test_fields() -> FieldStore {
        FieldStore::new()
            .with(NAME, Validator::NonEmpty)
            .with(CODE, Validator::Digits(6))
            .with(NOTE, Validator::Any)
    }

    fn verified_otp() -> OtpChallenge {
        let now = DateTime::UNIX_EPOCH;
        let mut otp = OtpChallenge::new(OtpPolicy::default());
        otp.issue(
            OtpIssueResponse {
                challenge_id: "c".to_string(),
                expires_at: now + TimeDelta::minutes(5),
            },
            now,
        );
        let pending = otp.begin_verify("123456", now).unwrap();
        otp.finish_verify(
            pending.ticket,
            Ok(crate::domain::contract::OtpVerifyResponse {
                verified: true,
                attempts_remaining: 3,
            }),
        )
        .unwrap();
        otp
    }

    #[test]
    fn test_rejects_bad_definitions() {
        assert!(matches!(StepSequencer::new(vec![]), Err(FlowError::InvalidDefinition(_))));
        let twice = StepSequencer::new(vec![Step::new(1, "A"), Step::new(1, "B")]);
        assert!(matches!(twice, Err(FlowError::InvalidDefinition(_))));
    }

    #[test]
    fn test_steps_are_ordered_by_id() {
        let sequencer = StepSequencer::new(vec![Step::new(2, "C"), Step::new(0, "A"), Step::new(1, "B")]).unwrap();
        let titles: Vec<_> = sequencer.steps().iter().map(|s| s.title).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
        assert_eq!(sequencer.current_index(), 0);
    }

    #[test]
    fn test_advance_blocked_by_first_unmet_field() {
        let mut sequencer = create_test_sequencer();
        let fields = create_test_fields();
        let result = sequencer.advance(&fields, None);
        assert_eq!(
            result,
            Err(FlowError::Validation { field: NAME, issue: FieldIssue::Missing })
        );
        assert_eq!(sequencer.current_index(), 0);
    }

    #[test]
    fn test_otp_step_requires_verified_challenge() {
        let mut sequencer = create_test_sequencer();
        let mut fields = create_test_fields();
        fields.set_field(NAME, FieldValue::text("Asha"));
        fields.set_field(CODE, FieldValue::text("123456"));

        assert_eq!(sequencer.advance(&fields, None), Ok(Advance::Moved(1)));
        assert_eq!(sequencer.advance(&fields, None), Err(FlowError::OtpRequired));

        let unverified = OtpChallenge::new(OtpPolicy::default());
        assert_eq!(sequencer.advance(&fields, Some(&unverified)), Err(FlowError::OtpRequired));

        let otp = verified_otp();
        assert_eq!(sequencer.advance(&fields, Some(&otp)), Ok(Advance::Moved(2)));
        assert_eq!(sequencer.advance(&fields, Some(&otp)), Ok(Advance::Submit));
        assert_eq!(sequencer.current_index(), 2);
    }

    #[test]
    fn test_retreat_is_bounded_and_keeps_data() {
        let mut sequencer = create_test_sequencer();
        let mut fields = create_test_fields();
        assert!(!sequencer.retreat());

        fields.set_field(NAME, FieldValue::text("Asha"));
        sequencer.advance(&fields, None).unwrap();
        assert!(sequencer.retreat());
        assert_eq!(sequencer.current_index(), 0);
        assert_eq!(fields.text(NAME), "Asha");
        assert_eq!(sequencer.advance(&fields, None), Ok(Advance::Moved(1)));
    }

    #[test]
    fn test_index_stays_in_bounds_for_any_sequence() {
        let mut sequencer = create_test_sequencer();
        let mut fields = create_test_fields();
        fields.set_field(NAME, FieldValue::text("Asha"));
        fields.set_field(CODE, FieldValue::text("123456"));
        let otp = verified_otp();

        let moves = "fffffbbbbbfbfbffffbbbbbbbff";
        for step in moves.chars() {
            if step == 'f' {
                let _ = sequencer.advance(&fields, Some(&otp));
            } else {
                sequencer.retreat();
            }
            assert!(sequencer.current_index() <= sequencer.last_index());
        }
    }

    #[test]
    fn test_completed_is_terminal() {
        let mut sequencer = create_test_sequencer();
        let fields = create_test_fields();
        sequencer.mark_completed();
        assert_eq!(sequencer.advance(&fields, None), Err(FlowError::AlreadyCompleted));
        assert!(!sequencer.retreat());

        sequencer.restart();
        assert!(!sequencer.is_completed());
        assert_eq!(sequencer.current_index(), 0);
    }

    #[test]
    fn test_progress_markers() {
        let mut sequencer = create_test_sequencer();
        let mut fields = create_test_fields();
        fields.set_field(NAME, FieldValue::text("Asha"));
        sequencer.advance(&fields, None).unwrap();

        let view = sequencer.progress(&fields, None);
        let markers: Vec<_> = view.steps.iter().map(|s| s.marker).collect();
        assert_eq!(markers, vec![StepMarker::Done, StepMarker::Active, StepMarker::Upcoming]);
        assert!(view.steps[0].ready);
        assert!(!view.steps[1].ready);
        assert!(view.steps[2].ready);
        assert!((view.fraction() - 1.0 / 3.0).abs() < f64::EPSILON);
    }
}
