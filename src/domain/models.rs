use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identifier of a single form field.
///
/// Field names are fixed at compile time by the form definitions, so the
/// identifier is a thin `Copy` wrapper around a static string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FieldId(&'static str);

impl FieldId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Current content of a field.
///
/// A `Choice` is a single selection out of a known option list; it behaves like
/// text everywhere except that the presentation layer cycles it instead of typing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FieldValue {
    #[default]
    Empty,
    Text(String),
    Choice(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn choice(value: impl Into<String>) -> Self {
        FieldValue::Choice(value.into())
    }

    /// Raw content, or `""` for an empty field.
    pub fn as_str(&self) -> &str {
        match self {
            FieldValue::Empty => "",
            FieldValue::Text(s) | FieldValue::Choice(s) => s,
        }
    }

    /// True when nothing but whitespace has been entered.
    pub fn is_blank(&self) -> bool {
        self.as_str().trim().is_empty()
    }
}

/// What has to hold, beyond field validity, before leaving a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepGate {
    /// Only the step's required fields are checked.
    Fields,
    /// The step's OTP challenge must also be `Verified`.
    Otp,
}

/// One gated stage of a form.
///
/// Fields are kept in display order; the required subset is what the advance
/// gate checks.
///
/// # Examples
///
/// ```
/// use formstage::domain::{FieldId, Step};
///
/// const NAME: FieldId = FieldId::new("name");
/// const COMPANY: FieldId = FieldId::new("company");
///
/// let step = Step::new(1, "Your details").required(NAME).optional(COMPANY);
/// assert_eq!(step.fields(), &[NAME, COMPANY]);
/// assert!(step.is_required(NAME));
/// assert!(!step.is_required(COMPANY));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub id: usize,
    pub title: &'static str,
    fields: Vec<FieldId>,
    required: BTreeSet<FieldId>,
    pub gate: StepGate,
}

impl Step {
    pub fn new(id: usize, title: &'static str) -> Self {
        Self {
            id,
            title,
            fields: Vec::new(),
            required: BTreeSet::new(),
            gate: StepGate::Fields,
        }
    }

    pub fn required(mut self, field: FieldId) -> Self {
        self.push(field);
        self.required.insert(field);
        self
    }

    pub fn optional(mut self, field: FieldId) -> Self {
        self.push(field);
        self.required.remove(&field);
        self
    }

    pub fn otp_gated(mut self) -> Self {
        self.gate = StepGate::Otp;
        self
    }

    fn push(&mut self, field: FieldId) {
        if !self.fields.contains(&field) {
            self.fields.push(field);
        }
    }

    /// All fields of the step in display order.
    pub fn fields(&self) -> &[FieldId] {
        &self.fields
    }

    /// Required fields in display order.
    pub fn required_fields(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.fields.iter().copied().filter(|f| self.required.contains(f))
    }

    pub fn optional_fields(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.fields.iter().copied().filter(|f| !self.required.contains(f))
    }

    pub fn is_required(&self, field: FieldId) -> bool {
        self.required.contains(&field)
    }
}
