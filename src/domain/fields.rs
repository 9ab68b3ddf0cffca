//! Field values and per-field validity for one form instance.
//!
//! Every field is registered with a [`Validator`]; writing a value recomputes
//! that field's validity and nothing else. Invalid input is never an error at
//! write time, only a state that the advance gate later consults.

use super::errors::FieldIssue;
use super::models::{FieldId, FieldValue, Step};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[0-9][0-9 ()-]{5,18}[0-9]$").expect("phone pattern is valid")
});

static EMPTY: FieldValue = FieldValue::Empty;

/// Strips the formatting a user may type into a one-time code.
///
/// Whitespace and dashes are dropped; everything else is kept so the digit
/// check stays exact.
pub fn normalize_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Rule that decides whether a single field's value is acceptable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validator {
    /// Anything, including nothing.
    Any,
    /// At least one non-whitespace character.
    NonEmpty,
    Email,
    Phone,
    /// Exactly this many ASCII digits once formatting is stripped.
    Digits(usize),
    /// One of a fixed list of options.
    OneOf(Vec<String>),
}

impl Validator {
    pub fn check(&self, value: &FieldValue) -> Result<(), FieldIssue> {
        if matches!(self, Validator::Any) {
            return Ok(());
        }
        if value.is_blank() {
            return Err(FieldIssue::Missing);
        }

        let raw = value.as_str().trim();
        match self {
            Validator::Any | Validator::NonEmpty => Ok(()),
            Validator::Email => {
                if EMAIL.is_match(raw) {
                    Ok(())
                } else {
                    Err(FieldIssue::Malformed("enter a valid email address"))
                }
            }
            Validator::Phone => {
                let digits = raw.chars().filter(|c| c.is_ascii_digit()).count();
                if PHONE.is_match(raw) && (7..=15).contains(&digits) {
                    Ok(())
                } else {
                    Err(FieldIssue::Malformed("enter a valid phone number"))
                }
            }
            Validator::Digits(len) => {
                let code = normalize_code(raw);
                if code.len() == *len && code.chars().all(|c| c.is_ascii_digit()) {
                    Ok(())
                } else {
                    Err(FieldIssue::Malformed("enter the full numeric code"))
                }
            }
            Validator::OneOf(options) => {
                if options.iter().any(|o| o == raw) {
                    Ok(())
                } else {
                    Err(FieldIssue::Malformed("pick one of the listed options"))
                }
            }
        }
    }

    /// Options offered by a choice field, if this is one.
    pub fn options(&self) -> Option<&[String]> {
        match self {
            Validator::OneOf(options) => Some(options),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct FieldEntry {
    value: FieldValue,
    validator: Validator,
    issue: Option<FieldIssue>,
}

impl FieldEntry {
    fn new(validator: Validator) -> Self {
        let mut entry = Self {
            value: FieldValue::Empty,
            validator,
            issue: None,
        };
        entry.revalidate();
        entry
    }

    fn revalidate(&mut self) {
        self.issue = self.validator.check(&self.value).err();
    }
}

/// Arena of field values keyed by [`FieldId`].
///
/// # Examples
///
/// ```
/// use formstage::domain::{FieldId, FieldStore, FieldValue, Validator};
///
/// const EMAIL: FieldId = FieldId::new("email");
///
/// let mut store = FieldStore::new();
/// store.register(EMAIL, Validator::Email);
/// assert!(!store.is_valid(EMAIL));
///
/// store.set_field(EMAIL, FieldValue::text("you@company.com"));
/// assert!(store.is_valid(EMAIL));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldStore {
    entries: HashMap<FieldId, FieldEntry>,
}

impl FieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a field and the rule it is checked against.
    ///
    /// Re-registering an existing field keeps its value and revalidates it.
    pub fn register(&mut self, id: FieldId, validator: Validator) {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.validator = validator;
                entry.revalidate();
            }
            None => {
                self.entries.insert(id, FieldEntry::new(validator));
            }
        }
    }

    pub fn with(mut self, id: FieldId, validator: Validator) -> Self {
        self.register(id, validator);
        self
    }

    /// Overwrites one field and recomputes its validity.
    ///
    /// Fields that were never registered accept anything.
    pub fn set_field(&mut self, id: FieldId, value: FieldValue) {
        let entry = self
            .entries
            .entry(id)
            .or_insert_with(|| FieldEntry::new(Validator::Any));
        entry.value = value;
        entry.revalidate();
    }

    pub fn clear_field(&mut self, id: FieldId) {
        self.set_field(id, FieldValue::Empty);
    }

    /// Empties every value while keeping the registered validators.
    pub fn clear(&mut self) {
        for entry in self.entries.values_mut() {
            entry.value = FieldValue::Empty;
            entry.revalidate();
        }
    }

    pub fn value(&self, id: FieldId) -> &FieldValue {
        self.entries.get(&id).map(|e| &e.value).unwrap_or(&EMPTY)
    }

    /// Trimmed text content of a field.
    pub fn text(&self, id: FieldId) -> &str {
        self.value(id).as_str().trim()
    }

    pub fn validator(&self, id: FieldId) -> Option<&Validator> {
        self.entries.get(&id).map(|e| &e.validator)
    }

    pub fn issue(&self, id: FieldId) -> Option<&FieldIssue> {
        match self.entries.get(&id) {
            Some(entry) => entry.issue.as_ref(),
            None => Some(&FieldIssue::Missing),
        }
    }

    pub fn is_valid(&self, id: FieldId) -> bool {
        self.issue(id).is_none()
    }

    /// True iff every required field of `step` is present and valid.
    pub fn is_step_valid(&self, step: &Step) -> bool {
        self.first_unmet(step).is_none()
    }

    /// The first required field of `step`, in display order, that blocks it.
    pub fn first_unmet(&self, step: &Step) -> Option<(FieldId, FieldIssue)> {
        step.required_fields()
            .find_map(|id| self.issue(id).map(|issue| (id, issue.clone())))
    }
}
