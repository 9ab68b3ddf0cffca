//! Mapping from an upstream choice to the options offered downstream.

use super::fields::{FieldStore, Validator};
use super::models::{FieldId, FieldValue};

/// Static table from a choice (e.g. a contact role) to its ordered options.
///
/// # Examples
///
/// ```
/// use formstage::domain::BranchResolver;
///
/// let resolver = BranchResolver::new([
///     ("seeker", vec!["Hiring guidance", "Other"]),
///     ("other", vec!["Careers", "Other"]),
/// ]);
/// assert_eq!(resolver.resolve("other"), ["Careers", "Other"]);
/// assert!(resolver.resolve("unknown").is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchResolver {
    table: Vec<(String, Vec<String>)>,
}

impl BranchResolver {
    pub fn new<I, K, O, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, O)>,
        K: Into<String>,
        O: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let table: Vec<(String, Vec<String>)> = entries
            .into_iter()
            .map(|(choice, options)| (choice.into(), options.into_iter().map(Into::into).collect()))
            .collect();
        Self { table }
    }

    /// Options for `choice`, in table order. Unknown or empty choices yield nothing.
    pub fn resolve(&self, choice: &str) -> &[String] {
        self.table
            .iter()
            .find(|(key, _)| key == choice)
            .map(|(_, options)| options.as_slice())
            .unwrap_or(&[])
    }

    /// The choices the table knows about, in table order.
    pub fn choices(&self) -> impl Iterator<Item = &str> {
        self.table.iter().map(|(key, _)| key.as_str())
    }

    pub fn contains(&self, choice: &str, option: &str) -> bool {
        self.resolve(choice).iter().any(|o| o == option)
    }
}

/// Ties a choice field to the derived field whose options it determines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchBinding {
    pub choice: FieldId,
    pub derived: FieldId,
    pub resolver: BranchResolver,
}

impl BranchBinding {
    pub fn new(choice: FieldId, derived: FieldId, resolver: BranchResolver) -> Self {
        Self {
            choice,
            derived,
            resolver,
        }
    }

    /// Brings the derived field in line with the current choice.
    ///
    /// The derived field's validator becomes the freshly resolved option list,
    /// and a previous selection that is not in that list is cleared. Returns
    /// true when a selection was dropped.
    pub fn reconcile(&self, fields: &mut FieldStore) -> bool {
        let options = self.resolver.resolve(fields.text(self.choice)).to_vec();
        let selected = fields.text(self.derived).to_string();
        let stale = !selected.is_empty() && !options.contains(&selected);

        fields.register(self.derived, Validator::OneOf(options));
        if stale {
            tracing::debug!(field = %self.derived, %selected, "dropping selection outside new branch");
            fields.set_field(self.derived, FieldValue::Empty);
        }
        stale
    }

    pub fn options<'a>(&'a self, fields: &FieldStore) -> &'a [String] {
        self.resolver.resolve(fields.text(self.choice))
    }
}
