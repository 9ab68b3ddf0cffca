/// Where a step sits relative to the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMarker {
    Done,
    Active,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepProgress {
    pub id: usize,
    pub title: &'static str,
    pub marker: StepMarker,
    /// The step's gate would currently let the user through.
    pub ready: bool,
}

/// Derived, display-only snapshot of a form's position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    pub current: usize,
    pub completed: bool,
    pub steps: Vec<StepProgress>,
}

impl ProgressView {
    pub fn total(&self) -> usize {
        self.steps.len()
    }

    /// Share of steps left behind, `1.0` once the form is completed.
    pub fn fraction(&self) -> f64 {
        if self.completed {
            return 1.0;
        }
        if self.steps.is_empty() {
            return 0.0;
        }
        self.current as f64 / self.steps.len() as f64
    }

    /// "Step 2 of 4" style label.
    pub fn label(&self) -> String {
        if self.completed {
            return "Completed".to_string();
        }
        format!("Step {} of {}", self.current + 1, self.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(current: usize, completed: bool) -> ProgressView {
        let steps = ["Account Setup", "Verify", "Confirm Role", "Profile"]
            .into_iter()
            .enumerate()
            .map(|(id, title)| StepProgress {
                id,
                title,
                marker: StepMarker::Upcoming,
                ready: false,
            })
            .collect();
        ProgressView { current, completed, steps }
    }

    #[test]
    fn test_fraction_and_label() {
        assert_eq!(view(0, false).fraction(), 0.0);
        assert_eq!(view(2, false).fraction(), 0.5);
        assert_eq!(view(3, true).fraction(), 1.0);
        assert_eq!(view(1, false).label(), "Step 2 of 4");
        assert_eq!(view(3, true).label(), "Completed");
    }
}
