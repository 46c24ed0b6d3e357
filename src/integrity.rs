use crate::project::Project;

/// Goal placeholders that signal an arbitrary or unset funding target.
const GOAL_PLACEHOLDER_MARKERS: &[&str] = &["arbitrary"];
/// Summary phrases that signal vague or unverified claims.
const SUMMARY_VAGUENESS_MARKERS: &[&str] = &["vague"];

/// Flags low-integrity records before they reach the scoring engine.
#[derive(Debug, Clone)]
pub struct IntegrityFilter {
    goal_markers: Vec<String>,
    summary_markers: Vec<String>,
}

impl Default for IntegrityFilter {
    fn default() -> Self {
        Self::new(GOAL_PLACEHOLDER_MARKERS, SUMMARY_VAGUENESS_MARKERS)
    }
}

impl IntegrityFilter {
    pub fn new(goal_markers: &[&str], summary_markers: &[&str]) -> Self {
        IntegrityFilter {
            goal_markers: goal_markers.iter().map(|m| m.to_lowercase()).collect(),
            summary_markers: summary_markers.iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    pub fn flagged(&self, project: &Project) -> bool {
        let placeholder_goal = project.goal_note.as_deref().is_some_and(|note| {
            let note = note.to_lowercase();
            self.goal_markers.iter().any(|m| note.contains(m.as_str()))
        });
        if placeholder_goal {
            return true;
        }

        let summary = project.summary.to_lowercase();
        self.summary_markers
            .iter()
            .any(|m| summary.contains(m.as_str()))
    }

    /// Zero out `raised` on flagged records. Returns whether the record was flagged.
    ///
    /// Safe to call more than once: a zeroed record stays zeroed.
    pub fn apply(&self, project: &mut Project) -> bool {
        if !self.flagged(project) {
            return false;
        }
        tracing::warn!(title = %project.title, "questionable data quality, ignoring funds raised");
        project.raised = 0.0;
        true
    }
}
