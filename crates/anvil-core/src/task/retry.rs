use serde::{Deserialize, Serialize};

use super::diagnosis::Diagnosis;

/// A file that changed since the previous attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    /// Repository-relative path
    pub path: String,
    /// Compact line diff, or a `[NEW FILE]` marker followed by the head of the content
    pub diff: String,
}

/// Minimal payload describing a failed attempt, fed into the next planning call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryContext {
    /// Task description, at most 200 characters
    pub task_summary: String,
    /// Summary of the plan that failed
    pub plan_summary: String,
    /// Validation output, at most 1000 characters
    pub last_error: String,
    /// Diagnosis of the failure
    pub diagnosis: Diagnosis,
    /// Attempt number that failed
    pub attempt: u32,
    /// Files that differ from the previous snapshot
    pub changed_files: Vec<ChangedFile>,
    /// Estimated token size of the payload
    pub estimated_tokens: usize,
}

impl RetryContext {
    /// Renders the changed files as a prompt section.
    #[must_use]
    pub fn render_changes(&self) -> String {
        self.changed_files
            .iter()
            .map(|file| format!("### {}\n{}", file.path, file.diff))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
