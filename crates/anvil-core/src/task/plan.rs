use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a plan step does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Create a new file
    CreateFile,
    /// Modify an existing file
    ModifyFile,
    /// Delete a file
    DeleteFile,
    /// Run a shell command
    RunCommand,
}

/// A single step of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Human readable description
    pub description: String,
    /// Kind of action
    pub action: StepAction,
    /// Target path for file actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Proposed content for file actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Command for `run_command`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl PlanStep {
    /// Creates a step without path, content or command.
    pub fn new(description: impl Into<String>, action: StepAction) -> Self {
        Self {
            description: description.into(),
            action,
            path: None,
            content: None,
            command: None,
        }
    }

    /// Sets the target path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the command.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }
}

/// Ordered list of steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Steps in execution order
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Creates a plan from steps.
    #[must_use]
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the plan has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Numbered one-line-per-step rendering.
    #[must_use]
    pub fn summary(&self) -> String {
        self.steps
            .iter()
            .enumerate()
            .map(|(index, step)| match &step.path {
                Some(path) => format!("{}. {} ({path})", index + 1, step.description),
                None => format!("{}. {}", index + 1, step.description),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// How a generated file relates to the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    /// New file
    Create,
    /// Changed file
    Modify,
    /// Removed file
    Delete,
}

/// A file produced by the build capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    /// Repository-relative path
    pub path: String,
    /// Full content after the change
    pub content: String,
    /// Kind of change
    pub action: FileAction,
}

impl GeneratedFile {
    /// Creates a generated file.
    pub fn new(path: impl Into<String>, content: impl Into<String>, action: FileAction) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            action,
        }
    }
}

/// Files accumulated across build attempts: insertion ordered, replaced by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSet {
    files: Vec<GeneratedFile>,
}

impl FileSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds files, replacing any earlier entry with the same path in place.
    pub fn extend(&mut self, files: impl IntoIterator<Item = GeneratedFile>) {
        for file in files {
            if let Some(existing) = self.files.iter_mut().find(|entry| entry.path == file.path) {
                *existing = file;
            } else {
                self.files.push(file);
            }
        }
    }

    /// Drops every accumulated file.
    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files in insertion order.
    #[must_use]
    pub fn files(&self) -> &[GeneratedFile] {
        &self.files
    }

    /// Path → content view used for delta snapshots.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.files
            .iter()
            .map(|file| (file.path.clone(), file.content.clone()))
            .collect()
    }

    /// Consumes the set.
    #[must_use]
    pub fn into_files(self) -> Vec<GeneratedFile> {
        self.files
    }
}
