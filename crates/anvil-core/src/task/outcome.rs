use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use super::plan::GeneratedFile;

/// Why a task stopped short of completion without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    /// Confidence assessment came back below the proceed threshold
    LowConfidence,
    /// The task should be split before it is attempted
    NeedsBreakdown,
    /// Manual model selection is configured and no model was given
    NeedsModelSelection,
    /// The change set waits for human review
    PendingReview,
    /// The operator cancelled the task
    Stopped,
}

impl PauseReason {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LowConfidence => "low_confidence",
            Self::NeedsBreakdown => "needs_breakdown",
            Self::NeedsModelSelection => "needs_model_selection",
            Self::PendingReview => "pending_review",
            Self::Stopped => "stopped",
        }
    }
}

impl Display for PauseReason {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter.write_str(self.as_str())
    }
}

/// Structured detail a caller needs to resubmit or force-continue a paused task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PauseDetails {
    /// Human readable summary
    pub message: String,
    /// Assessed confidence, when an assessment ran
    pub confidence: Option<u8>,
    /// Things the assessor was unsure about
    pub uncertainties: Vec<String>,
    /// Questions to put to the requester
    pub clarifying_questions: Vec<String>,
    /// Suggested smaller tasks
    pub suggested_subtasks: Vec<String>,
}

/// A paused task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPause {
    /// Pause classification
    pub reason: PauseReason,
    /// Detail for the caller
    pub details: PauseDetails,
    /// Files produced before the pause
    pub files: Vec<GeneratedFile>,
    /// Sandbox holding the work, if one was allocated
    pub sandbox_id: Option<String>,
}

impl TaskPause {
    /// Creates a pause with a message and no files.
    pub fn new(reason: PauseReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            details: PauseDetails {
                message: message.into(),
                ..PauseDetails::default()
            },
            files: Vec::new(),
            sandbox_id: None,
        }
    }
}

/// Classified terminal failure kinds returned as values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Diagnosed as unrecoverable
    ImpossibleTask,
}

impl FailureReason {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ImpossibleTask => "impossible_task",
        }
    }
}

/// A classified terminal failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// Failure classification
    pub reason: FailureReason,
    /// Machine readable message, `"impossible_task"` for diagnosed impossibility
    pub error_message: String,
    /// Diagnoser's explanation
    pub detail: Option<String>,
}

impl TaskFailure {
    /// The `impossible_task` failure.
    #[must_use]
    pub fn impossible(detail: Option<String>) -> Self {
        Self {
            reason: FailureReason::ImpossibleTask,
            error_message: FailureReason::ImpossibleTask.as_str().to_owned(),
            detail,
        }
    }
}

/// Successful task result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSuccess {
    /// Files changed by the task
    pub files: Vec<GeneratedFile>,
    /// Total cost in USD
    pub cost_usd: f64,
    /// Total tokens
    pub tokens: u64,
    /// Sandbox holding the validated change set
    pub sandbox_id: Option<String>,
    /// Summary of the final plan
    pub plan_summary: String,
    /// Model that executed the task
    pub model: Option<String>,
    /// Score reported by the confidence router
    pub confidence_score: u8,
}

/// What the engine hands back for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The task finished and validated
    Completed(TaskSuccess),
    /// The task paused and can be resumed
    Paused(TaskPause),
    /// The task failed in a classified way
    Failed(TaskFailure),
}

impl TaskOutcome {
    /// Pause reason, if the outcome is a pause.
    #[must_use]
    pub fn pause_reason(&self) -> Option<PauseReason> {
        match self {
            Self::Paused(pause) => Some(pause.reason),
            Self::Completed(_) | Self::Failed(_) => None,
        }
    }

    /// Whether the outcome is a completion.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}
