use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Top-level stage of a task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Task accepted, nothing gathered yet
    #[default]
    Preparing,
    /// Gathering the context bundle
    Context,
    /// Confidence assessment and model routing
    Confidence,
    /// Producing the initial plan
    Planning,
    /// Build / validate / diagnose loop
    Building,
    /// Post-build review
    Reviewing,
    /// Waiting for a human to approve the change set
    PendingReview,
    /// Paused waiting for clarification, breakdown or a model choice
    NeedsInput,
    /// Finished successfully
    Completed,
    /// Cancelled by the operator
    Stopped,
    /// Finished unsuccessfully
    Failed,
}

impl Phase {
    /// Position of a working phase in the pipeline; `None` for resting phases.
    const fn rank(self) -> Option<u8> {
        match self {
            Self::Preparing => Some(0),
            Self::Context => Some(1),
            Self::Confidence => Some(2),
            Self::Planning => Some(3),
            Self::Building => Some(4),
            Self::Reviewing => Some(5),
            Self::PendingReview
            | Self::NeedsInput
            | Self::Completed
            | Self::Stopped
            | Self::Failed => None,
        }
    }

    /// Whether the task flow ends in this phase.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.rank().is_none()
    }

    /// Whether moving from `self` to `next` keeps the phase sequence monotonic.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        match (self.rank(), next.rank()) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(current), Some(target)) => target > current,
        }
    }

    /// Wire name of the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::Context => "context",
            Self::Confidence => "confidence",
            Self::Planning => "planning",
            Self::Building => "building",
            Self::Reviewing => "reviewing",
            Self::PendingReview => "pending_review",
            Self::NeedsInput => "needs_input",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter.write_str(self.as_str())
    }
}
