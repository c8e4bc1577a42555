//! Task-level data model: execution context, phases, plans and diagnoses.

/// Single-owner execution record
pub mod context;
/// Failure diagnosis types
pub mod diagnosis;
/// Typed task outcomes
pub mod outcome;
/// Top-level phase enum
pub mod phase;
/// Plans and generated files
pub mod plan;
/// Compressed retry payload
pub mod retry;

pub use context::{AttemptRecord, ExecutionContext, JobHandle, RepoCoordinates, TaskId};
pub use diagnosis::{Diagnosis, RootCause, SuggestedAction};
pub use outcome::{
    FailureReason, PauseDetails, PauseReason, TaskFailure, TaskOutcome, TaskPause, TaskSuccess,
};
pub use phase::Phase;
pub use plan::{FileAction, FileSet, GeneratedFile, Plan, PlanStep, StepAction};
pub use retry::{ChangedFile, RetryContext};
