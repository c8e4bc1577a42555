use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use super::diagnosis::RootCause;
use super::phase::Phase;
use crate::{EngineError, Result, Usage};

/// Unique identifier for a task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generates a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TaskId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        write!(formatter, "{}", self.0)
    }
}

/// Where the task's code lives.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepoCoordinates {
    /// Repository owner or organisation
    pub owner: String,
    /// Repository name
    pub name: String,
    /// Branch the task works against
    pub branch: Option<String>,
}

impl RepoCoordinates {
    /// Creates coordinates for the default branch.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            branch: None,
        }
    }

    /// Sets the branch.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }
}

impl Display for RepoCoordinates {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        write!(formatter, "{}/{}", self.owner, self.name)
    }
}

/// Handle to an externally persisted job record used for checkpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle(pub String);

/// One failed build attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt number
    pub attempt: u32,
    /// Validation output of the failed attempt
    pub error: String,
    /// Diagnosed root cause, when a diagnosis ran
    pub root_cause: Option<RootCause>,
}

/// Mutable, single-owner record for one task attempt.
///
/// Created at task start, threaded through the flow as `&mut`, discarded at the
/// terminal phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Task identifier
    pub task_id: TaskId,
    /// Conversation the task belongs to
    pub conversation_id: String,
    /// External issue tracker identifier
    pub tracker_id: Option<String>,
    /// Repository coordinates
    pub repo: RepoCoordinates,
    /// Free-text task description
    pub description: String,
    /// Model selected for execution
    pub model: Option<String>,
    /// Running cost in USD
    pub cost_usd: f64,
    /// Running token total
    pub tokens: u64,
    /// Build attempts consumed
    pub total_attempts: u32,
    /// Build attempt budget
    pub max_attempts: u32,
    /// Plan revisions consumed
    pub plan_revisions: u32,
    /// Plan revision budget
    pub max_plan_revisions: u32,
    /// Failed attempts so far
    pub attempt_history: Vec<AttemptRecord>,
    /// Known error patterns for this kind of task
    pub error_patterns: Vec<String>,
    /// Current phase
    pub phase: Phase,
    /// Checkpoint handle
    pub job: Option<JobHandle>,
}

impl ExecutionContext {
    /// Creates a context in the `preparing` phase.
    pub fn new(repo: RepoCoordinates, description: impl Into<String>) -> Self {
        Self {
            task_id: TaskId::new(),
            conversation_id: Uuid::new_v4().to_string(),
            tracker_id: None,
            repo,
            description: description.into(),
            model: None,
            cost_usd: 0.0,
            tokens: 0,
            total_attempts: 0,
            max_attempts: 3,
            plan_revisions: 0,
            max_plan_revisions: 2,
            attempt_history: Vec::new(),
            error_patterns: Vec::new(),
            phase: Phase::Preparing,
            job: None,
        }
    }

    /// Sets the attempt and plan-revision budgets.
    #[must_use]
    pub fn with_budgets(mut self, max_attempts: u32, max_plan_revisions: u32) -> Self {
        self.max_attempts = max_attempts;
        self.max_plan_revisions = max_plan_revisions;
        self
    }

    /// Sets the tracker identifier.
    #[must_use]
    pub fn with_tracker(mut self, tracker_id: impl Into<String>) -> Self {
        self.tracker_id = Some(tracker_id.into());
        self
    }

    /// Sets the checkpoint job handle.
    #[must_use]
    pub fn with_job(mut self, job: JobHandle) -> Self {
        self.job = Some(job);
        self
    }

    /// Adds capability usage to the running totals.
    pub fn record_usage(&mut self, usage: Usage) {
        self.cost_usd += usage.cost_usd;
        self.tokens += usage.tokens;
    }

    /// Moves to `next`, refusing to revisit a phase or leave a terminal one.
    ///
    /// # Errors
    /// Returns `InvalidTransition` when the move is not monotonic.
    pub fn advance(&mut self, next: Phase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            return Err(EngineError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::info!(task = %self.task_id, from = %self.phase, to = %next, "phase change");
        self.phase = next;
        Ok(())
    }

    /// Whether another build attempt fits in the budget.
    #[must_use]
    pub fn has_attempts_left(&self) -> bool {
        self.total_attempts < self.max_attempts
    }

    /// Whether another `bad_plan` revision fits in the budget.
    #[must_use]
    pub fn can_revise_plan(&self) -> bool {
        self.plan_revisions < self.max_plan_revisions
    }
}
