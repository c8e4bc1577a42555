//! Narrow interfaces to the engine's external collaborators.
//!
//! Every capability is an `async_trait` object so production implementations (model
//! providers, sandboxes, storage) and test doubles plug in the same way.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::agents::SubAgentNode;
use crate::bundle::{ContextBundle, FileContent, ToolDescriptor};
use crate::task::{
    Diagnosis, ExecutionContext, GeneratedFile, JobHandle, Phase, Plan, RepoCoordinates,
    RetryContext, TaskId,
};
use crate::{Metered, Result};

/// A failed attempt carried into a replanning call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousAttempt {
    /// Plan that failed
    pub plan_summary: String,
    /// Truncated validation output
    pub error: String,
    /// Diagnosis rendered for the prompt
    pub diagnosis: Option<Diagnosis>,
    /// Changed-file diffs since the attempt before
    pub changes: String,
}

/// Input to the planning capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRequest {
    /// Task text
    pub task: String,
    /// Project tree
    pub tree: String,
    /// Relevant files
    pub files: Vec<FileContent>,
    /// Memory snippets
    pub memories: Vec<String>,
    /// Documentation snippets
    pub docs: Vec<String>,
    /// Prior strategy that worked for similar tasks
    pub strategy_hint: Option<String>,
    /// Previous failed attempt
    pub previous_attempt: Option<PreviousAttempt>,
}

/// Input to the plan-revision capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviseRequest {
    /// Plan being replaced
    pub original_plan: Plan,
    /// Compressed description of the failure
    pub retry: RetryContext,
    /// Constraints the new plan must honour
    pub constraints: Vec<String>,
}

/// Input to the diagnosis capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnoseRequest {
    /// Task text
    pub task: String,
    /// Plan summary
    pub plan_summary: String,
    /// Validation output of the failed attempt
    pub error: String,
    /// Validation output of earlier attempts
    pub prior_errors: Vec<String>,
    /// Size-capped excerpt of the generated code
    pub code_excerpt: String,
    /// Error patterns known for this kind of task
    pub known_patterns: Vec<String>,
}

/// Input to the confidence capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceRequest {
    /// Task text
    pub task: String,
    /// Project tree
    pub tree: String,
    /// Relevant files
    pub files: Vec<FileContent>,
    /// Memory snippets
    pub memories: Vec<String>,
    /// Documentation snippets
    pub docs: Vec<String>,
}

/// What the confidence assessor recommends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecommendedAction {
    /// Go ahead
    Proceed,
    /// Split into subtasks first
    BreakDown,
    /// Ask the requester
    Clarify,
    /// Anything else
    Other(String),
}

impl From<String> for RecommendedAction {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "proceed" => Self::Proceed,
            "break_down" => Self::BreakDown,
            "clarify" => Self::Clarify,
            _ => Self::Other(tag),
        }
    }
}

impl From<RecommendedAction> for String {
    fn from(action: RecommendedAction) -> Self {
        match action {
            RecommendedAction::Proceed => "proceed".to_owned(),
            RecommendedAction::BreakDown => "break_down".to_owned(),
            RecommendedAction::Clarify => "clarify".to_owned(),
            RecommendedAction::Other(tag) => tag,
        }
    }
}

/// Structured confidence assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceAssessment {
    /// Overall confidence, 0-100
    pub overall: u8,
    /// Recommended next step
    pub recommended_action: RecommendedAction,
    /// Things the assessor is unsure about
    #[serde(default)]
    pub uncertainties: Vec<String>,
    /// Questions for the requester
    #[serde(default)]
    pub clarifying_questions: Vec<String>,
    /// Smaller tasks the work could be split into
    #[serde(default)]
    pub suggested_subtasks: Vec<String>,
}

/// Input to the complexity capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityRequest {
    /// Task text
    pub task: String,
    /// Head of the project tree
    pub tree_excerpt: String,
    /// Number of relevant files
    pub file_count: usize,
}

/// Complexity score from 1 (trivial) to 10 (hardest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityAssessment {
    /// Score, 1-10
    pub score: u8,
    /// Why
    pub reasoning: String,
}

/// Handle to an allocated build sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SandboxHandle {
    /// Sandbox identifier
    pub id: String,
}

impl SandboxHandle {
    /// Creates a handle.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Input to the build capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Task text, possibly enriched with sub-agent output
    pub task: String,
    /// Plan to execute
    pub plan: Plan,
    /// Sandbox to build in
    pub sandbox: SandboxHandle,
    /// Model to build with
    pub model: Option<String>,
    /// Known error patterns to avoid
    pub known_patterns: Vec<String>,
    /// Tools available to the builder
    pub tools: Vec<ToolDescriptor>,
}

/// Result of validating a sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether validation passed
    pub success: bool,
    /// Combined validation output
    pub output: String,
}

/// Event pushed to the external issue tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackerEvent {
    /// Confidence too low, questions attached
    NeedsClarification {
        /// Questions for the requester
        questions: Vec<String>,
    },
    /// The task should be split
    NeedsBreakdown {
        /// Suggested subtasks
        subtasks: Vec<String>,
    },
    /// The task was diagnosed as impossible
    Blocked {
        /// Diagnoser's explanation
        reason: String,
    },
    /// The task failed after exhausting retries
    Failed {
        /// Display-truncated error
        message: String,
    },
    /// The task completed
    Completed {
        /// Number of changed files
        files_changed: usize,
    },
}

/// Produces and revises plans.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Produces a plan for a task.
    async fn plan(&self, request: PlanRequest) -> Result<Metered<Plan>>;

    /// Revises a plan after a `bad_plan` diagnosis.
    async fn revise(&self, request: ReviseRequest) -> Result<Metered<Plan>>;
}

/// Classifies validation failures.
#[async_trait]
pub trait Diagnoser: Send + Sync {
    /// Diagnoses a failed attempt.
    async fn diagnose(&self, request: DiagnoseRequest) -> Result<Metered<Diagnosis>>;
}

/// Assesses whether a task is understood well enough to attempt.
#[async_trait]
pub trait ConfidenceAssessor: Send + Sync {
    /// Assesses confidence.
    async fn assess(&self, request: ConfidenceRequest) -> Result<Metered<ConfidenceAssessment>>;
}

/// Scores task complexity for model routing.
#[async_trait]
pub trait ComplexityAssessor: Send + Sync {
    /// Scores complexity.
    async fn assess_complexity(&self, request: ComplexityRequest)
    -> Result<ComplexityAssessment>;
}

/// Generates code for a plan inside a sandbox.
#[async_trait]
pub trait Builder: Send + Sync {
    /// Executes a plan and returns the files it produced.
    async fn build(&self, request: BuildRequest) -> Result<Metered<Vec<GeneratedFile>>>;
}

/// Validates a sandbox (build, lint, test).
#[async_trait]
pub trait Validator: Send + Sync {
    /// Runs validation.
    async fn validate(&self, sandbox: &SandboxHandle) -> Result<ValidationReport>;
}

/// Allocates build sandboxes.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    /// Creates a sandbox for a repository.
    async fn create(&self, repo: &RepoCoordinates) -> Result<SandboxHandle>;

    /// Destroys a sandbox.
    async fn destroy(&self, sandbox: &SandboxHandle) -> Result<()>;
}

/// Answers whether the operator cancelled a task.
#[async_trait]
pub trait CancellationOracle: Send + Sync {
    /// Whether the task has been cancelled.
    async fn is_cancelled(&self, task_id: TaskId) -> Result<bool>;
}

/// Persists job checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Writes a checkpoint.
    async fn write(
        &self,
        job: &JobHandle,
        phase: Phase,
        snapshot: JsonValue,
        cost_delta: Option<f64>,
    ) -> Result<()>;
}

/// Non-blocking advisory lock over a repository.
#[async_trait]
pub trait RepoLock: Send + Sync {
    /// Tries to take the lock; `false` when another task holds it.
    async fn try_acquire(&self, owner: &str, name: &str) -> Result<bool>;

    /// Releases the lock.
    async fn release(&self, owner: &str, name: &str) -> Result<()>;
}

/// Long-term memory lookups.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Searches memory snippets relevant to a query.
    async fn search_memories(&self, repo: &RepoCoordinates, query: &str) -> Result<Vec<String>>;

    /// Error patterns previously seen for similar tasks.
    async fn error_patterns(&self, task: &str) -> Result<Vec<String>>;

    /// A strategy that worked for similar tasks.
    async fn strategy_hint(&self, task: &str) -> Result<Option<String>>;
}

/// Pushes events to the external issue tracker.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends an event for a tracked task.
    async fn notify(&self, tracker_id: &str, event: TrackerEvent) -> Result<()>;
}

/// Gathers the context bundle for a task.
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// Builds the bundle.
    async fn gather(&self, ctx: &ExecutionContext) -> Result<ContextBundle>;
}

/// Runs a single sub-agent node.
#[async_trait]
pub trait SubAgentRunner: Send + Sync {
    /// Executes the node and returns its output.
    async fn run(&self, node: &SubAgentNode) -> Result<Metered<String>>;
}

/// Combines sub-agent output with a cheap model.
#[async_trait]
pub trait MergeCapability: Send + Sync {
    /// Merges `prompt` using `model`.
    async fn merge(&self, model: &str, prompt: &str) -> Result<Metered<String>>;
}

/// All collaborators the engine talks to.
#[derive(Clone)]
pub struct Capabilities {
    /// Planning
    pub planner: Arc<dyn Planner>,
    /// Diagnosis
    pub diagnoser: Arc<dyn Diagnoser>,
    /// Confidence assessment
    pub confidence: Arc<dyn ConfidenceAssessor>,
    /// Complexity assessment
    pub complexity: Arc<dyn ComplexityAssessor>,
    /// Code generation
    pub builder: Arc<dyn Builder>,
    /// Validation
    pub validator: Arc<dyn Validator>,
    /// Sandboxes
    pub sandboxes: Arc<dyn SandboxProvider>,
    /// Cancellation
    pub cancellation: Arc<dyn CancellationOracle>,
    /// Context gathering
    pub context: Arc<dyn ContextSource>,
    /// Sub-agent execution
    pub sub_agents: Arc<dyn SubAgentRunner>,
    /// Sub-agent merging
    pub merger: Arc<dyn MergeCapability>,
    /// Checkpoints, optional
    pub checkpoints: Option<Arc<dyn CheckpointStore>>,
    /// Repository lock, optional
    pub repo_lock: Option<Arc<dyn RepoLock>>,
    /// Memory lookups, optional
    pub knowledge: Option<Arc<dyn KnowledgeBase>>,
    /// Tracker notifications, optional
    pub notifier: Option<Arc<dyn Notifier>>,
}
