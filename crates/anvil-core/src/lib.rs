//! Core types and traits for the anvil task-execution engine.
//!
//! This crate provides the shared data model (execution context, phases, plans,
//! diagnoses, sub-agent graphs), error handling, configuration and the capability
//! traits through which the engine reaches its external collaborators.

/// Sub-agent graph types.
pub mod agents;
/// Context bundles.
pub mod bundle;
/// Capability trait definitions.
pub mod capability;
/// Engine configuration.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Task-level data model.
pub mod task;
/// Usage accounting and text helpers.
pub mod types;

pub use agents::{
    AgentRole, BudgetMode, MergeStrategy, ModelTier, SubAgentNode, SubAgentPlan, SubAgentResult,
};
pub use bundle::{ContextBundle, FileContent, ScopedBundle, ToolDescriptor};
pub use capability::{
    BuildRequest, Builder, Capabilities, CancellationOracle, CheckpointStore, ComplexityAssessment,
    ComplexityAssessor, ComplexityRequest, ConfidenceAssessment, ConfidenceAssessor,
    ConfidenceRequest, ContextSource, DiagnoseRequest, Diagnoser, KnowledgeBase, MergeCapability,
    Notifier, PlanRequest, Planner, PreviousAttempt, RecommendedAction, RepoLock, ReviseRequest,
    SandboxHandle, SandboxProvider, SubAgentRunner, TrackerEvent, ValidationReport, Validator,
};
pub use config::{
    ConfidenceConfig, EngineConfig, MIN_SUB_AGENT_COMPLEXITY, ModelCatalog, ModelSelectionMode,
    RetryConfig, ReviewConfig, SubAgentConfig,
};
pub use error::{EngineError, Result};
pub use task::{
    AttemptRecord, ChangedFile, Diagnosis, ExecutionContext, FailureReason, FileAction, FileSet,
    GeneratedFile, JobHandle, PauseDetails, PauseReason, Phase, Plan, PlanStep, RepoCoordinates,
    RetryContext, RootCause, StepAction, SuggestedAction, TaskFailure, TaskId, TaskOutcome,
    TaskPause, TaskSuccess,
};
pub use types::{Metered, Usage, estimate_tokens, truncate_chars};
