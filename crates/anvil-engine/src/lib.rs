//! Autonomous task-execution engine.
//!
//! Takes a task against a repository and drives it through context gathering, a
//! confidence gate, planning, and a bounded build/validate/diagnose loop until the
//! change set validates, the task pauses for input, or the attempt budget runs out.
//!
//! External collaborators (models, sandboxes, storage, trackers) are reached only through
//! the capability traits in [`anvil_core::capability`].

/// Confidence gate and model routing.
pub mod confidence;
/// Retry-context compression.
pub mod delta;
/// Best-effort side effects.
pub mod effects;
/// Top-level task flow.
pub mod engine;
/// Tracing subscriber setup.
pub mod logging;
/// Complexity tiers and role tables.
pub mod models;
/// Phase-scoped context views.
pub mod profiler;
/// Retry/diagnosis loop.
pub mod retry;
/// Sub-agent fan-out.
pub mod subagents;

pub use confidence::{ConfidenceRouter, RouteDecision, RouteOptions};
pub use delta::{compute_retry_context, compute_simple_diff};
pub use engine::{TaskEngine, TaskRequest};
pub use logging::{DEFAULT_FILTER, init_file_logging, init_logging};
pub use models::{TierRegistry, role_tier};
pub use profiler::{PhaseProfile, filter_for_phase, profile_for};
pub use retry::{ExecuteOptions, PlanExecution, PlanExecutor, RetryStrategy};
pub use subagents::{SubAgentScheduler, concatenate_results, plan_sub_agents};
