//! Plan, build, validate and diagnose until the change set validates.
//!
//! Every failed validation is diagnosed and the root cause picks a [`RetryStrategy`].
//! Build attempts share one budget across strategies; plan revisions have their own,
//! smaller budget.

use anvil_core::{
    AttemptRecord, BudgetMode, BuildRequest, Capabilities, DiagnoseRequest, Diagnosis,
    EngineConfig, EngineError, ExecutionContext, FileSet, GeneratedFile, PauseReason, Phase, Plan,
    PlanRequest, PreviousAttempt, Result, RetryConfig, RetryContext, ReviseRequest, RootCause,
    SandboxHandle, ScopedBundle, SubAgentConfig, TaskFailure, TaskOutcome, TaskPause,
    TrackerEvent, truncate_chars,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::delta::compute_retry_context;
use crate::effects;
use crate::subagents::{MIN_SUB_AGENT_COMPLEXITY, SubAgentScheduler};

const CHECKPOINT_ERROR_CHARS: usize = 1_000;

/// How the loop recovers from a diagnosed failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Revise the plan from the compressed retry context and drop accumulated files
    RevisePlan,
    /// Replan from changed-file diffs and the truncated error only
    DeltaReplan,
    /// Search memory with the error appended and replan with the full context
    WidenContext,
    /// Stop and report the task as impossible
    Abandon,
    /// Wait, then rebuild the same plan
    Backoff,
}

impl RetryStrategy {
    /// Picks the strategy for a diagnosis.
    ///
    /// `bad_plan` only revises while the revision budget lasts, then falls back to a
    /// delta replan. A `fix_code` suggestion forces a delta replan for every cause
    /// except `bad_plan` within budget. Unknown causes are treated as implementation
    /// errors.
    #[must_use]
    pub fn select(diagnosis: &Diagnosis, can_revise_plan: bool) -> Self {
        match &diagnosis.root_cause {
            RootCause::BadPlan if can_revise_plan => Self::RevisePlan,
            _ if diagnosis.suggests_fix_code() => Self::DeltaReplan,
            RootCause::BadPlan | RootCause::ImplementationError => Self::DeltaReplan,
            RootCause::MissingContext => Self::WidenContext,
            RootCause::ImpossibleTask => Self::Abandon,
            RootCause::EnvironmentError => Self::Backoff,
            RootCause::Other(tag) => {
                tracing::info!(
                    root_cause = %tag,
                    "unclassified root cause, replanning from delta"
                );
                Self::DeltaReplan
            }
        }
    }
}

/// Per-call overrides for [`PlanExecutor::execute_plan`].
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Sandbox to reuse instead of creating one
    pub sandbox: Option<SandboxHandle>,
    /// Budget mode for sub-agents, defaults to the configured one
    pub budget_mode: Option<BudgetMode>,
    /// Force sub-agents on or off, defaults to the configured switch
    pub sub_agents: Option<bool>,
}

/// Result of running the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanExecution {
    /// Whether the final attempt validated
    pub success: bool,
    /// Accumulated files
    pub files_changed: Vec<GeneratedFile>,
    /// Sandbox holding the work
    pub sandbox_id: Option<String>,
    /// Summary of the last plan
    pub plan_summary: String,
    /// Outcome to hand back directly (stopped or impossible)
    pub early_return: Option<TaskOutcome>,
}

/// Drives the retry/diagnosis loop.
pub struct PlanExecutor {
    capabilities: Capabilities,
    retry: RetryConfig,
    sub_agent_config: SubAgentConfig,
    sub_agents: SubAgentScheduler,
}

/// Mutable state of one loop run.
struct LoopState {
    plan: Plan,
    files: FileSet,
    previous_files: HashMap<String, String>,
    sandbox: SandboxHandle,
    created_sandbox: bool,
    build_task: String,
}

impl LoopState {
    fn execution(&self, success: bool, early_return: Option<TaskOutcome>) -> PlanExecution {
        PlanExecution {
            success,
            files_changed: self.files.files().to_vec(),
            sandbox_id: Some(self.sandbox.id.clone()),
            plan_summary: self.plan.summary(),
            early_return,
        }
    }

    fn code_excerpt(&self, limit: usize) -> String {
        let rendered = self
            .files
            .files()
            .iter()
            .map(|file| format!("### {}\n{}", file.path, file.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        truncate_chars(&rendered, limit)
    }
}

impl PlanExecutor {
    /// Creates an executor from the engine configuration.
    #[must_use]
    pub fn new(capabilities: Capabilities, config: &EngineConfig) -> Self {
        let sub_agents = SubAgentScheduler::new(
            Arc::clone(&capabilities.sub_agents),
            Arc::clone(&capabilities.merger),
            config.models.clone(),
        );
        Self {
            capabilities,
            retry: config.retry.clone(),
            sub_agent_config: config.sub_agents.clone(),
            sub_agents,
        }
    }

    /// Plans the task and loops build → validate → diagnose until validation passes.
    ///
    /// Cancellation returns a `stopped` pause and an `impossible_task` diagnosis returns a
    /// classified failure, both through `early_return`. A sandbox this call created is
    /// destroyed before any error is returned.
    ///
    /// # Errors
    /// Returns `ValidationExhausted` when every attempt failed validation, or the error
    /// of any non-best-effort capability call.
    pub async fn execute_plan(
        &self,
        ctx: &mut ExecutionContext,
        scoped: &ScopedBundle,
        options: &ExecuteOptions,
    ) -> Result<PlanExecution> {
        let strategy_hint = effects::strategy_hint(&self.capabilities, ctx).await;
        let request = PlanRequest {
            strategy_hint,
            ..full_plan_request(ctx, scoped, Vec::new())
        };
        let plan = self.plan(ctx, request).await?;
        tracing::info!(task = %ctx.task_id, steps = plan.len(), "initial plan ready");

        ctx.error_patterns = effects::error_patterns(&self.capabilities, ctx).await;

        let build_task = self.enrich_with_sub_agents(ctx, &plan, options).await;

        if ctx.phase.can_advance_to(Phase::Building) {
            effects::advance(&self.capabilities, ctx, Phase::Building).await?;
        }

        if self.capabilities.cancellation.is_cancelled(ctx.task_id).await? {
            tracing::info!(task = %ctx.task_id, "cancelled before sandbox allocation");
            return Ok(PlanExecution {
                success: false,
                files_changed: Vec::new(),
                sandbox_id: None,
                plan_summary: plan.summary(),
                early_return: Some(stopped(Vec::new(), None)),
            });
        }

        let (sandbox, created_sandbox) = match &options.sandbox {
            Some(sandbox) => (sandbox.clone(), false),
            None => (self.capabilities.sandboxes.create(&ctx.repo).await?, true),
        };

        let mut state = LoopState {
            plan,
            files: FileSet::new(),
            previous_files: HashMap::new(),
            sandbox,
            created_sandbox,
            build_task,
        };

        let result = self.run_loop(ctx, scoped, &mut state).await;
        if result.is_err() && state.created_sandbox {
            self.release_sandbox(ctx, &state.sandbox).await;
        }
        result
    }

    async fn release_sandbox(&self, ctx: &ExecutionContext, sandbox: &SandboxHandle) {
        if let Err(error) = self.capabilities.sandboxes.destroy(sandbox).await {
            tracing::warn!(task = %ctx.task_id, %error, "sandbox cleanup failed");
        }
    }

    async fn run_loop(
        &self,
        ctx: &mut ExecutionContext,
        scoped: &ScopedBundle,
        state: &mut LoopState,
    ) -> Result<PlanExecution> {
        let mut last_output = String::new();

        while ctx.has_attempts_left() {
            if self.capabilities.cancellation.is_cancelled(ctx.task_id).await? {
                tracing::info!(task = %ctx.task_id, attempt = ctx.total_attempts, "cancelled");
                let files = state.files.files().to_vec();
                let outcome = stopped(files, Some(state.sandbox.id.clone()));
                return Ok(state.execution(false, Some(outcome)));
            }

            ctx.total_attempts += 1;
            let cost_before = ctx.cost_usd;
            tracing::info!(
                task = %ctx.task_id,
                attempt = ctx.total_attempts,
                max_attempts = ctx.max_attempts,
                "build attempt"
            );

            let built = self
                .capabilities
                .builder
                .build(BuildRequest {
                    task: state.build_task.clone(),
                    plan: state.plan.clone(),
                    sandbox: state.sandbox.clone(),
                    model: ctx.model.clone(),
                    known_patterns: ctx.error_patterns.clone(),
                    tools: scoped.bundle.tools.clone(),
                })
                .await?;
            ctx.record_usage(built.usage);
            state.files.extend(built.value);

            let report = self.capabilities.validator.validate(&state.sandbox).await?;
            if report.success {
                tracing::info!(
                    task = %ctx.task_id,
                    attempt = ctx.total_attempts,
                    "validation passed"
                );
                return Ok(state.execution(true, None));
            }
            last_output = report.output;

            if !ctx.has_attempts_left() {
                self.record_failure(ctx, state, &last_output, None, cost_before)
                    .await;
                break;
            }

            let diagnosis = self.diagnose(ctx, state, &last_output).await?;
            self.record_failure(
                ctx,
                state,
                &last_output,
                Some(diagnosis.root_cause.clone()),
                cost_before,
            )
            .await;

            let current_files = state.files.snapshot();
            let retry = compute_retry_context(
                ctx,
                &current_files,
                &state.previous_files,
                &state.plan.summary(),
                &last_output,
                &diagnosis,
            );
            state.previous_files = current_files;

            let strategy = RetryStrategy::select(&diagnosis, ctx.can_revise_plan());
            tracing::info!(
                task = %ctx.task_id,
                attempt = ctx.total_attempts,
                root_cause = %diagnosis.root_cause,
                ?strategy,
                retry_tokens = retry.estimated_tokens,
                "validation failed"
            );

            match strategy {
                RetryStrategy::RevisePlan => {
                    let revised = self
                        .capabilities
                        .planner
                        .revise(ReviseRequest {
                            original_plan: state.plan.clone(),
                            retry,
                            constraints: ctx.error_patterns.clone(),
                        })
                        .await?;
                    ctx.record_usage(revised.usage);
                    ctx.plan_revisions += 1;
                    state.plan = revised.value;
                    state.files.clear();
                }
                RetryStrategy::DeltaReplan => {
                    let request = PlanRequest {
                        task: retry.task_summary.clone(),
                        previous_attempt: Some(previous_attempt(&retry)),
                        ..PlanRequest::default()
                    };
                    state.plan = self.plan(ctx, request).await?;
                }
                RetryStrategy::WidenContext => {
                    let query = format!("{}\n{}", ctx.description, retry.last_error);
                    let found = effects::search_memories(&self.capabilities, ctx, &query).await;
                    tracing::debug!(
                        task = %ctx.task_id,
                        memories = found.len(),
                        "widened context"
                    );
                    let request = PlanRequest {
                        previous_attempt: Some(previous_attempt(&retry)),
                        ..full_plan_request(ctx, scoped, found)
                    };
                    state.plan = self.plan(ctx, request).await?;
                }
                RetryStrategy::Abandon => {
                    let reason = diagnosis.reason.clone();
                    effects::notify(
                        &self.capabilities,
                        ctx,
                        TrackerEvent::Blocked {
                            reason: reason.clone().unwrap_or_else(|| "impossible task".to_owned()),
                        },
                    )
                    .await;
                    let outcome = TaskOutcome::Failed(TaskFailure::impossible(reason));
                    return Ok(state.execution(false, Some(outcome)));
                }
                RetryStrategy::Backoff => {
                    let backoff = self.retry.environment_backoff();
                    tracing::warn!(
                        task = %ctx.task_id,
                        ?backoff,
                        "environment error, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        tracing::error!(
            task = %ctx.task_id,
            attempts = ctx.total_attempts,
            "validation attempts exhausted"
        );
        Err(EngineError::ValidationExhausted {
            attempts: ctx.total_attempts,
            output: last_output,
        })
    }

    async fn plan(&self, ctx: &mut ExecutionContext, request: PlanRequest) -> Result<Plan> {
        let metered = self.capabilities.planner.plan(request).await?;
        ctx.record_usage(metered.usage);
        Ok(metered.value)
    }

    async fn diagnose(
        &self,
        ctx: &mut ExecutionContext,
        state: &LoopState,
        output: &str,
    ) -> Result<Diagnosis> {
        let request = DiagnoseRequest {
            task: ctx.description.clone(),
            plan_summary: state.plan.summary(),
            error: output.to_owned(),
            prior_errors: ctx
                .attempt_history
                .iter()
                .map(|record| record.error.clone())
                .collect(),
            code_excerpt: state.code_excerpt(self.retry.diagnosis_excerpt_chars),
            known_patterns: ctx.error_patterns.clone(),
        };
        let metered = self.capabilities.diagnoser.diagnose(request).await?;
        ctx.record_usage(metered.usage);
        Ok(metered.value)
    }

    async fn record_failure(
        &self,
        ctx: &mut ExecutionContext,
        state: &LoopState,
        output: &str,
        root_cause: Option<RootCause>,
        cost_before: f64,
    ) {
        ctx.attempt_history.push(AttemptRecord {
            attempt: ctx.total_attempts,
            error: output.to_owned(),
            root_cause: root_cause.clone(),
        });

        let paths: Vec<&str> = state.files.files().iter().map(|file| file.path.as_str()).collect();
        let snapshot = json!({
            "attempt": ctx.total_attempts,
            "phase": ctx.phase,
            "root_cause": root_cause,
            "files": paths,
            "error": truncate_chars(output, CHECKPOINT_ERROR_CHARS),
        });
        effects::checkpoint(
            &self.capabilities,
            ctx,
            snapshot,
            Some(ctx.cost_usd - cost_before),
        )
        .await;
    }

    async fn enrich_with_sub_agents(
        &self,
        ctx: &mut ExecutionContext,
        plan: &Plan,
        options: &ExecuteOptions,
    ) -> String {
        let enabled = options.sub_agents.unwrap_or(self.sub_agent_config.enabled);
        let complexity = estimated_complexity(plan);
        let threshold = self
            .sub_agent_config
            .min_complexity
            .max(MIN_SUB_AGENT_COMPLEXITY);
        if !enabled || complexity < threshold {
            return ctx.description.clone();
        }

        let budget_mode = options
            .budget_mode
            .unwrap_or(self.sub_agent_config.budget_mode);
        tracing::info!(task = %ctx.task_id, complexity, ?budget_mode, "running sub-agents");

        let merged = self
            .sub_agents
            .run(&ctx.description, &plan.summary(), complexity, budget_mode)
            .await;
        ctx.record_usage(merged.usage);

        if merged.value.is_empty() {
            ctx.description.clone()
        } else {
            format!("{}\n\n## Sub-agent analysis\n\n{}", ctx.description, merged.value)
        }
    }
}

/// Complexity estimate used to decide on sub-agents: two points per plan step, 1-10.
#[must_use]
pub fn estimated_complexity(plan: &Plan) -> u8 {
    let score = plan.len().saturating_mul(2).clamp(1, 10);
    u8::try_from(score).unwrap_or(10)
}

fn full_plan_request(
    ctx: &ExecutionContext,
    scoped: &ScopedBundle,
    extra_memories: Vec<String>,
) -> PlanRequest {
    let bundle = &scoped.bundle;
    let tree = if bundle.tree.is_empty() {
        bundle.tree_list.join("\n")
    } else {
        bundle.tree.clone()
    };
    let mut memories = bundle.memories.clone();
    memories.extend(extra_memories);

    PlanRequest {
        task: ctx.description.clone(),
        tree,
        files: bundle.files.clone(),
        memories,
        docs: bundle.docs.clone(),
        strategy_hint: None,
        previous_attempt: None,
    }
}

fn previous_attempt(retry: &RetryContext) -> PreviousAttempt {
    PreviousAttempt {
        plan_summary: retry.plan_summary.clone(),
        error: retry.last_error.clone(),
        diagnosis: Some(retry.diagnosis.clone()),
        changes: retry.render_changes(),
    }
}

fn stopped(files: Vec<GeneratedFile>, sandbox_id: Option<String>) -> TaskOutcome {
    TaskOutcome::Paused(TaskPause {
        files,
        sandbox_id,
        ..TaskPause::new(PauseReason::Stopped, "Task was cancelled")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_core::{PlanStep, StepAction, SuggestedAction};

    fn diagnosis(cause: RootCause) -> Diagnosis {
        Diagnosis::new(cause)
    }

    #[test]
    fn test_strategy_dispatch() {
        assert_eq!(
            RetryStrategy::select(&diagnosis(RootCause::BadPlan), true),
            RetryStrategy::RevisePlan
        );
        assert_eq!(
            RetryStrategy::select(&diagnosis(RootCause::BadPlan), false),
            RetryStrategy::DeltaReplan
        );
        assert_eq!(
            RetryStrategy::select(&diagnosis(RootCause::ImplementationError), true),
            RetryStrategy::DeltaReplan
        );
        assert_eq!(
            RetryStrategy::select(&diagnosis(RootCause::MissingContext), true),
            RetryStrategy::WidenContext
        );
        assert_eq!(
            RetryStrategy::select(&diagnosis(RootCause::ImpossibleTask), true),
            RetryStrategy::Abandon
        );
        assert_eq!(
            RetryStrategy::select(&diagnosis(RootCause::EnvironmentError), true),
            RetryStrategy::Backoff
        );
        assert_eq!(
            RetryStrategy::select(&diagnosis(RootCause::Other("flaky".to_owned())), true),
            RetryStrategy::DeltaReplan
        );
    }

    #[test]
    fn test_fix_code_forces_delta_replan() {
        let fix =
            diagnosis(RootCause::MissingContext).with_suggested_action(SuggestedAction::FixCode);
        assert_eq!(RetryStrategy::select(&fix, true), RetryStrategy::DeltaReplan);

        let bad_plan =
            diagnosis(RootCause::BadPlan).with_suggested_action(SuggestedAction::FixCode);
        assert_eq!(RetryStrategy::select(&bad_plan, true), RetryStrategy::RevisePlan);
    }

    #[test]
    fn test_estimated_complexity() {
        let step = PlanStep::new("step", StepAction::ModifyFile);
        assert_eq!(estimated_complexity(&Plan::new(Vec::new())), 1);
        assert_eq!(estimated_complexity(&Plan::new(vec![step.clone(); 2])), 4);
        assert_eq!(estimated_complexity(&Plan::new(vec![step.clone(); 3])), 6);
        assert_eq!(estimated_complexity(&Plan::new(vec![step; 40])), 10);
    }
}
