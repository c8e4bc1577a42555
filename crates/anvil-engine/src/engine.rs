//! Top-level task flow: lock, context, confidence, plan/build, review.

use anvil_core::{
    BudgetMode, Capabilities, ContextBundle, EngineConfig, EngineError, ExecutionContext,
    JobHandle, PauseReason, Phase, RepoCoordinates, Result, SandboxHandle, TaskOutcome, TaskPause,
    TaskSuccess, TrackerEvent,
};
use serde::{Deserialize, Serialize};

use crate::confidence::{ConfidenceRouter, RouteOptions};
use crate::effects;
use crate::profiler::filter_for_phase;
use crate::retry::{ExecuteOptions, PlanExecution, PlanExecutor};

/// A task submitted to the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskRequest {
    /// Repository to work in
    pub repo: RepoCoordinates,
    /// Free-text task description
    pub description: String,
    /// External issue tracker identifier
    pub tracker_id: Option<String>,
    /// Checkpoint handle
    pub job: Option<JobHandle>,
    /// Model chosen by the caller
    pub model_override: Option<String>,
    /// Skip the confidence gate
    pub force_continue: bool,
    /// Context curated by the caller, used instead of gathering one
    pub curated_context: Option<ContextBundle>,
    /// Override the configured review gate
    pub require_review: Option<bool>,
    /// Override the configured sub-agent budget mode
    pub budget_mode: Option<BudgetMode>,
    /// Sandbox to reuse
    pub sandbox: Option<SandboxHandle>,
}

impl TaskRequest {
    /// Creates a request with default options.
    pub fn new(repo: RepoCoordinates, description: impl Into<String>) -> Self {
        Self {
            repo,
            description: description.into(),
            ..Self::default()
        }
    }

    /// Links the task to a tracker issue.
    #[must_use]
    pub fn with_tracker(mut self, tracker_id: impl Into<String>) -> Self {
        self.tracker_id = Some(tracker_id.into());
        self
    }

    /// Sets the checkpoint handle.
    #[must_use]
    pub fn with_job(mut self, job: JobHandle) -> Self {
        self.job = Some(job);
        self
    }

    /// Pins the execution model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }

    /// Skips the confidence gate.
    #[must_use]
    pub fn force_continue(mut self) -> Self {
        self.force_continue = true;
        self
    }

    /// Supplies a curated context.
    #[must_use]
    pub fn with_context(mut self, bundle: ContextBundle) -> Self {
        self.curated_context = Some(bundle);
        self
    }

    /// Overrides the review gate.
    #[must_use]
    pub fn with_review(mut self, require_review: bool) -> Self {
        self.require_review = Some(require_review);
        self
    }
}

/// Runs tasks end to end.
pub struct TaskEngine {
    capabilities: Capabilities,
    config: EngineConfig,
    router: ConfidenceRouter,
    executor: PlanExecutor,
}

impl TaskEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(capabilities: Capabilities, config: EngineConfig) -> Self {
        let router = ConfidenceRouter::new(capabilities.clone(), &config);
        let executor = PlanExecutor::new(capabilities.clone(), &config);
        Self {
            capabilities,
            config,
            router,
            executor,
        }
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Executes a task under the repository lock.
    ///
    /// Pauses and `impossible_task` come back as [`TaskOutcome`] values.
    ///
    /// # Errors
    /// Returns `RepoLocked` when another task holds the repository, `ValidationExhausted`
    /// when every build attempt failed validation, or the error of a failed capability.
    pub async fn execute_task(&self, request: TaskRequest) -> Result<TaskOutcome> {
        let owner = request.repo.owner.clone();
        let name = request.repo.name.clone();

        if let Some(lock) = &self.capabilities.repo_lock
            && !lock.try_acquire(&owner, &name).await?
        {
            tracing::warn!(repo = %request.repo, "repository is locked by another task");
            return Err(EngineError::RepoLocked { owner, name });
        }

        let mut ctx = self.context_for(&request);
        tracing::info!(task = %ctx.task_id, repo = %ctx.repo, "task started");

        let result = self.run(&mut ctx, request).await;
        let result = match result {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                self.fail(&mut ctx, &error).await;
                Err(error)
            }
        };

        if let Some(lock) = &self.capabilities.repo_lock
            && let Err(error) = lock.release(&owner, &name).await
        {
            tracing::warn!(task = %ctx.task_id, %error, "repository lock release failed");
        }

        tracing::info!(
            task = %ctx.task_id,
            phase = %ctx.phase,
            cost_usd = ctx.cost_usd,
            tokens = ctx.tokens,
            attempts = ctx.total_attempts,
            "task finished"
        );
        result
    }

    fn context_for(&self, request: &TaskRequest) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(request.repo.clone(), request.description.clone())
            .with_budgets(
                self.config.retry.max_attempts,
                self.config.retry.max_plan_revisions,
            );
        ctx.tracker_id.clone_from(&request.tracker_id);
        ctx.job.clone_from(&request.job);
        ctx.model.clone_from(&request.model_override);
        ctx
    }

    async fn run(&self, ctx: &mut ExecutionContext, request: TaskRequest) -> Result<TaskOutcome> {
        effects::advance(&self.capabilities, ctx, Phase::Context).await?;
        let curated = request.curated_context.is_some();
        let bundle = match request.curated_context {
            Some(bundle) => bundle,
            None => self.capabilities.context.gather(ctx).await?,
        };

        if self.capabilities.cancellation.is_cancelled(ctx.task_id).await? {
            tracing::info!(task = %ctx.task_id, "cancelled after context gathering");
            effects::advance(&self.capabilities, ctx, Phase::Stopped).await?;
            return Ok(TaskOutcome::Paused(TaskPause::new(
                PauseReason::Stopped,
                "Task was cancelled",
            )));
        }

        effects::advance(&self.capabilities, ctx, Phase::Confidence).await?;
        let route_options = RouteOptions {
            force_continue: request.force_continue,
            curated_context: curated,
            model_override: request.model_override.clone(),
        };
        let decision = self
            .router
            .assess_and_route(ctx, &filter_for_phase(&bundle, "confidence"), &route_options)
            .await?;
        if let Some(outcome) = decision.early_return {
            effects::advance(&self.capabilities, ctx, Phase::NeedsInput).await?;
            return Ok(outcome);
        }

        effects::advance(&self.capabilities, ctx, Phase::Planning).await?;
        let execute_options = ExecuteOptions {
            sandbox: request.sandbox.clone(),
            budget_mode: request.budget_mode,
            sub_agents: None,
        };
        let execution = self
            .executor
            .execute_plan(ctx, &filter_for_phase(&bundle, "planning"), &execute_options)
            .await?;

        let require_review = request
            .require_review
            .unwrap_or(self.config.review.require_review);
        self.finish(ctx, execution, decision.confidence_score, require_review)
            .await
    }

    async fn finish(
        &self,
        ctx: &mut ExecutionContext,
        execution: PlanExecution,
        confidence_score: u8,
        require_review: bool,
    ) -> Result<TaskOutcome> {
        if let Some(outcome) = execution.early_return {
            let phase = match &outcome {
                TaskOutcome::Paused(pause) if pause.reason == PauseReason::Stopped => {
                    Phase::Stopped
                }
                TaskOutcome::Paused(_) => Phase::NeedsInput,
                TaskOutcome::Failed(_) => Phase::Failed,
                TaskOutcome::Completed(_) => Phase::Completed,
            };
            effects::advance(&self.capabilities, ctx, phase).await?;
            return Ok(outcome);
        }

        effects::advance(&self.capabilities, ctx, Phase::Reviewing).await?;

        if require_review {
            effects::advance(&self.capabilities, ctx, Phase::PendingReview).await?;
            let pause = TaskPause {
                files: execution.files_changed,
                sandbox_id: execution.sandbox_id,
                ..TaskPause::new(
                    PauseReason::PendingReview,
                    format!("Change set ready for review: {}", execution.plan_summary),
                )
            };
            return Ok(TaskOutcome::Paused(pause));
        }

        effects::advance(&self.capabilities, ctx, Phase::Completed).await?;
        effects::notify(
            &self.capabilities,
            ctx,
            TrackerEvent::Completed {
                files_changed: execution.files_changed.len(),
            },
        )
        .await;

        Ok(TaskOutcome::Completed(TaskSuccess {
            files: execution.files_changed,
            cost_usd: ctx.cost_usd,
            tokens: ctx.tokens,
            sandbox_id: execution.sandbox_id,
            plan_summary: execution.plan_summary,
            model: ctx.model.clone(),
            confidence_score,
        }))
    }

    /// Marks the task failed and tells the tracker; the error itself is returned by the
    /// caller.
    async fn fail(&self, ctx: &mut ExecutionContext, error: &EngineError) {
        tracing::error!(task = %ctx.task_id, phase = %ctx.phase, %error, "task failed");

        if ctx.phase.can_advance_to(Phase::Failed)
            && let Err(advance_error) =
                effects::advance(&self.capabilities, ctx, Phase::Failed).await
        {
            tracing::warn!(task = %ctx.task_id, %advance_error, "could not mark task failed");
        }

        effects::notify(
            &self.capabilities,
            ctx,
            TrackerEvent::Failed {
                message: error.to_string(),
            },
        )
        .await;
    }
}
