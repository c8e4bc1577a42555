//! Confidence gate and model routing.
//!
//! Decides whether a task is understood well enough to attempt, and which model runs it.

use anvil_core::{
    Capabilities, ComplexityRequest, ConfidenceAssessment, ConfidenceConfig, ConfidenceRequest,
    EngineConfig, ExecutionContext, ModelCatalog, ModelSelectionMode, PauseDetails, PauseReason,
    RecommendedAction, Result, ScopedBundle, TaskOutcome, TaskPause, TrackerEvent,
    truncate_chars,
};

use crate::effects;
use crate::models::TierRegistry;

/// Score reported when the repository is empty and no assessment ran.
pub const EMPTY_REPO_SCORE: u8 = 90;
/// Score reported once a task is past the gate.
pub const PROCEED_SCORE: u8 = 100;

const TREE_EXCERPT_CHARS: usize = 2_000;

/// Caller overrides for routing.
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    /// Skip the gate entirely
    pub force_continue: bool,
    /// Context was curated by the caller, skip the gate
    pub curated_context: bool,
    /// Model chosen by the caller
    pub model_override: Option<String>,
}

/// Result of routing a task.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    /// Whether execution should go on to planning
    pub should_continue: bool,
    /// Model the task will run on
    pub selected_model: Option<String>,
    /// Reported confidence
    pub confidence_score: u8,
    /// Why the task paused
    pub pause_reason: Option<PauseReason>,
    /// Outcome to hand back to the caller when pausing
    pub early_return: Option<TaskOutcome>,
}

impl RouteDecision {
    fn proceed(model: String, confidence_score: u8) -> Self {
        Self {
            should_continue: true,
            selected_model: Some(model),
            confidence_score,
            pause_reason: None,
            early_return: None,
        }
    }

    fn pause(pause: TaskPause, model: Option<String>, confidence_score: u8) -> Self {
        Self {
            should_continue: false,
            selected_model: model,
            confidence_score,
            pause_reason: Some(pause.reason),
            early_return: Some(TaskOutcome::Paused(pause)),
        }
    }
}

/// Gates tasks on assessed confidence and routes them to a model tier.
pub struct ConfidenceRouter {
    capabilities: Capabilities,
    config: ConfidenceConfig,
    catalog: ModelCatalog,
    tiers: TierRegistry,
}

impl ConfidenceRouter {
    /// Creates a router with the default tier mapping.
    #[must_use]
    pub fn new(capabilities: Capabilities, config: &EngineConfig) -> Self {
        Self {
            capabilities,
            config: config.confidence.clone(),
            catalog: config.models.clone(),
            tiers: TierRegistry::with_defaults(),
        }
    }

    /// Replaces the complexity → tier mapping.
    #[must_use]
    pub fn with_tiers(mut self, tiers: TierRegistry) -> Self {
        self.tiers = tiers;
        self
    }

    /// Assesses confidence and selects a model, writing it to `ctx.model`.
    ///
    /// # Errors
    /// Returns an error if the confidence capability fails.
    pub async fn assess_and_route(
        &self,
        ctx: &mut ExecutionContext,
        scoped: &ScopedBundle,
        options: &RouteOptions,
    ) -> Result<RouteDecision> {
        if options.force_continue || options.curated_context {
            let model = options
                .model_override
                .clone()
                .or_else(|| ctx.model.clone())
                .unwrap_or_else(|| self.catalog.default_model().to_owned());
            tracing::info!(task = %ctx.task_id, %model, "confidence gate skipped");
            ctx.model = Some(model.clone());
            return Ok(RouteDecision::proceed(model, PROCEED_SCORE));
        }

        let empty_repo = scoped.empty_repo;
        if empty_repo {
            tracing::info!(task = %ctx.task_id, "empty repository, skipping confidence assessment");
        } else {
            let request = ConfidenceRequest {
                task: ctx.description.clone(),
                tree: scoped.bundle.tree.clone(),
                files: scoped.bundle.files.clone(),
                memories: scoped.bundle.memories.clone(),
                docs: scoped.bundle.docs.clone(),
            };
            let metered = self.capabilities.confidence.assess(request).await?;
            ctx.record_usage(metered.usage);
            let assessment = metered.value;

            tracing::info!(
                task = %ctx.task_id,
                overall = assessment.overall,
                action = ?assessment.recommended_action,
                "confidence assessed"
            );

            if let Some(decision) = self.gate(ctx, assessment).await {
                return Ok(decision);
            }
        }

        let model = match options.model_override.clone() {
            Some(model) => model,
            None if self.config.model_selection == ModelSelectionMode::Manual => {
                let pause = TaskPause::new(
                    PauseReason::NeedsModelSelection,
                    "Model selection is manual; choose a model to continue",
                );
                return Ok(RouteDecision::pause(
                    pause,
                    ctx.model.clone(),
                    reported_score(empty_repo),
                ));
            }
            None => self.select_model(ctx, scoped).await,
        };

        tracing::info!(task = %ctx.task_id, %model, "model selected");
        ctx.model = Some(model.clone());
        Ok(RouteDecision::proceed(model, reported_score(empty_repo)))
    }

    /// Turns an assessment into a pause, or `None` to proceed.
    ///
    /// The low-confidence check runs first, so the breakdown branch only fires for
    /// assessments at or above the proceed threshold.
    async fn gate(
        &self,
        ctx: &ExecutionContext,
        assessment: ConfidenceAssessment,
    ) -> Option<RouteDecision> {
        let overall = assessment.overall;

        if overall < self.config.proceed_threshold {
            effects::notify(
                &self.capabilities,
                ctx,
                TrackerEvent::NeedsClarification {
                    questions: assessment.clarifying_questions.clone(),
                },
            )
            .await;
            let pause = pause_from(
                PauseReason::LowConfidence,
                format!("Confidence {overall} is below {}", self.config.proceed_threshold),
                assessment,
            );
            return Some(RouteDecision::pause(pause, ctx.model.clone(), overall));
        }

        if overall < self.config.breakdown_threshold
            || assessment.recommended_action == RecommendedAction::BreakDown
        {
            effects::notify(
                &self.capabilities,
                ctx,
                TrackerEvent::NeedsBreakdown {
                    subtasks: assessment.suggested_subtasks.clone(),
                },
            )
            .await;
            let pause = pause_from(
                PauseReason::NeedsBreakdown,
                "Task should be broken down before it is attempted",
                assessment,
            );
            return Some(RouteDecision::pause(pause, ctx.model.clone(), overall));
        }

        None
    }

    async fn select_model(&self, ctx: &ExecutionContext, scoped: &ScopedBundle) -> String {
        let request = ComplexityRequest {
            task: ctx.description.clone(),
            tree_excerpt: truncate_chars(&scoped.bundle.tree, TREE_EXCERPT_CHARS),
            file_count: scoped.bundle.files.len(),
        };

        let assessment = match self.capabilities.complexity.assess_complexity(request).await {
            Ok(assessment) => assessment,
            Err(error) => {
                tracing::warn!(
                    task = %ctx.task_id,
                    %error,
                    "complexity assessment failed, using default tier"
                );
                return self.catalog.default_model().to_owned();
            }
        };

        tracing::debug!(
            task = %ctx.task_id,
            score = assessment.score,
            reasoning = %assessment.reasoning,
            "complexity assessed"
        );

        self.tiers
            .select_model(assessment.score, &self.catalog)
            .unwrap_or_else(|error| {
                tracing::warn!(
                    task = %ctx.task_id,
                    %error,
                    "tier lookup failed, using default tier"
                );
                self.catalog.default_model().to_owned()
            })
    }
}

const fn reported_score(empty_repo: bool) -> u8 {
    if empty_repo {
        EMPTY_REPO_SCORE
    } else {
        PROCEED_SCORE
    }
}

fn pause_from(
    reason: PauseReason,
    message: impl Into<String>,
    assessment: ConfidenceAssessment,
) -> TaskPause {
    TaskPause {
        reason,
        details: PauseDetails {
            message: message.into(),
            confidence: Some(assessment.overall),
            uncertainties: assessment.uncertainties,
            clarifying_questions: assessment.clarifying_questions,
            suggested_subtasks: assessment.suggested_subtasks,
        },
        files: Vec::new(),
        sandbox_id: None,
    }
}
