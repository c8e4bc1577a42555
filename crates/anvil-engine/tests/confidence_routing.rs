//! Confidence gate and model routing.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::print_stdout,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

mod common;

use anvil_core::{
    ContextBundle, EngineConfig, FileContent, ModelCatalog, ModelSelectionMode, ModelTier,
    PauseReason, RecommendedAction, ScopedBundle, TaskOutcome, TrackerEvent,
};
use anvil_engine::{ConfidenceRouter, RouteOptions, TierRegistry, filter_for_phase};
use common::{World, assessment, context, repo_bundle, test_config};

fn router(world: &World) -> ConfidenceRouter {
    ConfidenceRouter::new(world.capabilities(), &test_config())
}

fn scoped() -> ScopedBundle {
    filter_for_phase(&repo_bundle(), "confidence")
}

#[tokio::test]
async fn test_empty_repo_skips_assessment() {
    let world = World::new();
    let mut ctx = context();

    let decision = router(&world)
        .assess_and_route(
            &mut ctx,
            &ScopedBundle::passthrough(ContextBundle::default()),
            &RouteOptions::default(),
        )
        .await
        .expect("route");

    assert!(decision.should_continue);
    assert_eq!(decision.confidence_score, 90);
    assert_eq!(world.confidence.calls.count(), 0);
    assert_eq!(world.complexity.calls.count(), 1);
    assert_eq!(ctx.model, decision.selected_model);
}

#[tokio::test]
async fn test_oversized_file_still_gates() {
    let world = World::new();
    world
        .confidence
        .assessments
        .push(assessment(45, RecommendedAction::Clarify));
    let bundle = ContextBundle {
        files: vec![FileContent::new("src/generated.rs", "x".repeat(40_000))],
        ..repo_bundle()
    };
    let mut ctx = context();

    let decision = router(&world)
        .assess_and_route(
            &mut ctx,
            &filter_for_phase(&bundle, "confidence"),
            &RouteOptions::default(),
        )
        .await
        .expect("route");

    assert!(!decision.should_continue);
    assert_eq!(decision.pause_reason, Some(PauseReason::LowConfidence));
    assert_eq!(world.confidence.calls.count(), 1);
}

#[tokio::test]
async fn test_listed_paths_without_tree_still_gate() {
    let world = World::new();
    world
        .confidence
        .assessments
        .push(assessment(45, RecommendedAction::Clarify));
    let bundle = ContextBundle {
        tree: String::new(),
        ..repo_bundle()
    };
    let mut ctx = context();

    let decision = router(&world)
        .assess_and_route(
            &mut ctx,
            &filter_for_phase(&bundle, "confidence"),
            &RouteOptions::default(),
        )
        .await
        .expect("route");

    assert_eq!(decision.pause_reason, Some(PauseReason::LowConfidence));
    assert_eq!(decision.confidence_score, 45);
    assert_eq!(world.confidence.calls.count(), 1);
}

#[tokio::test]
async fn test_low_confidence_pauses_with_questions() {
    let world = World::new();
    world
        .confidence
        .assessments
        .push(assessment(45, RecommendedAction::Clarify));
    let mut ctx = context();

    let decision = router(&world)
        .assess_and_route(&mut ctx, &scoped(), &RouteOptions::default())
        .await
        .expect("route");

    assert!(!decision.should_continue);
    assert_eq!(decision.pause_reason, Some(PauseReason::LowConfidence));
    assert_eq!(decision.confidence_score, 45);
    match decision.early_return {
        Some(TaskOutcome::Paused(pause)) => {
            assert_eq!(pause.details.confidence, Some(45));
            assert_eq!(pause.details.clarifying_questions, vec!["Which API version?".to_owned()]);
            assert_eq!(pause.details.uncertainties, vec!["which endpoint".to_owned()]);
        }
        other => panic!("expected low-confidence pause, got {other:?}"),
    }
    assert_eq!(world.complexity.calls.count(), 0);
    assert_eq!(
        world.notifier.events.all(),
        vec![TrackerEvent::NeedsClarification {
            questions: vec!["Which API version?".to_owned()]
        }]
    );
}

#[tokio::test]
async fn test_break_down_recommendation_pauses() {
    let world = World::new();
    world
        .confidence
        .assessments
        .push(assessment(92, RecommendedAction::BreakDown));
    let mut ctx = context();

    let decision = router(&world)
        .assess_and_route(&mut ctx, &scoped(), &RouteOptions::default())
        .await
        .expect("route");

    assert_eq!(decision.pause_reason, Some(PauseReason::NeedsBreakdown));
    assert_eq!(decision.confidence_score, 92);
    assert_eq!(
        world.notifier.events.all(),
        vec![TrackerEvent::NeedsBreakdown {
            subtasks: vec!["split the handler".to_owned()]
        }]
    );
}

#[tokio::test]
async fn test_proceed_routes_by_complexity() {
    let world = World::new();
    world.complexity.scores.push(Some(9));
    let mut ctx = context();

    let decision = router(&world)
        .assess_and_route(&mut ctx, &scoped(), &RouteOptions::default())
        .await
        .expect("route");

    let premium = ModelCatalog::default().premium;
    assert!(decision.should_continue);
    assert_eq!(decision.confidence_score, 100);
    assert_eq!(decision.selected_model.as_deref(), Some(premium.as_str()));
    assert_eq!(ctx.model.as_deref(), Some(premium.as_str()));
    assert!(ctx.cost_usd > 0.0);
    assert!(world.notifier.events.all().is_empty());

    let request = world.complexity.calls.last().expect("complexity request");
    assert_eq!(request.file_count, 1);
    assert!(request.tree_excerpt.contains("lib.rs"));
}

#[tokio::test]
async fn test_complexity_failure_uses_default_model() {
    let world = World::new();
    world.complexity.scores.push(None);
    let mut ctx = context();

    let decision = router(&world)
        .assess_and_route(&mut ctx, &scoped(), &RouteOptions::default())
        .await
        .expect("route");

    let catalog = ModelCatalog::default();
    assert!(decision.should_continue);
    assert_eq!(decision.selected_model.as_deref(), Some(catalog.default_model()));
}

#[tokio::test]
async fn test_custom_tiers() {
    let world = World::new();
    world.complexity.scores.push(Some(2));
    let mut tiers = TierRegistry::new();
    tiers.register_range(1..=10, ModelTier::Premium);
    let mut ctx = context();

    let decision = router(&world)
        .with_tiers(tiers)
        .assess_and_route(&mut ctx, &scoped(), &RouteOptions::default())
        .await
        .expect("route");

    assert_eq!(
        decision.selected_model,
        Some(ModelCatalog::default().premium)
    );
}

#[tokio::test]
async fn test_force_continue_skips_gate() {
    let world = World::new();
    world
        .confidence
        .assessments
        .push(assessment(10, RecommendedAction::Clarify));
    let mut ctx = context();
    let options = RouteOptions {
        force_continue: true,
        model_override: Some("custom-model".to_owned()),
        ..RouteOptions::default()
    };

    let decision = router(&world)
        .assess_and_route(&mut ctx, &scoped(), &options)
        .await
        .expect("route");

    assert!(decision.should_continue);
    assert_eq!(decision.confidence_score, 100);
    assert_eq!(decision.selected_model.as_deref(), Some("custom-model"));
    assert_eq!(world.confidence.calls.count(), 0);
    assert_eq!(world.complexity.calls.count(), 0);
}

#[tokio::test]
async fn test_curated_context_uses_default_model() {
    let world = World::new();
    let mut ctx = context();
    let options = RouteOptions {
        curated_context: true,
        ..RouteOptions::default()
    };

    let decision = router(&world)
        .assess_and_route(&mut ctx, &scoped(), &options)
        .await
        .expect("route");

    assert_eq!(
        decision.selected_model.as_deref(),
        Some(ModelCatalog::default().default_model())
    );
    assert_eq!(world.confidence.calls.count(), 0);
}

#[tokio::test]
async fn test_override_skips_complexity() {
    let world = World::new();
    let mut ctx = context();
    let options = RouteOptions {
        model_override: Some("pinned".to_owned()),
        ..RouteOptions::default()
    };

    let decision = router(&world)
        .assess_and_route(&mut ctx, &scoped(), &options)
        .await
        .expect("route");

    assert_eq!(world.confidence.calls.count(), 1);
    assert_eq!(world.complexity.calls.count(), 0);
    assert_eq!(decision.selected_model.as_deref(), Some("pinned"));
}

#[tokio::test]
async fn test_manual_selection_pauses() {
    let world = World::new();
    let mut config = EngineConfig::default();
    config.confidence.model_selection = ModelSelectionMode::Manual;
    let mut ctx = context();

    let decision = ConfidenceRouter::new(world.capabilities(), &config)
        .assess_and_route(&mut ctx, &scoped(), &RouteOptions::default())
        .await
        .expect("route");

    assert!(!decision.should_continue);
    assert_eq!(decision.pause_reason, Some(PauseReason::NeedsModelSelection));
    assert!(ctx.model.is_none());
    assert_eq!(world.complexity.calls.count(), 0);
}

#[tokio::test]
async fn test_untracked_task_sends_no_notification() {
    let world = World::new();
    world
        .confidence
        .assessments
        .push(assessment(30, RecommendedAction::Clarify));
    let mut ctx = context();
    ctx.tracker_id = None;

    let decision = router(&world)
        .assess_and_route(&mut ctx, &scoped(), &RouteOptions::default())
        .await
        .expect("route");

    assert_eq!(decision.pause_reason, Some(PauseReason::LowConfidence));
    assert!(world.notifier.events.all().is_empty());
}
