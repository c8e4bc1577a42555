//! Best-effort side effects: tracker notifications, checkpoints and knowledge lookups.
//!
//! Failures here are logged and swallowed; they never change control flow.

use anvil_core::{Capabilities, ExecutionContext, Phase, Result, TrackerEvent};
use serde_json::{Value as JsonValue, json};

/// Sends a tracker event when the task is linked to a tracker and a notifier is configured.
pub async fn notify(capabilities: &Capabilities, ctx: &ExecutionContext, event: TrackerEvent) {
    let (Some(notifier), Some(tracker_id)) = (&capabilities.notifier, &ctx.tracker_id) else {
        return;
    };

    if let Err(error) = notifier.notify(tracker_id, event).await {
        tracing::warn!(
            task = %ctx.task_id,
            tracker_id = %tracker_id,
            %error,
            "tracker notification failed"
        );
    }
}

/// Writes a checkpoint for the current phase when a job handle and store are present.
pub async fn checkpoint(
    capabilities: &Capabilities,
    ctx: &ExecutionContext,
    snapshot: JsonValue,
    cost_delta: Option<f64>,
) {
    let (Some(store), Some(job)) = (&capabilities.checkpoints, &ctx.job) else {
        return;
    };

    if let Err(error) = store.write(job, ctx.phase, snapshot, cost_delta).await {
        tracing::warn!(task = %ctx.task_id, phase = %ctx.phase, %error, "checkpoint write failed");
    }
}

/// Strategy that worked for similar tasks, if any.
pub async fn strategy_hint(capabilities: &Capabilities, ctx: &ExecutionContext) -> Option<String> {
    let knowledge = capabilities.knowledge.as_ref()?;
    match knowledge.strategy_hint(&ctx.description).await {
        Ok(hint) => hint,
        Err(error) => {
            tracing::warn!(task = %ctx.task_id, %error, "strategy hint lookup failed");
            None
        }
    }
}

/// Error patterns previously seen for similar tasks; empty on failure.
pub async fn error_patterns(capabilities: &Capabilities, ctx: &ExecutionContext) -> Vec<String> {
    let Some(knowledge) = &capabilities.knowledge else {
        return Vec::new();
    };
    knowledge
        .error_patterns(&ctx.description)
        .await
        .unwrap_or_else(|error| {
            tracing::warn!(task = %ctx.task_id, %error, "error pattern lookup failed");
            Vec::new()
        })
}

/// Memory snippets for `query`; empty on failure.
pub async fn search_memories(
    capabilities: &Capabilities,
    ctx: &ExecutionContext,
    query: &str,
) -> Vec<String> {
    let Some(knowledge) = &capabilities.knowledge else {
        return Vec::new();
    };
    knowledge
        .search_memories(&ctx.repo, query)
        .await
        .unwrap_or_else(|error| {
            tracing::warn!(task = %ctx.task_id, %error, "memory search failed");
            Vec::new()
        })
}

/// Advances the phase and writes a best-effort checkpoint for it.
///
/// # Errors
/// Returns `InvalidTransition` when the move is not monotonic.
pub async fn advance(
    capabilities: &Capabilities,
    ctx: &mut ExecutionContext,
    next: Phase,
) -> Result<()> {
    ctx.advance(next)?;
    let snapshot = json!({
        "phase": next,
        "attempts": ctx.total_attempts,
        "model": ctx.model,
    });
    checkpoint(capabilities, ctx, snapshot, None).await;
    Ok(())
}
