//! Dependency-wave execution of a sub-agent graph.

use anvil_core::{SubAgentNode, SubAgentPlan, SubAgentResult, SubAgentRunner};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

type NodeJoinSet = JoinSet<SubAgentResult>;

/// Appends the successful output of `node`'s dependencies as labelled sections.
fn enrich(node: &mut SubAgentNode, results: &HashMap<String, SubAgentResult>) {
    for dependency in &node.depends_on {
        let Some(result) = results.get(dependency) else {
            continue;
        };
        if result.success {
            node.input_context.push_str(&format!(
                "\n\n## Output from {} ({})\n\n{}",
                result.role, result.id, result.output
            ));
        }
    }
}

fn spawn_node(
    join_set: &mut NodeJoinSet,
    runner: &Arc<dyn SubAgentRunner>,
    node: SubAgentNode,
) {
    let runner = Arc::clone(runner);
    join_set.spawn(async move {
        let start = Instant::now();
        let outcome = runner.run(&node).await;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(metered) => SubAgentResult {
                id: node.id,
                role: node.role,
                model: node.model,
                output: metered.value,
                cost_usd: metered.usage.cost_usd,
                tokens_used: metered.usage.tokens,
                duration_ms,
                success: true,
                error: None,
            },
            Err(error) => SubAgentResult::failure(&node, error.to_string(), duration_ms),
        }
    });
}

/// Runs the graph wave by wave.
///
/// Each wave runs every pending node whose dependencies have resolved, concurrently,
/// and waits for all of them. A failed node still resolves; its dependents run
/// without its output. If pending nodes remain but none are ready the graph is
/// deadlocked: the error is logged and the unreached nodes are absent from the
/// results, which are returned in plan order.
pub async fn execute_sub_agents(
    runner: &Arc<dyn SubAgentRunner>,
    plan: &SubAgentPlan,
) -> Vec<SubAgentResult> {
    let mut results: HashMap<String, SubAgentResult> = HashMap::new();
    let mut pending: Vec<SubAgentNode> = plan.agents.clone();
    let mut wave = 0_usize;

    while !pending.is_empty() {
        let (ready, blocked): (Vec<SubAgentNode>, Vec<SubAgentNode>) =
            pending.into_iter().partition(|node| {
                node.depends_on
                    .iter()
                    .all(|dependency| results.contains_key(dependency))
            });
        pending = blocked;

        if ready.is_empty() {
            let remaining: Vec<&str> = pending.iter().map(|node| node.id.as_str()).collect();
            tracing::error!(
                remaining = ?remaining,
                "sub-agent dependency deadlock: {} nodes pending but none can run",
                remaining.len()
            );
            break;
        }

        wave += 1;
        tracing::debug!(wave, nodes = ready.len(), "starting sub-agent wave");

        let mut join_set = NodeJoinSet::new();
        let mut spawned: HashMap<String, SubAgentNode> = HashMap::new();
        for mut node in ready {
            enrich(&mut node, &results);
            spawned.insert(node.id.clone(), node.clone());
            spawn_node(&mut join_set, runner, node);
        }

        let mut finished: HashSet<String> = HashSet::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => {
                    if let Some(error) = &result.error {
                        tracing::warn!(
                            id = %result.id,
                            role = %result.role,
                            %error,
                            "sub-agent failed"
                        );
                    }
                    finished.insert(result.id.clone());
                    results.insert(result.id.clone(), result);
                }
                Err(join_error) => {
                    tracing::warn!(%join_error, "sub-agent task aborted");
                }
            }
        }

        for (id, node) in spawned {
            if !finished.contains(&id) {
                let failure = SubAgentResult::failure(&node, "sub-agent task aborted", 0);
                results.insert(id, failure);
            }
        }
    }

    plan.agents
        .iter()
        .filter_map(|node| results.remove(&node.id))
        .collect()
}
