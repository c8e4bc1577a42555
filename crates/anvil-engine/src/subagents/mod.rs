//! Sub-agent fan-out: graph templates, wave scheduling and output merging.

mod merge;
mod plan;
mod scheduler;

pub use merge::{AI_MERGE_INSTRUCTION, concatenate_results, merge_results};
pub use plan::{
    DOCUMENTED_GRAPH_COMPLEXITY, MIN_SUB_AGENT_COMPLEXITY, PLANNED_GRAPH_COMPLEXITY,
    plan_sub_agents,
};
pub use scheduler::execute_sub_agents;

use anvil_core::{
    BudgetMode, MergeCapability, MergeStrategy, Metered, ModelCatalog, SubAgentPlan,
    SubAgentResult, SubAgentRunner, Usage,
};
use std::sync::Arc;

/// Plans, runs and merges sub-agents.
#[derive(Clone)]
pub struct SubAgentScheduler {
    runner: Arc<dyn SubAgentRunner>,
    merger: Arc<dyn MergeCapability>,
    catalog: ModelCatalog,
}

impl SubAgentScheduler {
    /// Creates a scheduler resolving models through `catalog`.
    #[must_use]
    pub fn new(
        runner: Arc<dyn SubAgentRunner>,
        merger: Arc<dyn MergeCapability>,
        catalog: ModelCatalog,
    ) -> Self {
        Self {
            runner,
            merger,
            catalog,
        }
    }

    /// Builds the graph for a task.
    #[must_use]
    pub fn plan(
        &self,
        task: &str,
        plan_summary: &str,
        complexity: u8,
        budget_mode: BudgetMode,
    ) -> SubAgentPlan {
        plan_sub_agents(task, plan_summary, complexity, budget_mode, &self.catalog)
    }

    /// Runs the graph in dependency waves; see [`execute_sub_agents`].
    pub async fn execute_sub_agents(&self, plan: &SubAgentPlan) -> Vec<SubAgentResult> {
        execute_sub_agents(&self.runner, plan).await
    }

    /// Merges results with the fast-tier model; see [`merge_results`].
    pub async fn merge_results(
        &self,
        results: &[SubAgentResult],
        strategy: MergeStrategy,
    ) -> Metered<String> {
        merge_results(self.merger.as_ref(), &self.catalog.fast, results, strategy).await
    }

    /// Plans, executes and merges in one go.
    ///
    /// The returned usage covers every node plus the merge call. An empty string means
    /// no agent produced output.
    pub async fn run(
        &self,
        task: &str,
        plan_summary: &str,
        complexity: u8,
        budget_mode: BudgetMode,
    ) -> Metered<String> {
        let plan = self.plan(task, plan_summary, complexity, budget_mode);
        if plan.is_empty() {
            return Metered::free(String::new());
        }

        let results = self.execute_sub_agents(&plan).await;
        let mut usage = results.iter().fold(Usage::default(), |mut total, result| {
            total += Usage::new(result.cost_usd, result.tokens_used);
            total
        });

        let merged = self.merge_results(&results, plan.merge_strategy).await;
        usage += merged.usage;

        tracing::info!(
            agents = plan.agents.len(),
            completed = results.len(),
            succeeded = results.iter().filter(|result| result.success).count(),
            merged_chars = merged.value.len(),
            "sub-agents finished"
        );

        Metered::new(merged.value, usage)
    }
}
