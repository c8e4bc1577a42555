//! Complexity templates for sub-agent graphs.

use anvil_core::{AgentRole, BudgetMode, MergeStrategy, ModelCatalog, SubAgentNode, SubAgentPlan};

use crate::models::role_tier;

pub use anvil_core::MIN_SUB_AGENT_COMPLEXITY;
/// Complexity at which the graph gains a planner and merges with a model.
pub const PLANNED_GRAPH_COMPLEXITY: u8 = 8;
/// Complexity at which a documenter joins the graph.
pub const DOCUMENTED_GRAPH_COMPLEXITY: u8 = 10;

const fn system_prompt(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Planner => {
            "You are a planning specialist. Break the task into a concrete approach: \
             files to touch, interfaces to change and the order of work."
        }
        AgentRole::Implementer => {
            "You are an implementation specialist. Describe the exact code changes needed \
             to complete the task."
        }
        AgentRole::Tester => {
            "You are a testing specialist. Describe the tests that prove the task is done \
             and the edge cases they must cover."
        }
        AgentRole::Reviewer => {
            "You are a code reviewer. Point out risks, missing cases and conflicts with \
             the existing code in the proposed approach."
        }
        AgentRole::Documenter => {
            "You are a documentation specialist. Describe the documentation and comments \
             the change needs."
        }
    }
}

const fn max_tokens(role: AgentRole) -> u32 {
    match role {
        AgentRole::Implementer => 4_000,
        AgentRole::Tester | AgentRole::Planner => 3_000,
        AgentRole::Reviewer | AgentRole::Documenter => 2_000,
    }
}

fn node(
    role: AgentRole,
    input_context: &str,
    depends_on: &[&str],
    budget_mode: BudgetMode,
    catalog: &ModelCatalog,
) -> SubAgentNode {
    SubAgentNode {
        id: role.as_str().to_owned(),
        role,
        model: catalog.model_for(role_tier(role, budget_mode)).to_owned(),
        system_prompt: system_prompt(role).to_owned(),
        input_context: input_context.to_owned(),
        max_tokens: max_tokens(role),
        depends_on: depends_on.iter().map(|id| (*id).to_owned()).collect(),
    }
}

/// Builds the sub-agent graph for a task of the given complexity.
///
/// - below 5: no agents
/// - 5 to 7: independent implementer and tester, concatenated
/// - 8 to 9: planner, then implementer, tester and reviewer depending on it, merged by a model
/// - 10: as above plus a documenter
#[must_use]
pub fn plan_sub_agents(
    task: &str,
    plan_summary: &str,
    complexity: u8,
    budget_mode: BudgetMode,
    catalog: &ModelCatalog,
) -> SubAgentPlan {
    if complexity < MIN_SUB_AGENT_COMPLEXITY {
        return SubAgentPlan::empty();
    }

    let input = format!("Task:\n{task}\n\nPlan:\n{plan_summary}");

    if complexity < PLANNED_GRAPH_COMPLEXITY {
        return SubAgentPlan {
            agents: vec![
                node(AgentRole::Implementer, &input, &[], budget_mode, catalog),
                node(AgentRole::Tester, &input, &[], budget_mode, catalog),
            ],
            merge_strategy: MergeStrategy::Concatenate,
        };
    }

    let planner = AgentRole::Planner.as_str();
    let mut agents = vec![
        node(AgentRole::Planner, &input, &[], budget_mode, catalog),
        node(AgentRole::Implementer, &input, &[planner], budget_mode, catalog),
        node(AgentRole::Tester, &input, &[planner], budget_mode, catalog),
        node(AgentRole::Reviewer, &input, &[planner], budget_mode, catalog),
    ];
    if complexity >= DOCUMENTED_GRAPH_COMPLEXITY {
        agents.push(node(AgentRole::Documenter, &input, &[planner], budget_mode, catalog));
    }

    SubAgentPlan {
        agents,
        merge_strategy: MergeStrategy::AiMerge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(complexity: u8) -> SubAgentPlan {
        plan_sub_agents(
            "add pagination",
            "1. update query",
            complexity,
            BudgetMode::Balanced,
            &ModelCatalog::default(),
        )
    }

    fn roles(plan: &SubAgentPlan) -> Vec<AgentRole> {
        plan.agents.iter().map(|agent| agent.role).collect()
    }

    #[test]
    fn test_low_complexity_is_empty() {
        for complexity in 0..5 {
            let plan = plan(complexity);
            assert!(plan.is_empty());
            assert_eq!(plan.merge_strategy, MergeStrategy::Concatenate);
        }
    }

    #[test]
    fn test_medium_complexity_runs_independent_pair() {
        for complexity in 5..8 {
            let plan = plan(complexity);
            assert_eq!(roles(&plan), vec![AgentRole::Implementer, AgentRole::Tester]);
            assert!(plan.agents.iter().all(|agent| agent.depends_on.is_empty()));
            assert_eq!(plan.merge_strategy, MergeStrategy::Concatenate);
        }
    }

    #[test]
    fn test_high_complexity_hangs_off_planner() {
        for complexity in 8..10 {
            let plan = plan(complexity);
            let roots: Vec<_> = plan
                .agents
                .iter()
                .filter(|agent| agent.depends_on.is_empty())
                .collect();
            assert_eq!(roots.len(), 1);
            assert_eq!(roots[0].role, AgentRole::Planner);
            assert!(
                plan.agents
                    .iter()
                    .filter(|agent| agent.role != AgentRole::Planner)
                    .all(|agent| agent.depends_on == vec!["planner".to_owned()])
            );
            assert!(!roles(&plan).contains(&AgentRole::Documenter));
            assert_eq!(plan.merge_strategy, MergeStrategy::AiMerge);
        }
    }

    #[test]
    fn test_max_complexity_adds_documenter() {
        let plan = plan(10);
        assert_eq!(plan.agents.len(), 5);
        let documenter = plan
            .agents
            .iter()
            .find(|agent| agent.role == AgentRole::Documenter)
            .expect("documenter present");
        assert_eq!(documenter.depends_on, vec!["planner".to_owned()]);
    }

    #[test]
    fn test_models_follow_budget_mode() {
        let catalog = ModelCatalog::default();
        let plan = plan_sub_agents("task", "plan", 9, BudgetMode::AggressiveSave, &catalog);
        let planner = &plan.agents[0];
        assert_eq!(planner.model, catalog.balanced);
        assert!(plan.agents[1..].iter().all(|agent| agent.model == catalog.fast));
    }

    #[test]
    fn test_input_carries_task_and_plan() {
        let plan = plan(6);
        assert!(plan.agents[0].input_context.contains("add pagination"));
        assert!(plan.agents[0].input_context.contains("1. update query"));
    }
}
