//! Sub-agent graph types.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Specialization of a sub-agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Breaks the task into an approach
    Planner,
    /// Writes the code
    Implementer,
    /// Writes tests
    Tester,
    /// Reviews the approach
    Reviewer,
    /// Writes documentation
    Documenter,
}

impl AgentRole {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Implementer => "implementer",
            Self::Tester => "tester",
            Self::Reviewer => "reviewer",
            Self::Documenter => "documenter",
        }
    }
}

impl Display for AgentRole {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter.write_str(self.as_str())
    }
}

/// Cost / quality trade-off used when picking sub-agent models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetMode {
    /// Cheapest models everywhere it is tolerable
    AggressiveSave,
    /// Mix of cheap and capable models
    #[default]
    Balanced,
    /// Most capable models for every role
    QualityFirst,
}

/// Model price/quality class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Small, fast, cheap
    Fast,
    /// General purpose
    Balanced,
    /// Most capable
    Premium,
}

/// How successful sub-agent outputs are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Join outputs under role headers
    Concatenate,
    /// Ask a cheap model to deduplicate and organize
    AiMerge,
}

/// One node of the sub-agent graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAgentNode {
    /// Node identifier, unique within a plan
    pub id: String,
    /// Specialization
    pub role: AgentRole,
    /// Model identifier
    pub model: String,
    /// Role instructions
    pub system_prompt: String,
    /// Task input, enriched with dependency output before execution
    pub input_context: String,
    /// Output token cap
    pub max_tokens: u32,
    /// Nodes whose output this node consumes
    pub depends_on: Vec<String>,
}

/// Outcome of running one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAgentResult {
    /// Node identifier
    pub id: String,
    /// Specialization
    pub role: AgentRole,
    /// Model identifier
    pub model: String,
    /// Generated output, empty on failure
    pub output: String,
    /// Cost in USD
    pub cost_usd: f64,
    /// Tokens consumed
    pub tokens_used: u64,
    /// Wall-clock duration
    pub duration_ms: u64,
    /// Whether the node produced output
    pub success: bool,
    /// Failure description
    pub error: Option<String>,
}

impl SubAgentResult {
    /// A failed result for `node`.
    #[must_use]
    pub fn failure(node: &SubAgentNode, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            id: node.id.clone(),
            role: node.role,
            model: node.model.clone(),
            output: String::new(),
            cost_usd: 0.0,
            tokens_used: 0,
            duration_ms,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Sub-agent graph plus merge strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAgentPlan {
    /// Nodes in template order
    pub agents: Vec<SubAgentNode>,
    /// How outputs are combined
    pub merge_strategy: MergeStrategy,
}

impl SubAgentPlan {
    /// A plan with no nodes.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            agents: Vec::new(),
            merge_strategy: MergeStrategy::Concatenate,
        }
    }

    /// Whether there is nothing to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
