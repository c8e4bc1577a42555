//! Tier registry for complexity-based model routing.
//!
//! Maps complexity scores (1-10) to model tiers, and sub-agent roles to tiers per
//! budget mode.
use anvil_core::{AgentRole, BudgetMode, EngineError, ModelCatalog, ModelTier, Result};
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// Complexity score from 1 (trivial) to 10 (hardest)
pub type ComplexityLevel = u8;

/// Registry of model tiers organized by complexity level.
#[derive(Clone, Debug, Default)]
pub struct TierRegistry {
    tiers: HashMap<ComplexityLevel, ModelTier>,
}

impl TierRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default mappings:
    /// - Complexity 1-3: fast tier
    /// - Complexity 4-7: balanced tier
    /// - Complexity 8-10: premium tier
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_range(1..=3, ModelTier::Fast);
        registry.register_range(4..=7, ModelTier::Balanced);
        registry.register_range(8..=10, ModelTier::Premium);
        registry
    }

    /// Registers a tier for a range of complexity levels; levels outside 1-10 are ignored.
    pub fn register_range(&mut self, range: RangeInclusive<ComplexityLevel>, tier: ModelTier) {
        for level in range.filter(|level| (1..=10).contains(level)) {
            self.tiers.insert(level, tier);
        }
    }

    /// Selects the tier for a complexity score.
    ///
    /// Scores are clamped to 1-10. Without an exact match the nearest higher level wins,
    /// then the highest registered level.
    ///
    /// # Errors
    /// Returns an error if no tiers are registered.
    pub fn select_tier(&self, complexity: ComplexityLevel) -> Result<ModelTier> {
        let level = complexity.clamp(1, 10);

        if let Some(tier) = self.tiers.get(&level) {
            return Ok(*tier);
        }

        let nearest_higher = self
            .tiers
            .iter()
            .filter(|(registered, _)| **registered >= level)
            .min_by_key(|(registered, _)| **registered)
            .map(|(_, tier)| *tier);

        nearest_higher
            .or_else(|| {
                self.tiers
                    .iter()
                    .max_by_key(|(registered, _)| **registered)
                    .map(|(_, tier)| *tier)
            })
            .ok_or_else(|| EngineError::Config("No tiers registered in TierRegistry".to_owned()))
    }

    /// Selects a concrete model for a complexity score.
    ///
    /// # Errors
    /// Returns an error if no tiers are registered.
    pub fn select_model(&self, complexity: ComplexityLevel, catalog: &ModelCatalog) -> Result<String> {
        let tier = self.select_tier(complexity)?;
        Ok(catalog.model_for(tier).to_owned())
    }
}

/// Tier a sub-agent role runs on under a budget mode.
#[must_use]
pub const fn role_tier(role: AgentRole, mode: BudgetMode) -> ModelTier {
    match (mode, role) {
        (BudgetMode::AggressiveSave, AgentRole::Planner)
        | (BudgetMode::Balanced, AgentRole::Implementer | AgentRole::Reviewer)
        | (BudgetMode::QualityFirst, AgentRole::Documenter) => ModelTier::Balanced,
        (
            BudgetMode::AggressiveSave,
            AgentRole::Implementer | AgentRole::Tester | AgentRole::Reviewer | AgentRole::Documenter,
        )
        | (BudgetMode::Balanced, AgentRole::Tester | AgentRole::Documenter) => ModelTier::Fast,
        (BudgetMode::Balanced, AgentRole::Planner)
        | (
            BudgetMode::QualityFirst,
            AgentRole::Planner | AgentRole::Implementer | AgentRole::Tester | AgentRole::Reviewer,
        ) => ModelTier::Premium,
    }
}
