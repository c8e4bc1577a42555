//! Configuration for retries, confidence routing, sub-agents and model selection.

use crate::agents::{BudgetMode, ModelTier};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete engine configuration.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Retry loop budgets
    pub retry: RetryConfig,
    /// Confidence gate
    pub confidence: ConfidenceConfig,
    /// Sub-agent fan-out
    pub sub_agents: SubAgentConfig,
    /// Model identifiers per tier
    pub models: ModelCatalog,
    /// Review gate
    pub review: ReviewConfig,
}

/// Retry loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Build attempts per task
    pub max_attempts: u32,
    /// Plan revisions allowed on `bad_plan`
    pub max_plan_revisions: u32,
    /// Wait before retrying after an environment error
    pub environment_backoff_secs: u64,
    /// Cap on the code excerpt sent to the diagnoser
    pub diagnosis_excerpt_chars: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_plan_revisions: 2,
            environment_backoff_secs: 30,
            diagnosis_excerpt_chars: 8_000,
        }
    }
}

impl RetryConfig {
    /// Backoff as a duration.
    #[must_use]
    pub const fn environment_backoff(&self) -> Duration {
        Duration::from_secs(self.environment_backoff_secs)
    }
}

/// How the execution model is chosen once a task passes the confidence gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSelectionMode {
    /// Score complexity and map it to a tier
    #[default]
    Auto,
    /// Pause until the operator picks a model
    Manual,
}

/// Confidence gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Assessments below this pause for clarification
    pub proceed_threshold: u8,
    /// Assessments below this suggest a breakdown
    pub breakdown_threshold: u8,
    /// Model selection mode
    pub model_selection: ModelSelectionMode,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            proceed_threshold: 90,
            breakdown_threshold: 75,
            model_selection: ModelSelectionMode::Auto,
        }
    }
}

/// Lowest estimated complexity at which sub-agents are ever used.
pub const MIN_SUB_AGENT_COMPLEXITY: u8 = 5;

/// Sub-agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubAgentConfig {
    /// Whether sub-agents may be used at all
    pub enabled: bool,
    /// Estimated complexity at which sub-agents kick in
    pub min_complexity: u8,
    /// Default budget mode
    pub budget_mode: BudgetMode,
}

impl Default for SubAgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_complexity: MIN_SUB_AGENT_COMPLEXITY,
            budget_mode: BudgetMode::Balanced,
        }
    }
}

/// Model identifiers for each tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelCatalog {
    /// Small, fast, cheap model
    pub fast: String,
    /// General purpose model
    pub balanced: String,
    /// Most capable model
    pub premium: String,
    /// Tier used when nothing else decides
    pub default_tier: ModelTier,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            fast: "llama-3.1-8b-instant".to_owned(),
            balanced: "qwen2.5-32b-coder-preview".to_owned(),
            premium: "deepseek/deepseek-chat".to_owned(),
            default_tier: ModelTier::Balanced,
        }
    }
}

impl ModelCatalog {
    /// Model identifier for a tier.
    #[must_use]
    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.fast,
            ModelTier::Balanced => &self.balanced,
            ModelTier::Premium => &self.premium,
        }
    }

    /// Model identifier for the default tier.
    #[must_use]
    pub fn default_model(&self) -> &str {
        self.model_for(self.default_tier)
    }
}

/// Review gate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// End successful tasks in `pending_review` instead of `completed`
    pub require_review: bool,
}

impl EngineConfig {
    /// Get the default config directory path (`~/.anvil`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".anvil"))
    }

    /// Get the default config file path (`~/.anvil/config.toml`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from the default location, creating it with defaults if missing.
    ///
    /// # Errors
    /// Returns an error if the config cannot be read or created
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            let config = Self::default();
            config.save_to_file(&config_path)?;
            Ok(config)
        }
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        tracing::debug!(
            "Loaded config from {:?}: max_attempts={}, sub_agents_enabled={}",
            path,
            config.retry.max_attempts,
            config.sub_agents.enabled
        );

        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        let header = "# Anvil Configuration File\n\
                      # This file is automatically generated on first run\n\
                      # Edit this file to customize your settings\n\n";

        fs::write(path, format!("{header}{contents}"))?;
        Ok(())
    }

    /// Rejects budgets the engine cannot run with.
    ///
    /// # Errors
    /// Returns `Config` when a budget or threshold is out of range
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(EngineError::Config(
                "retry.max_attempts must be at least 1".to_owned(),
            ));
        }
        if self.confidence.proceed_threshold > 100 || self.confidence.breakdown_threshold > 100 {
            return Err(EngineError::Config(
                "confidence thresholds must be between 0 and 100".to_owned(),
            ));
        }
        if !(MIN_SUB_AGENT_COMPLEXITY..=10).contains(&self.sub_agents.min_complexity) {
            return Err(EngineError::Config(format!(
                "sub_agents.min_complexity must be between {MIN_SUB_AGENT_COMPLEXITY} and 10"
            )));
        }
        Ok(())
    }
}
