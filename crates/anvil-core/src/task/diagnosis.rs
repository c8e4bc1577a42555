use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Root-cause classification of a validation failure.
///
/// Serialized as its snake-case tag; unknown tags round-trip through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RootCause {
    /// The plan itself is wrong
    BadPlan,
    /// The plan is fine but the code is wrong
    ImplementationError,
    /// The attempt lacked repository context
    MissingContext,
    /// The task cannot be done
    ImpossibleTask,
    /// The sandbox or toolchain misbehaved
    EnvironmentError,
    /// Anything the diagnoser invented
    Other(String),
}

impl RootCause {
    /// Wire tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::BadPlan => "bad_plan",
            Self::ImplementationError => "implementation_error",
            Self::MissingContext => "missing_context",
            Self::ImpossibleTask => "impossible_task",
            Self::EnvironmentError => "environment_error",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for RootCause {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "bad_plan" => Self::BadPlan,
            "implementation_error" => Self::ImplementationError,
            "missing_context" => Self::MissingContext,
            "impossible_task" => Self::ImpossibleTask,
            "environment_error" => Self::EnvironmentError,
            _ => Self::Other(tag),
        }
    }
}

impl From<RootCause> for String {
    fn from(cause: RootCause) -> Self {
        cause.as_str().to_owned()
    }
}

impl Display for RootCause {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter.write_str(self.as_str())
    }
}

/// Recovery hint attached to a diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SuggestedAction {
    /// Patch the generated code
    FixCode,
    /// Free-form hint
    Other(String),
}

impl From<String> for SuggestedAction {
    fn from(tag: String) -> Self {
        if tag == "fix_code" {
            Self::FixCode
        } else {
            Self::Other(tag)
        }
    }
}

impl From<SuggestedAction> for String {
    fn from(action: SuggestedAction) -> Self {
        match action {
            SuggestedAction::FixCode => "fix_code".to_owned(),
            SuggestedAction::Other(tag) => tag,
        }
    }
}

/// Structured diagnosis of one failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Classified root cause
    pub root_cause: RootCause,
    /// Explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Recovery hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<SuggestedAction>,
}

impl Diagnosis {
    /// Creates a diagnosis with only a root cause.
    #[must_use]
    pub fn new(root_cause: RootCause) -> Self {
        Self {
            root_cause,
            reason: None,
            suggested_action: None,
        }
    }

    /// Sets the reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets the suggested action.
    #[must_use]
    pub fn with_suggested_action(mut self, action: SuggestedAction) -> Self {
        self.suggested_action = Some(action);
        self
    }

    /// Whether the diagnoser asked for a code fix.
    #[must_use]
    pub fn suggests_fix_code(&self) -> bool {
        matches!(self.suggested_action, Some(SuggestedAction::FixCode))
    }
}
