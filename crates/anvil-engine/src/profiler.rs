//! Phase-scoped, token-budgeted views of a context bundle.

use anvil_core::{ContextBundle, ScopedBundle, estimate_tokens};

/// Fields a phase needs and the token budget it may spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseProfile {
    /// Phase name the profile applies to
    pub phase: &'static str,
    /// Rendered tree string
    pub tree: bool,
    /// Flat path list
    pub tree_list: bool,
    /// Relevant files
    pub files: bool,
    /// Memory snippets
    pub memory: bool,
    /// Documentation snippets
    pub docs: bool,
    /// Tool descriptors
    pub tools: bool,
    /// Dependency manifest
    pub manifest: bool,
    /// Hard token budget
    pub budget_tokens: usize,
}

const PROFILES: [PhaseProfile; 5] = [
    PhaseProfile {
        phase: "confidence",
        tree: true,
        tree_list: false,
        files: true,
        memory: true,
        docs: true,
        tools: false,
        manifest: false,
        budget_tokens: 8_000,
    },
    PhaseProfile {
        phase: "planning",
        tree: true,
        tree_list: false,
        files: true,
        memory: true,
        docs: true,
        tools: true,
        manifest: true,
        budget_tokens: 24_000,
    },
    PhaseProfile {
        phase: "building",
        tree: false,
        tree_list: true,
        files: true,
        memory: true,
        docs: false,
        tools: true,
        manifest: true,
        budget_tokens: 32_000,
    },
    PhaseProfile {
        phase: "diagnosis",
        tree: false,
        tree_list: true,
        files: true,
        memory: false,
        docs: false,
        tools: false,
        manifest: false,
        budget_tokens: 12_000,
    },
    PhaseProfile {
        phase: "review",
        tree: true,
        tree_list: false,
        files: true,
        memory: false,
        docs: true,
        tools: false,
        manifest: false,
        budget_tokens: 16_000,
    },
];

/// Profile registered for a phase name.
#[must_use]
pub fn profile_for(phase: &str) -> Option<&'static PhaseProfile> {
    PROFILES.iter().find(|profile| profile.phase == phase)
}

/// Narrows `bundle` to what `phase` needs and trims it into the phase budget.
///
/// Trimming order: drop docs, drop memories one at a time, drop trailing files down to
/// one, hard-truncate the tree string, then drop trailing paths from the tree list.
/// A non-empty tree keeps at least its first character and the tree list keeps its
/// first path. Unknown phases pass through unfiltered.
#[must_use]
pub fn filter_for_phase(bundle: &ContextBundle, phase: &str) -> ScopedBundle {
    let Some(profile) = profile_for(phase) else {
        tracing::warn!(phase, "no context profile for phase, passing bundle through unfiltered");
        return ScopedBundle::passthrough(bundle.clone());
    };

    let mut scoped = select_fields(bundle, profile);
    let budget = profile.budget_tokens;

    if scoped.estimated_tokens() > budget && !scoped.docs.is_empty() {
        scoped.docs.clear();
    }

    while scoped.estimated_tokens() > budget && !scoped.memories.is_empty() {
        scoped.memories.pop();
    }

    while scoped.estimated_tokens() > budget && scoped.files.len() > 1 {
        scoped.files.pop();
    }

    let overflow_tokens = scoped.estimated_tokens().saturating_sub(budget);
    if overflow_tokens > 0 && !scoped.tree.is_empty() {
        let tree_chars = scoped.tree.chars().count();
        let keep = tree_chars.saturating_sub(overflow_tokens * 4).max(1);
        scoped.tree = scoped.tree.chars().take(keep).collect();
    }

    let mut chars = scoped.char_count();
    while estimate_tokens(chars) > budget && scoped.tree_list.len() > 1 {
        if let Some(path) = scoped.tree_list.pop() {
            chars = chars.saturating_sub(path.chars().count() + 1);
        }
    }

    let estimated_tokens = scoped.estimated_tokens();
    if estimated_tokens > budget {
        tracing::debug!(
            phase,
            estimated_tokens,
            budget,
            "context still over budget after trimming"
        );
    }

    ScopedBundle {
        phase: Some(profile.phase.to_owned()),
        bundle: scoped,
        estimated_tokens,
        budget_tokens: Some(budget),
        unfiltered: false,
        empty_repo: bundle.is_empty_repo(),
    }
}

fn select_fields(bundle: &ContextBundle, profile: &PhaseProfile) -> ContextBundle {
    ContextBundle {
        tree: if profile.tree {
            bundle.tree.clone()
        } else {
            String::new()
        },
        tree_list: if profile.tree_list {
            bundle.tree_list.clone()
        } else {
            Vec::new()
        },
        manifest: if profile.manifest {
            bundle.manifest.clone()
        } else {
            None
        },
        files: if profile.files {
            bundle.files.clone()
        } else {
            Vec::new()
        },
        memories: if profile.memory {
            bundle.memories.clone()
        } else {
            Vec::new()
        },
        docs: if profile.docs {
            bundle.docs.clone()
        } else {
            Vec::new()
        },
        tools: if profile.tools {
            bundle.tools.clone()
        } else {
            Vec::new()
        },
    }
}
