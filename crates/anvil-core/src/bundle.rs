//! Context bundles handed to capabilities.

use serde::{Deserialize, Serialize};

use crate::types::estimate_tokens;

/// A repository file selected as relevant to the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    /// Repository-relative path
    pub path: String,
    /// File content
    pub content: String,
}

impl FileContent {
    /// Creates a file entry.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// A tool the build capability may call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name
    pub name: String,
    /// What the tool does
    pub description: String,
}

/// Everything the context component gathered for a task.
///
/// Files are ordered by relevance, most relevant first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBundle {
    /// Rendered project tree
    pub tree: String,
    /// Flat list of repository paths
    pub tree_list: Vec<String>,
    /// Dependency manifest (Cargo.toml, package.json, ...)
    pub manifest: Option<String>,
    /// Relevant files
    pub files: Vec<FileContent>,
    /// Long-term memory snippets
    pub memories: Vec<String>,
    /// Documentation snippets
    pub docs: Vec<String>,
    /// Discovered tools
    pub tools: Vec<ToolDescriptor>,
}

impl ContextBundle {
    /// Whether the repository has no files at all.
    #[must_use]
    pub fn is_empty_repo(&self) -> bool {
        self.tree.trim().is_empty() && self.tree_list.is_empty()
    }

    /// Total characters across every textual field.
    #[must_use]
    pub fn char_count(&self) -> usize {
        let tree_list: usize = self.tree_list.iter().map(|path| path.chars().count() + 1).sum();
        let files: usize = self
            .files
            .iter()
            .map(|file| file.path.chars().count() + file.content.chars().count())
            .sum();
        let memories: usize = self.memories.iter().map(|memory| memory.chars().count()).sum();
        let docs: usize = self.docs.iter().map(|doc| doc.chars().count()).sum();
        let tools: usize = self
            .tools
            .iter()
            .map(|tool| tool.name.chars().count() + tool.description.chars().count())
            .sum();
        let manifest = self.manifest.as_ref().map_or(0, |text| text.chars().count());

        self.tree.chars().count() + tree_list + files + memories + docs + tools + manifest
    }

    /// Estimated token size (four characters per token).
    #[must_use]
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(self.char_count())
    }
}

/// A bundle narrowed for one phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedBundle {
    /// Phase profile applied, `None` when unfiltered
    pub phase: Option<String>,
    /// The narrowed bundle
    pub bundle: ContextBundle,
    /// Token estimate after trimming
    pub estimated_tokens: usize,
    /// Token budget of the profile
    pub budget_tokens: Option<usize>,
    /// True when no profile matched and the bundle passed through untouched
    pub unfiltered: bool,
    /// Emptiness of the repository the bundle was scoped from, before any filtering
    pub empty_repo: bool,
}

impl ScopedBundle {
    /// Wraps a bundle without filtering it.
    #[must_use]
    pub fn passthrough(bundle: ContextBundle) -> Self {
        Self {
            phase: None,
            estimated_tokens: bundle.estimated_tokens(),
            empty_repo: bundle.is_empty_repo(),
            bundle,
            budget_tokens: None,
            unfiltered: true,
        }
    }
}
