//! Combining sub-agent output into one context block.

use anvil_core::{MergeCapability, MergeStrategy, Metered, SubAgentResult};

/// Instruction sent to the merge model ahead of the sub-agent outputs.
pub const AI_MERGE_INSTRUCTION: &str = "Merge the following sub-agent outputs into a single \
     coherent context for the implementation step. Remove duplicated information, resolve \
     contradictions in favour of the most specific advice and organize the result by topic.";

const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// Joins successful outputs under `## Sub-agent: {role} ({model})` headers.
#[must_use]
pub fn concatenate_results(results: &[SubAgentResult]) -> String {
    results
        .iter()
        .filter(|result| result.success)
        .map(|result| {
            format!(
                "## Sub-agent: {} ({})\n\n{}",
                result.role, result.model, result.output
            )
        })
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR)
}

/// Merges successful results; failures are dropped and zero successes yield an empty
/// string.
///
/// `AiMerge` asks `merge_model` to deduplicate and falls back to plain concatenation
/// when that call fails.
pub async fn merge_results(
    merger: &dyn MergeCapability,
    merge_model: &str,
    results: &[SubAgentResult],
    strategy: MergeStrategy,
) -> Metered<String> {
    if !results.iter().any(|result| result.success) {
        return Metered::free(String::new());
    }

    let concatenated = concatenate_results(results);
    if strategy == MergeStrategy::Concatenate {
        return Metered::free(concatenated);
    }

    let prompt = format!("{AI_MERGE_INSTRUCTION}\n\n{concatenated}");
    match merger.merge(merge_model, &prompt).await {
        Ok(merged) => merged,
        Err(error) => {
            tracing::warn!(%error, "sub-agent merge failed, falling back to concatenation");
            Metered::free(concatenated)
        }
    }
}
