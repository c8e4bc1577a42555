//! Delta-context compression for retries.
//!
//! Instead of resending full files after a failed attempt, the next planning call gets
//! only what changed since the previous attempt plus truncated error text.

use anvil_core::{
    ChangedFile, Diagnosis, ExecutionContext, RetryContext, estimate_tokens, truncate_chars,
};
use std::collections::HashMap;

/// Sentinel returned when two texts have no line-level differences.
pub const NO_CHANGES: &str = "[no changes detected]";
/// Marker prefixed to files absent from the previous snapshot.
pub const NEW_FILE_MARKER: &str = "[NEW FILE]";

const MAX_DIFF_ENTRIES: usize = 20;
const MAX_DIFF_CHARS: usize = 500;
const NEW_FILE_PREVIEW_CHARS: usize = 500;
const TASK_SUMMARY_CHARS: usize = 200;
const LAST_ERROR_CHARS: usize = 1000;

/// Line-indexed comparison of two texts.
///
/// Emits `+n: line` for added lines, `-n: line` for removed lines and `~n: line` for
/// changed lines (1-based), skipping unchanged lines. Texts are split on every `\n`, so a
/// trailing newline counts as an empty final line. At most 20 entries are kept and
/// the joined output is capped at 500 characters.
#[must_use]
pub fn compute_simple_diff(old: &str, new: &str) -> String {
    let old_lines: Vec<&str> = old.split('\n').collect();
    let new_lines: Vec<&str> = new.split('\n').collect();
    let line_count = old_lines.len().max(new_lines.len());

    let entries: Vec<String> = (0..line_count)
        .filter_map(|index| {
            let number = index + 1;
            match (old_lines.get(index), new_lines.get(index)) {
                (None, Some(added)) => Some(format!("+{number}: {added}")),
                (Some(removed), None) => Some(format!("-{number}: {removed}")),
                (Some(before), Some(after)) if before != after => {
                    Some(format!("~{number}: {after}"))
                }
                _ => None,
            }
        })
        .take(MAX_DIFF_ENTRIES)
        .collect();

    if entries.is_empty() {
        return NO_CHANGES.to_owned();
    }

    truncate_chars(&entries.join("\n"), MAX_DIFF_CHARS)
}

/// Builds the compressed payload for the next planning call after a failed attempt.
///
/// Files are reported in path order. Unchanged files are omitted, files missing from
/// `previous` are sent as a `[NEW FILE]` preview, everything else as a line diff.
#[must_use]
pub fn compute_retry_context(
    ctx: &ExecutionContext,
    current: &HashMap<String, String>,
    previous: &HashMap<String, String>,
    plan_summary: &str,
    validation_output: &str,
    diagnosis: &Diagnosis,
) -> RetryContext {
    let task_summary = truncate_chars(&ctx.description, TASK_SUMMARY_CHARS);
    let last_error = truncate_chars(validation_output, LAST_ERROR_CHARS);

    let mut paths: Vec<&String> = current.keys().collect();
    paths.sort();

    let changed_files: Vec<ChangedFile> = paths
        .into_iter()
        .filter_map(|path| {
            let content = current.get(path)?;
            let diff = match previous.get(path) {
                None => {
                    let preview: String = content.chars().take(NEW_FILE_PREVIEW_CHARS).collect();
                    format!("{NEW_FILE_MARKER}\n{preview}")
                }
                Some(before) if before == content => return None,
                Some(before) => compute_simple_diff(before, content),
            };
            Some(ChangedFile {
                path: path.clone(),
                diff,
            })
        })
        .collect();

    let diagnosis_chars = serde_json::to_string(diagnosis).map_or(0, |json| json.chars().count());
    let diff_chars: usize = changed_files
        .iter()
        .map(|file| file.path.chars().count() + file.diff.chars().count())
        .sum();
    let total_chars = task_summary.chars().count()
        + plan_summary.chars().count()
        + last_error.chars().count()
        + diff_chars
        + diagnosis_chars;

    RetryContext {
        task_summary,
        plan_summary: plan_summary.to_owned(),
        last_error,
        diagnosis: diagnosis.clone(),
        attempt: ctx.total_attempts,
        changed_files,
        estimated_tokens: estimate_tokens(total_chars),
    }
}
