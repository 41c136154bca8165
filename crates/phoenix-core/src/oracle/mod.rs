//! Selector Remediation Oracle
//!
//! When a configured selector stops matching the live page, the resolver
//! asks an oracle for a replacement: one request carrying the rendered
//! markup and the target key, one free-form text response narrowed by
//! prompt instruction to "selector string only".
//!
//! Implementations must not fail past this boundary: transport errors,
//! auth errors and unusable model output all collapse to `None`.

pub mod gemini;

pub use gemini::{GeminiConfig, GeminiOracle};

use async_trait::async_trait;

/// Hard cap on the number of markup characters sent with one proposal
/// request. Keeps request payloads bounded on pathological pages.
pub const MAX_SNAPSHOT_CHARS: usize = 50_000;

/// Natural-language descriptions for the target keys the missions use.
/// Unknown keys get no hint; the proposal is attempted anyway with reduced
/// accuracy.
const KEY_HINTS: &[(&str, &str)] = &[
    ("comment_body", "the comment text"),
    ("video_title", "the main video title"),
    ("post_title", "the reddit post title"),
    ("post_body", "the reddit post content"),
    ("new_notebook_btn", "the button to create a new notebook"),
    ("add_source_btn", "the button to add a source"),
    ("chat_input", "the main chat input text area"),
];

pub fn key_hint(key: &str) -> Option<&'static str> {
    KEY_HINTS
        .iter()
        .find(|(known, _)| *known == key)
        .map(|(_, hint)| *hint)
}

/// Proposes a replacement selector for a target that stopped matching.
///
/// One attempt per call; the resolver decides whether healing is retried
/// on a later resolution.
#[async_trait]
pub trait SelectorOracle: Send + Sync {
    /// Returns a non-empty selector string, or `None` when no remediation
    /// is possible. Never an empty string.
    async fn propose(&self, page_snapshot: &str, target_key: &str, platform: &str)
    -> Option<String>;
}

/// Cut the snapshot at a fixed character count, respecting char
/// boundaries. The truncation point is deterministic.
pub(crate) fn truncate_snapshot(html: &str, max_chars: usize) -> &str {
    match html.char_indices().nth(max_chars) {
        Some((idx, _)) => &html[..idx],
        None => html,
    }
}

pub(crate) fn build_prompt(snapshot: &str, target_key: &str, platform: &str) -> String {
    let mut prompt = format!(
        "You are a CSS selector expert.\n\
         The current CSS selector for '{target_key}' on {platform} is broken.\n\
         Analyze the following HTML snippet and provide the correct, most robust \
         CSS selector for '{target_key}'.\n"
    );
    if let Some(hint) = key_hint(target_key) {
        prompt.push_str(&format!("Target description: {hint}.\n"));
    }
    prompt.push_str(
        "Return only the CSS selector string. No markdown, no explanations.\n\
         \n\
         HTML snippet:\n",
    );
    prompt.push_str(snapshot);
    prompt
}
