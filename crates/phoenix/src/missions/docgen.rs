//! Idea-to-document pipeline against the notebook web app.
//!
//! Walkthrough: inject auth cookies, create a notebook, paste the idea in
//! as a text source, ask the notebook chat for a PRD, then save the
//! response as Markdown. The three stable controls (new notebook, add
//! source, chat input) go through the healing resolver; the transient
//! dialog controls use short fallback-selector sweeps since they have no
//! durable entry in the selector table.

use anyhow::{Context, bail};
use phoenix_browser::{Element, StealthSession, cookies};
use phoenix_core::oracle::SelectorOracle;
use phoenix_core::resolver::{Resolution, Resolver};
use phoenix_core::session::PageSession;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

const NOTEBOOK_URL: &str = "https://notebooklm.google.com";

/// How long the model is given before the response is read back.
const GENERATION_WAIT: Duration = Duration::from_secs(60);

/// Bounded wait for each transient dialog control.
const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Responses shorter than this are treated as chrome text, not the
/// generated document.
const MIN_RESPONSE_CHARS: usize = 100;

const PASTE_TEXT_OPTIONS: &[&str] = &[
    "[data-testid='paste-text-option']",
    "button[aria-label*='Paste']",
    "button[aria-label*='paste']",
];

const SOURCE_TEXTAREAS: &[&str] = &[
    "textarea[placeholder*='text']",
    ".source-text-input textarea",
    "textarea",
];

const CONFIRM_BUTTONS: &[&str] = &[
    "[data-testid='insert-source-button']",
    "button[aria-label*='Insert']",
    "button[type='submit']",
];

const RESPONSE_AREAS: &[&str] = &[
    ".response-text",
    ".chat-response",
    "[data-testid='response']",
    ".message-content",
];

const REPORT_PROMPT: &str = "Based on the sources above, write a detailed Product Requirements \
     Document. Cover the product overview, target users, core MVP features with priorities, \
     recommended tech stack, revenue model, competitor analysis, development roadmap, success \
     metrics and risks.";

pub struct DocgenRequest {
    pub idea: String,
    pub title: Option<String>,
    pub pain_points_file: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub auth_path: Option<PathBuf>,
}

pub async fn run<O: SelectorOracle>(
    session: &StealthSession,
    resolver: &Resolver<O>,
    request: DocgenRequest,
) -> anyhow::Result<()> {
    let auth_path = request.auth_path.unwrap_or_else(cookies::default_auth_path);
    let stored = cookies::load_auth_cookies(&auth_path).await?;
    cookies::apply(session.page(), &stored).await?;

    session.goto(NOTEBOOK_URL).await?;
    session
        .random_delay(Duration::from_secs(2), Duration::from_secs(4))
        .await;

    let current = session.url().await?;
    if current.contains("accounts.google.com") {
        bail!("login required; auth cookies have expired, re-run `npx notebooklm-mcp-server auth`");
    }
    info!(url = %current, "notebook site reached");

    let title = request
        .title
        .unwrap_or_else(|| trimmed_title(&request.idea));
    let pain_points = match &request.pain_points_file {
        Some(path) => load_pain_points(path).await?,
        None => Vec::new(),
    };
    let source = format_idea_as_source(&request.idea, &pain_points);

    // Create a notebook.
    click_resolved(session, resolver, "new_notebook_btn").await?;
    session
        .random_delay(Duration::from_secs(1), Duration::from_secs(2))
        .await;
    let notebook_url = session.url().await?;
    info!(url = %notebook_url, "notebook created");

    // Paste the idea in as a text source.
    click_resolved(session, resolver, "add_source_btn").await?;
    click_fallback(session, PASTE_TEXT_OPTIONS, "paste-text option").await?;
    let area = find_fallback(session, SOURCE_TEXTAREAS, "source text area").await?;
    area.click().await?;
    area.type_str(&source).await?;
    info!(chars = source.len(), "source text entered");
    click_fallback(session, CONFIRM_BUTTONS, "insert button").await?;
    session
        .random_delay(Duration::from_secs(3), Duration::from_secs(5))
        .await;

    // Ask for the document.
    let chat = resolve_handle(session, resolver, "chat_input").await?;
    chat.click().await?;
    chat.type_str(REPORT_PROMPT).await?;
    chat.press_key("Enter").await?;
    info!(wait_secs = GENERATION_WAIT.as_secs(), "document requested, waiting for generation");
    tokio::time::sleep(GENERATION_WAIT).await;

    let text = extract_response(session).await.unwrap_or_else(|| {
        warn!("could not extract the generated document; saving a pointer instead");
        format!("Document text could not be extracted; open the notebook directly: {notebook_url}")
    });

    let path = save_plan(&request.output_dir, &title, &notebook_url, &text).await?;
    println!("Document saved to {}", path.display());
    println!("Notebook: {notebook_url}");
    Ok(())
}

/// Resolve a notebook control through the healing resolver; on failure,
/// freeze what the page looked like for offline diagnosis.
async fn resolve_handle<O: SelectorOracle>(
    session: &StealthSession,
    resolver: &Resolver<O>,
    key: &str,
) -> anyhow::Result<Element> {
    match resolver.resolve(session, "notebooklm", key).await {
        Resolution::Matched(element) => Ok(element),
        Resolution::Failed(failure) => {
            if let Ok(bytes) = session.screenshot().await {
                let shot = std::env::temp_dir().join("phoenix-docgen-debug.png");
                if tokio::fs::write(&shot, bytes).await.is_ok() {
                    warn!(path = %shot.display(), "saved debug screenshot");
                }
            }
            bail!("{failure}")
        }
    }
}

async fn click_resolved<O: SelectorOracle>(
    session: &StealthSession,
    resolver: &Resolver<O>,
    key: &str,
) -> anyhow::Result<()> {
    resolve_handle(session, resolver, key).await?.click().await?;
    Ok(())
}

/// Try each candidate selector in order with a short wait.
async fn find_fallback(
    session: &StealthSession,
    candidates: &[&str],
    what: &str,
) -> anyhow::Result<Element> {
    for selector in candidates {
        if let Ok(element) = session.match_first(selector, STEP_TIMEOUT).await {
            info!(selector, what, "control found");
            return Ok(element);
        }
    }
    bail!("no candidate selector matched for {what}")
}

async fn click_fallback(
    session: &StealthSession,
    candidates: &[&str],
    what: &str,
) -> anyhow::Result<()> {
    find_fallback(session, candidates, what).await?.click().await?;
    Ok(())
}

/// Last sufficiently long chat response on the page, if any.
async fn extract_response(session: &StealthSession) -> Option<String> {
    for selector in RESPONSE_AREAS {
        let Ok(elements) = session.find_all(selector).await else {
            continue;
        };
        let Some(last) = elements.last() else {
            continue;
        };
        if let Ok(Some(text)) = last.inner_text().await
            && text.len() > MIN_RESPONSE_CHARS
        {
            info!(selector, chars = text.len(), "document extracted");
            return Some(text);
        }
    }
    None
}

fn trimmed_title(idea: &str) -> String {
    const MAX: usize = 50;
    if idea.chars().count() > MAX {
        let cut: String = idea.chars().take(MAX).collect();
        format!("{cut}...")
    } else {
        idea.to_string()
    }
}

fn format_idea_as_source(idea: &str, pain_points: &[String]) -> String {
    let mut content = format!("# Product Planning Request\n\n## Core Idea\n{idea}\n\n");
    if !pain_points.is_empty() {
        content.push_str("## Collected User Pain Points\n");
        for (i, point) in pain_points.iter().enumerate() {
            content.push_str(&format!("{}. {}\n", i + 1, point));
        }
        content.push('\n');
    }
    content.push_str(
        "## Requested Document\n\n\
         Write a detailed PRD covering: product overview, target users, core MVP features \
         with priorities, recommended tech stack, revenue model, competitor analysis, \
         development roadmap, success metrics, risk analysis and an early marketing strategy.\n",
    );
    content
}

/// Accepts either a bare JSON array of strings or an object with a
/// `pain_points` array.
async fn load_pain_points(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read pain points from {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    let items = match &value {
        serde_json::Value::Array(items) => items.clone(),
        _ => value
            .get("pain_points")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default(),
    };
    Ok(items
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect())
}

async fn save_plan(
    dir: &Path,
    title: &str,
    notebook_url: &str,
    content: &str,
) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let stamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let path = dir.join(format!("{}_{stamp}.md", safe_file_stem(title)));

    let mut doc = format!("# {title}\n\nSource notebook: {notebook_url}\n\n---\n\n");
    doc.push_str(content);
    tokio::fs::write(&path, doc).await?;
    info!(path = %path.display(), "document saved");
    Ok(path)
}

fn safe_file_stem(title: &str) -> String {
    let stem: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    let stem = stem.trim().replace(' ', "_");
    if stem.is_empty() { "plan".to_string() } else { stem }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_without_pain_points_has_no_section() {
        let source = format_idea_as_source("A todo app for plumbers", &[]);
        assert!(source.contains("A todo app for plumbers"));
        assert!(!source.contains("Pain Points"));
        assert!(source.contains("Write a detailed PRD"));
    }

    #[test]
    fn source_numbers_pain_points() {
        let points = vec!["invoicing is slow".to_string(), "no offline mode".to_string()];
        let source = format_idea_as_source("A todo app", &points);
        assert!(source.contains("1. invoicing is slow"));
        assert!(source.contains("2. no offline mode"));
    }

    #[test]
    fn long_ideas_get_a_trimmed_title() {
        let idea = "x".repeat(80);
        let title = trimmed_title(&idea);
        assert_eq!(title.chars().count(), 53);
        assert!(title.ends_with("..."));

        assert_eq!(trimmed_title("short idea"), "short idea");
    }

    #[test]
    fn file_stems_are_sanitized() {
        assert_eq!(safe_file_stem("My Plan: v2!"), "My_Plan_v2");
        assert_eq!(safe_file_stem("???"), "plan");
    }

    #[tokio::test]
    async fn pain_points_accept_both_shapes() {
        let dir = tempfile::TempDir::new().unwrap();

        let bare = dir.path().join("bare.json");
        tokio::fs::write(&bare, r#"["a", "b"]"#).await.unwrap();
        assert_eq!(load_pain_points(&bare).await.unwrap(), vec!["a", "b"]);

        let nested = dir.path().join("nested.json");
        tokio::fs::write(&nested, r#"{"pain_points": ["c"]}"#)
            .await
            .unwrap();
        assert_eq!(load_pain_points(&nested).await.unwrap(), vec!["c"]);
    }
}
