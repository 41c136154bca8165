use async_trait::async_trait;
use phoenix_core::oracle::SelectorOracle;
use phoenix_core::resolver::{FailureReason, Resolver};
use phoenix_core::session::{PageSession, SessionError};
use phoenix_core::store::SelectorStore;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Page stand-in: a fixed set of selectors that match, plus a markup
/// snapshot for the healing path.
struct MockSession {
    matching: HashSet<String>,
    markup: String,
    content_fails: bool,
}

impl MockSession {
    fn with_matches(selectors: &[&str], markup: &str) -> Self {
        Self {
            matching: selectors.iter().map(|s| s.to_string()).collect(),
            markup: markup.to_string(),
            content_fails: false,
        }
    }
}

#[derive(Debug, PartialEq)]
struct MatchedElement(String);

#[async_trait]
impl PageSession for MockSession {
    type Handle = MatchedElement;

    async fn match_first(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<MatchedElement, SessionError> {
        if self.matching.contains(selector) {
            Ok(MatchedElement(selector.to_string()))
        } else {
            Err(SessionError::NotFound {
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }

    async fn content(&self) -> Result<String, SessionError> {
        if self.content_fails {
            Err(SessionError::Browser("page crashed".into()))
        } else {
            Ok(self.markup.clone())
        }
    }
}

/// Oracle stand-in with a canned answer and a call counter. Clones share
/// their counters, so a test can hand one clone to the resolver and keep
/// another for assertions.
#[derive(Clone)]
struct MockOracle {
    response: Option<String>,
    calls: Arc<AtomicUsize>,
    seen_snapshots: Arc<Mutex<Vec<String>>>,
}

impl MockOracle {
    fn returning(selector: &str) -> Self {
        Self {
            response: Some(selector.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
            seen_snapshots: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn exhausted() -> Self {
        Self {
            response: None,
            calls: Arc::new(AtomicUsize::new(0)),
            seen_snapshots: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SelectorOracle for MockOracle {
    async fn propose(
        &self,
        page_snapshot: &str,
        _target_key: &str,
        _platform: &str,
    ) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_snapshots
            .lock()
            .unwrap()
            .push(page_snapshot.to_string());
        self.response.clone()
    }
}

async fn seeded_store(dir: &TempDir, json: &str) -> SelectorStore {
    let path = dir.path().join("selectors.json");
    tokio::fs::write(&path, json).await.unwrap();
    SelectorStore::new(path)
}

#[tokio::test]
async fn matching_selector_resolves_without_the_oracle() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir, r#"{"reddit": {"post_title": "h3.title"}}"#).await;
    let oracle = MockOracle::returning("div.unused");
    let session = MockSession::with_matches(&["h3.title"], "<html/>");

    let resolver = Resolver::new(store, oracle.clone());
    let outcome = resolver.resolve(&session, "reddit", "post_title").await;

    assert_eq!(outcome.matched(), Some(MatchedElement("h3.title".into())));
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn unknown_target_fails_without_the_oracle() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir, r#"{"reddit": {"post_title": "h3.title"}}"#).await;
    let oracle = MockOracle::returning("div.unused");
    let session = MockSession::with_matches(&["h3.title"], "<html/>");

    let resolver = Resolver::new(store, oracle.clone());

    let failure = resolver
        .resolve(&session, "reddit", "no_such_key")
        .await
        .into_result()
        .unwrap_err();
    assert_eq!(failure.reason, FailureReason::UnknownTarget);
    assert!(failure.attempted.is_empty());

    let failure = resolver
        .resolve(&session, "no_such_platform", "post_title")
        .await
        .into_result()
        .unwrap_err();
    assert_eq!(failure.reason, FailureReason::UnknownTarget);

    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn missing_store_file_reports_unknown_target() {
    let dir = TempDir::new().unwrap();
    let store = SelectorStore::new(dir.path().join("absent.json"));
    let oracle = MockOracle::returning("div.unused");
    let session = MockSession::with_matches(&["h3.title"], "<html/>");

    let resolver = Resolver::new(store, oracle.clone());
    let failure = resolver
        .resolve(&session, "reddit", "post_title")
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(failure.reason, FailureReason::UnknownTarget);
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn healed_selector_matches_and_is_persisted() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir, r#"{"reddit": {"post_title": "h1.broken"}}"#).await;
    let oracle = MockOracle::returning("h3.Post-title");
    let session = MockSession::with_matches(
        &["h3.Post-title"],
        "<html><h3 class=\"Post-title\">hello</h3></html>",
    );

    let resolver = Resolver::new(store, oracle.clone());
    let outcome = resolver.resolve(&session, "reddit", "post_title").await;

    assert_eq!(
        outcome.matched(),
        Some(MatchedElement("h3.Post-title".into()))
    );
    assert_eq!(oracle.calls(), 1);

    let map = resolver.store().load().await;
    assert_eq!(map.get("reddit", "post_title"), Some("h3.Post-title"));
}

#[tokio::test]
async fn exhausted_oracle_leaves_the_store_unchanged() {
    let dir = TempDir::new().unwrap();
    let seeded = r#"{"reddit": {"post_title": "h1.broken"}}"#;
    let store = seeded_store(&dir, seeded).await;
    let path = store.path().to_path_buf();
    let oracle = MockOracle::exhausted();
    let session = MockSession::with_matches(&[], "<html/>");

    let resolver = Resolver::new(store, oracle.clone());
    let failure = resolver
        .resolve(&session, "reddit", "post_title")
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(failure.reason, FailureReason::HealingExhausted);
    assert_eq!(failure.attempted, vec!["h1.broken"]);
    assert_eq!(oracle.calls(), 1);

    let on_disk = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(on_disk, seeded);
}

#[tokio::test]
async fn failed_candidate_stays_persisted() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir, r#"{"reddit": {"post_title": "h1.broken"}}"#).await;
    let oracle = MockOracle::returning("div.also-wrong");
    let session = MockSession::with_matches(&[], "<html/>");

    let resolver = Resolver::new(store, oracle.clone());
    let failure = resolver
        .resolve(&session, "reddit", "post_title")
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(failure.reason, FailureReason::HealedSelectorAlsoFailed);
    assert_eq!(failure.attempted, vec!["h1.broken", "div.also-wrong"]);

    // Optimistic persistence: the unverified candidate replaces the broken
    // selector and stays there for the next attempt.
    let map = resolver.store().load().await;
    assert_eq!(map.get("reddit", "post_title"), Some("div.also-wrong"));
}

#[tokio::test]
async fn snapshot_capture_failure_exhausts_healing() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir, r#"{"reddit": {"post_title": "h1.broken"}}"#).await;
    let oracle = MockOracle::returning("h3.Post-title");
    let mut session = MockSession::with_matches(&[], "<html/>");
    session.content_fails = true;

    let resolver = Resolver::new(store, oracle.clone());
    let failure = resolver
        .resolve(&session, "reddit", "post_title")
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(failure.reason, FailureReason::HealingExhausted);
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn oracle_sees_the_current_page_markup() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir, r#"{"reddit": {"post_title": "h1.broken"}}"#).await;
    let oracle = MockOracle::returning("h3.Post-title");
    let markup = "<html><h3 class=\"Post-title\">hi</h3></html>";
    let session = MockSession::with_matches(&["h3.Post-title"], markup);

    let resolver = Resolver::new(store, oracle.clone());
    resolver.resolve(&session, "reddit", "post_title").await;

    let snapshots = oracle.seen_snapshots.lock().unwrap();
    assert_eq!(snapshots.as_slice(), &[markup.to_string()]);
}
