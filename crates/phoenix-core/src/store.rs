//! Durable selector table: platform -> (target key -> CSS selector).
//!
//! The table lives in a single human-editable JSON document and is re-read
//! fresh before every resolution attempt, so edits made by other processes
//! (or a concurrent healer) are picked up within one call.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// In-memory selector table. Every value is expected to be a non-empty
/// selector string; entries that violate this are dropped on load. Keys
/// are ordered so rewriting the document is byte-stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectorMap(BTreeMap<String, BTreeMap<String, String>>);

impl SelectorMap {
    /// Returns `None` if the platform or key is absent. Never fails.
    pub fn get(&self, platform: &str, key: &str) -> Option<&str> {
        self.0
            .get(platform)
            .and_then(|keys| keys.get(key))
            .map(String::as_str)
    }

    /// Creates the platform entry if absent; overwrites an existing value.
    pub fn insert(&mut self, platform: &str, key: &str, selector: &str) {
        self.0
            .entry(platform.to_string())
            .or_default()
            .insert(key.to_string(), selector.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop entries with empty selector strings. Returns how many were
    /// removed.
    fn prune_empty(&mut self) -> usize {
        let mut dropped = 0;
        for keys in self.0.values_mut() {
            let before = keys.len();
            keys.retain(|_, selector| !selector.trim().is_empty());
            dropped += before - keys.len();
        }
        self.0.retain(|_, keys| !keys.is_empty());
        dropped
    }
}

/// File-backed store with whole-document reads and writes.
pub struct SelectorStore {
    path: PathBuf,
}

impl SelectorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the table fresh from disk.
    ///
    /// A missing or unparseable document degrades to an empty table with a
    /// warning, so a resolution attempt can still report `UnknownTarget`
    /// cleanly instead of tearing down the caller.
    pub async fn load(&self) -> SelectorMap {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "selector config not found, starting empty");
                return SelectorMap::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read selector config");
                return SelectorMap::default();
            }
        };

        match serde_json::from_str::<SelectorMap>(&text) {
            Ok(mut map) => {
                let dropped = map.prune_empty();
                if dropped > 0 {
                    warn!(
                        path = %self.path.display(),
                        dropped,
                        "dropped selector entries with empty values"
                    );
                }
                map
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "selector config is corrupt, starting empty");
                SelectorMap::default()
            }
        }
    }

    /// Read-modify-write of the entire document.
    ///
    /// Creates the platform entry if absent, overwrites an existing
    /// `(platform, key)` value, and replaces the whole document on disk.
    /// The new value is visible to any subsequent `load()`, including from
    /// other processes. Concurrent upserts are last-writer-wins at document
    /// granularity.
    pub async fn upsert(
        &self,
        platform: &str,
        key: &str,
        selector: &str,
    ) -> Result<(), StoreError> {
        let mut map = self.load().await;
        map.insert(platform, key, selector);
        self.persist(&map).await
    }

    /// Replace the document via a sibling temp file and a rename, so
    /// readers never observe a partially written table.
    async fn persist(&self, map: &SelectorMap) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(map)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
