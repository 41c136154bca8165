//! Page Session Abstraction
//!
//! The resolver needs exactly two operations from the browser layer:
//! matching the first element for a selector, and snapshotting the rendered
//! markup. Everything else (launch, navigation, cookies, teardown) belongs
//! to the session implementation.
//!
//! Implementations:
//! - `phoenix-browser`: drives a real Chromium page over CDP
//! - Tests: use mock implementations

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a page session.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// No element matched the selector within the wait budget.
    #[error("no element matched '{selector}' within {timeout_ms}ms")]
    NotFound { selector: String, timeout_ms: u64 },

    /// The underlying browser transport failed.
    #[error("browser error: {0}")]
    Browser(String),
}

/// Live page driven by one logical thread of control.
///
/// The page is not safe to share across concurrent resolution calls; the
/// owner of the session serializes access.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Live handle to a matched element.
    type Handle: Send;

    /// Wait for the first element matching `selector`, in document order,
    /// bounded by `timeout`. "First" is the tie-break when multiple
    /// elements match.
    async fn match_first(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Self::Handle, SessionError>;

    /// Full rendered markup of the current page.
    async fn content(&self) -> Result<String, SessionError>;
}
