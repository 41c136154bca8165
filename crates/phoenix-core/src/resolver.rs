//! Resolution Engine
//!
//! One resolution call turns `(platform, key)` into a live element handle:
//! store read, bounded match, and on failure a single heal-and-retry cycle
//! through the oracle. Outcomes are values; nothing here panics or throws
//! past the caller.

use crate::oracle::SelectorOracle;
use crate::session::PageSession;
use crate::store::SelectorStore;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Default bounded wait for one element match.
pub const DEFAULT_MATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a resolution attempt gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// `(platform, key)` has no entry in the selector table. There is
    /// nothing to heal from, so the oracle is never consulted.
    #[error("target is not configured")]
    UnknownTarget,

    /// The oracle produced no candidate.
    #[error("healing produced no candidate")]
    HealingExhausted,

    /// The oracle's candidate was persisted but did not match either.
    #[error("healed selector also failed to match")]
    HealedSelectorAlsoFailed,
}

/// Failure report with enough context to fix the selector table by hand.
#[derive(Debug, Clone, Error)]
#[error("could not resolve {platform}.{key}: {reason}")]
pub struct ResolveFailure {
    pub platform: String,
    pub key: String,
    pub reason: FailureReason,
    /// Selectors tried, in order.
    pub attempted: Vec<String>,
}

/// Terminal outcome of one resolution call.
#[derive(Debug)]
pub enum Resolution<H> {
    /// Handle bound to the first matching element.
    Matched(H),
    Failed(ResolveFailure),
}

impl<H> Resolution<H> {
    pub fn matched(self) -> Option<H> {
        match self {
            Resolution::Matched(handle) => Some(handle),
            Resolution::Failed(_) => None,
        }
    }

    pub fn into_result(self) -> Result<H, ResolveFailure> {
        match self {
            Resolution::Matched(handle) => Ok(handle),
            Resolution::Failed(failure) => Err(failure),
        }
    }
}

/// Turns `(platform, key)` into live element handles, healing broken
/// selectors through the oracle as a side effect. Holds no state across
/// calls beyond what lives in the store.
pub struct Resolver<O> {
    store: SelectorStore,
    oracle: O,
    match_timeout: Duration,
}

impl<O: SelectorOracle> Resolver<O> {
    pub fn new(store: SelectorStore, oracle: O) -> Self {
        Self {
            store,
            oracle,
            match_timeout: DEFAULT_MATCH_TIMEOUT,
        }
    }

    pub fn with_match_timeout(mut self, timeout: Duration) -> Self {
        self.match_timeout = timeout;
        self
    }

    pub fn store(&self) -> &SelectorStore {
        &self.store
    }

    /// One end-to-end attempt to obtain a live element handle.
    ///
    /// The selector table is re-read on every call. At most one heal cycle
    /// runs per call: if the healed selector also fails, the call reports
    /// `HealedSelectorAlsoFailed` rather than looping back to the oracle.
    pub async fn resolve<S: PageSession>(
        &self,
        session: &S,
        platform: &str,
        key: &str,
    ) -> Resolution<S::Handle> {
        let selectors = self.store.load().await;
        let Some(selector) = selectors.get(platform, key) else {
            warn!(platform, key, "no selector configured for target");
            return Resolution::Failed(ResolveFailure {
                platform: platform.to_string(),
                key: key.to_string(),
                reason: FailureReason::UnknownTarget,
                attempted: Vec::new(),
            });
        };
        let selector = selector.to_string();

        match session.match_first(&selector, self.match_timeout).await {
            Ok(handle) => return Resolution::Matched(handle),
            Err(e) => {
                warn!(platform, key, selector = %selector, error = %e, "selector no longer matches, healing");
            }
        }

        self.heal(session, platform, key, selector).await
    }

    /// Single heal-and-retry cycle: snapshot, propose, persist, verify.
    async fn heal<S: PageSession>(
        &self,
        session: &S,
        platform: &str,
        key: &str,
        broken: String,
    ) -> Resolution<S::Handle> {
        let failed = |reason: FailureReason, attempted: Vec<String>| {
            Resolution::Failed(ResolveFailure {
                platform: platform.to_string(),
                key: key.to_string(),
                reason,
                attempted,
            })
        };

        let snapshot = match session.content().await {
            Ok(markup) => markup,
            Err(e) => {
                warn!(platform, key, error = %e, "could not capture page content for healing");
                return failed(FailureReason::HealingExhausted, vec![broken]);
            }
        };

        let Some(candidate) = self.oracle.propose(&snapshot, key, platform).await else {
            return failed(FailureReason::HealingExhausted, vec![broken]);
        };

        // Persist before the verification match so the table is never
        // behind the selector actually being tried. The candidate stays in
        // the table even if verification fails: the page may simply be in
        // a different render state on the next attempt.
        if let Err(e) = self.store.upsert(platform, key, &candidate).await {
            warn!(platform, key, error = %e, "failed to persist healed selector");
        }

        match session.match_first(&candidate, self.match_timeout).await {
            Ok(handle) => {
                info!(platform, key, selector = %candidate, "healed selector verified");
                Resolution::Matched(handle)
            }
            Err(e) => {
                warn!(platform, key, selector = %candidate, error = %e, "healed selector also failed");
                failed(
                    FailureReason::HealedSelectorAlsoFailed,
                    vec![broken, candidate],
                )
            }
        }
    }
}
