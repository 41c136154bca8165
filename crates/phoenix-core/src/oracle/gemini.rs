//! Gemini-backed oracle over the generateContent REST API.

use super::{MAX_SNAPSHOT_CHARS, SelectorOracle, build_prompt, truncate_snapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-pro";

/// Upper bound on one proposal round-trip.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Explicit oracle configuration. A missing API key is a field state, not
/// a startup failure: calls are still attempted and fail individually.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl GeminiConfig {
    /// Defaults plus the API key from `GEMINI_API_KEY`, read once here so
    /// the oracle itself never touches ambient environment state.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("GEMINI_API_KEY").ok(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
enum ProposalError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("response carried no candidate text")]
    EmptyResponse,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

pub struct GeminiOracle {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiOracle {
    pub fn new(config: GeminiConfig) -> Self {
        if config.api_key.is_none() {
            warn!("no Gemini API key configured; selector healing will be unavailable");
        }
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn generate(
        &self,
        page_snapshot: &str,
        target_key: &str,
        platform: &str,
    ) -> Result<String, ProposalError> {
        let snapshot = truncate_snapshot(page_snapshot, MAX_SNAPSHOT_CHARS);
        let prompt = build_prompt(snapshot, target_key, platform);

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.endpoint,
            self.config.model,
            self.config.api_key.as_deref().unwrap_or_default()
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProposalError::Status(response.status()));
        }

        let parsed: GenerateResponse = response.json().await?;
        parsed
            .candidates
            .into_iter()
            .flat_map(|c| c.content.parts)
            .map(|p| p.text)
            .next()
            .ok_or(ProposalError::EmptyResponse)
    }
}

#[async_trait]
impl SelectorOracle for GeminiOracle {
    async fn propose(
        &self,
        page_snapshot: &str,
        target_key: &str,
        platform: &str,
    ) -> Option<String> {
        info!(platform, key = target_key, "requesting selector remediation");

        match self.generate(page_snapshot, target_key, platform).await {
            Ok(text) => {
                let selector = text.trim();
                if selector.is_empty() {
                    warn!(platform, key = target_key, "model returned no usable selector");
                    None
                } else {
                    info!(platform, key = target_key, selector, "remediation proposed");
                    Some(selector.to_string())
                }
            }
            Err(e) => {
                warn!(platform, key = target_key, error = %e, "remediation unavailable");
                None
            }
        }
    }
}
