//! Auth cookie loading and injection.
//!
//! The document-generation site is driven with a signed-in Google session.
//! Credentials come from `~/.notebooklm-mcp/auth.json`, which exists in two
//! shapes in the wild: a plain array of cookie objects, or an object whose
//! `cookies` field is either such an array or a single `name=value; ...`
//! string.

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::SetCookieParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CookieError {
    #[error(
        "auth file not found at {0}; run `npx notebooklm-mcp-server auth` first to create it"
    )]
    Missing(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse auth file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unrecognized auth file shape")]
    UnknownShape,
    #[error("invalid cookie '{name}': {reason}")]
    Invalid { name: String, reason: String },
    #[error("browser rejected cookie '{name}': {reason}")]
    Rejected { name: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_secure")]
    pub secure: bool,
    #[serde(default, rename = "httpOnly")]
    pub http_only: bool,
}

fn default_domain() -> String {
    ".google.com".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

fn default_secure() -> bool {
    true
}

/// `~/.notebooklm-mcp/auth.json`
pub fn default_auth_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".notebooklm-mcp")
        .join("auth.json")
}

pub async fn load_auth_cookies(path: &Path) -> Result<Vec<StoredCookie>, CookieError> {
    if !path.exists() {
        return Err(CookieError::Missing(path.to_path_buf()));
    }
    let text = tokio::fs::read_to_string(path).await?;
    let cookies = parse_auth_document(&text)?;
    info!(count = cookies.len(), path = %path.display(), "loaded auth cookies");
    Ok(cookies)
}

fn parse_auth_document(text: &str) -> Result<Vec<StoredCookie>, CookieError> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    if value.is_array() {
        return Ok(serde_json::from_value(value)?);
    }

    match value.get("cookies") {
        Some(array @ serde_json::Value::Array(_)) => Ok(serde_json::from_value(array.clone())?),
        Some(serde_json::Value::String(raw)) => Ok(parse_cookie_string(raw)),
        _ => Err(CookieError::UnknownShape),
    }
}

/// Split a `name=value; name2=value2` header-style string into cookies
/// with google.com defaults.
fn parse_cookie_string(raw: &str) -> Vec<StoredCookie> {
    raw.split(';')
        .filter_map(|part| {
            let part = part.trim();
            let (name, value) = part.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(StoredCookie {
                name: name.to_string(),
                value: value.trim().to_string(),
                domain: default_domain(),
                path: default_path(),
                secure: default_secure(),
                http_only: false,
            })
        })
        .collect()
}

/// Inject cookies into the page via CDP, before navigation. Injected
/// cookies are session-scoped; expiry from the auth file is not forwarded.
pub async fn apply(page: &Page, cookies: &[StoredCookie]) -> Result<(), CookieError> {
    for cookie in cookies {
        let params = SetCookieParams::builder()
            .name(&cookie.name)
            .value(&cookie.value)
            .domain(&cookie.domain)
            .path(&cookie.path)
            .secure(cookie.secure)
            .http_only(cookie.http_only)
            .build()
            .map_err(|reason| CookieError::Invalid {
                name: cookie.name.clone(),
                reason,
            })?;
        page.execute(params)
            .await
            .map_err(|e| CookieError::Rejected {
                name: cookie.name.clone(),
                reason: e.to_string(),
            })?;
    }
    info!(count = cookies.len(), "auth cookies injected");
    Ok(())
}
