//! OAuth token storage and refresh.
//!
//! Credential acquisition is out of scope for this binary: it expects tokens
//! obtained elsewhere in `~/.config/ics2gcal/tokens.json` and only refreshes
//! the access token when it has expired.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTokens {
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

fn token_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(dir.join("ics2gcal").join("tokens.json"))
}

pub fn load_tokens() -> Result<StoredTokens> {
    let path = token_path()?;
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read token file {}", path.display()))?;
    serde_json::from_str(&content).context("Token file is not valid JSON")
}

pub fn save_tokens(tokens: &StoredTokens) -> Result<()> {
    let path = token_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serde_json::to_string_pretty(tokens)?)?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

/// Return tokens with a usable access token, refreshing when expired.
pub async fn valid_tokens() -> Result<StoredTokens> {
    let mut tokens = load_tokens()?;

    let expired = tokens
        .expires_at
        .map(|at| at <= Utc::now() + Duration::seconds(60))
        .unwrap_or(false);
    if !expired {
        return Ok(tokens);
    }

    debug!("access token expired, refreshing");
    let client = reqwest::Client::new();
    let response = client
        .post(TOKEN_ENDPOINT)
        .form(&[
            ("client_id", tokens.client_id.as_str()),
            ("client_secret", tokens.client_secret.as_str()),
            ("refresh_token", tokens.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await
        .context("Token refresh request failed")?
        .error_for_status()
        .context("Token refresh rejected")?;

    let refreshed: RefreshResponse = response.json().await.context("Malformed token response")?;
    tokens.access_token = refreshed.access_token;
    tokens.expires_at =
        (refreshed.expires_in > 0).then(|| Utc::now() + Duration::seconds(refreshed.expires_in));
    save_tokens(&tokens)?;

    Ok(tokens)
}
