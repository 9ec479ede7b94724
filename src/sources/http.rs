//! Shared HTTP plumbing for the provider adapters

use crate::error::SourceError;
use anyhow::{Context, Result};
use log::debug;
use reqwest::StatusCode;
use std::time::Duration;

/// Build the client shared by every adapter
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("trade-signal-agent/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")
}

/// GET `url` and return the body, mapping transport and status failures
pub async fn get_text(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<String, SourceError> {
    let response = client.get(url).query(query).send().await?;
    let status = response.status();
    debug!("🌐 GET {} -> {}", url, status);

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(SourceError::Api("rate limited (HTTP 429)".to_string()));
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SourceError::Api(format!("credentials rejected (HTTP {})", status.as_u16())));
    }
    if !status.is_success() {
        return Err(SourceError::Request(format!("HTTP {}", status.as_u16())));
    }

    Ok(response.text().await?)
}

/// Deserialize a body, reporting shape mismatches as `Malformed`
pub fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, SourceError> {
    serde_json::from_str(body).map_err(|e| SourceError::Malformed(e.to_string()))
}
