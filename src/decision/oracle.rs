//! 🧠 Reasoning oracle client
//!
//! `ReasoningOracle` is the seam: the assembler hands it a `DecisionRequest`
//! and gets back the raw reply text. `GeminiOracle` talks to the Gemini
//! `generateContent` REST endpoint.

use super::request::DecisionRequest;
use crate::config::OracleConfig;
use crate::error::OracleError;
use anyhow::Context;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

const GEMINI_API: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    fn name(&self) -> &str;

    /// One round trip; returns the reply text as produced by the model
    async fn consult(&self, request: &DecisionRequest) -> Result<String, OracleError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<OutPart<'a>>,
}

#[derive(Debug, Serialize)]
struct OutPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<InPart>,
}

#[derive(Debug, Deserialize)]
struct InPart {
    text: Option<String>,
}

/// Pull the first candidate's text out of a generateContent body
pub fn extract_reply_text(body: &str) -> Result<String, OracleError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|e| OracleError::Malformed(e.to_string()))?;

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(OracleError::Malformed("response has no candidate text".to_string()));
    }
    Ok(text)
}

pub struct GeminiOracle {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiOracle {
    pub fn new(api_key: impl Into<String>, config: &OracleConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create oracle HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: config.model.clone(),
            base_url: GEMINI_API.to_string(),
        })
    }
}

#[async_trait]
impl ReasoningOracle for GeminiOracle {
    fn name(&self) -> &str {
        &self.model
    }

    async fn consult(&self, request: &DecisionRequest) -> Result<String, OracleError> {
        let prompt = request
            .to_prompt()
            .map_err(|e| OracleError::Malformed(format!("could not encode request: {}", e)))?;
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![OutPart { text: &prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                response_mime_type: "application/json",
            },
        };

        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        debug!("🧠 POST {} ({} prompt chars)", url, prompt.len());

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;

        if !status.is_success() {
            let snippet: String = text.chars().take(200).collect();
            return Err(OracleError::Unavailable(format!("HTTP {}: {}", status.as_u16(), snippet)));
        }

        extract_reply_text(&text)
    }
}
