//! Model gateway: a single-turn `generate(prompt) -> text` call.
//!
//! The gateway is stateless — each stage's prompt independently supplies all
//! the context it needs, there is no conversation memory between the two
//! stages of a run.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::http::send_checked;

/// Generation calls can take a while on large prompts.
const GENERATE_TIMEOUT_SECS: u64 = 300;

/// Untyped text-generation backend. Implementations must treat every call as
/// an independent single-turn exchange.
pub trait ModelGateway {
    fn generate(&self, prompt: &str) -> impl std::future::Future<Output = Result<String>>;
}

// Wire types for the Gemini generateContent endpoint.

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

/// Gemini-backed gateway. The API key is injected at construction and sent
/// as a header on every request.
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(base_url: String, model: String, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(GENERATE_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            model,
            api_key,
        })
    }

    fn endpoint(&self) -> Result<Url> {
        let base = Url::parse(&self.base_url)
            .with_context(|| format!("invalid model base URL: {}", self.base_url))?;
        base.join(&format!("v1beta/models/{}:generateContent", self.model))
            .context("failed to build generateContent URL")
    }
}

impl ModelGateway for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = self.endpoint()?;
        let request_id = Uuid::new_v4().to_string();
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        debug!("model request: url={} prompt_len={}", url, prompt.len());

        let response = send_checked(
            || {
                self.client
                    .post(url.clone())
                    .header("Content-Type", "application/json")
                    .header("x-goog-api-key", &self.api_key)
                    .header("x-request-id", &request_id)
                    .json(&body)
            },
            "model generate request",
        )
        .await?;

        let decoded: GenerateResponse = response
            .json()
            .await
            .context("failed to parse model response body")?;

        let text: String = decoded
            .candidates
            .into_iter()
            .flat_map(|c| c.content.parts)
            .map(|p| p.text)
            .collect();

        if text.is_empty() {
            anyhow::bail!("model returned no candidates");
        }

        debug!("model response: {} bytes", text.len());
        Ok(text)
    }
}
