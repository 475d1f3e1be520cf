use anyhow::{anyhow, Result};
use migaswatch_common::retry::{with_backoff, RetryPolicy};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schema::StructuredOutput;

/// Sampling temperature used for all analysis calls.
const TEMPERATURE: f64 = 0.3;
/// Internal retry budget for one logical completion.
const MAX_ATTEMPTS: u32 = 3;

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct JsonSchemaFormat {
    name: String,
    strict: bool,
    schema: serde_json::Value,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Serialize)]
struct StructuredRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("Failed to build LLM HTTP client");

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Type-safe structured completion: the response must deserialize into `T`.
    /// Transport failures, API errors, and schema violations are retried with
    /// exponential backoff up to the internal attempt budget.
    pub async fn extract<T: StructuredOutput>(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<T> {
        let policy = RetryPolicy::default().with_attempts(MAX_ATTEMPTS);
        with_backoff(policy, "llm.extract", || {
            self.extract_once::<T>(system_prompt, user_prompt)
        })
        .await
    }

    async fn extract_once<T: StructuredOutput>(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<T> {
        let request = StructuredRequest {
            model: self.model.clone(),
            messages: vec![
                WireMessage { role: "system", content: system_prompt.to_string() },
                WireMessage { role: "user", content: user_prompt.to_string() },
            ],
            temperature: TEMPERATURE,
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: T::output_name(),
                    strict: true,
                    schema: T::output_schema(),
                },
            },
        };

        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %self.model, "LLM structured output request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("LLM API error ({status}): {error_text}"));
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("LLM returned no choices"))?;

        serde_json::from_str(&content)
            .map_err(|e| anyhow!("LLM output failed schema validation: {e}"))
    }
}
