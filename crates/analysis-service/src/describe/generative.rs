//! Element description through the Gemini generateContent API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::Descriptor;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const DESCRIBE_PROMPT: &str = "You are describing a figure cropped from a lecture video \
for a visually impaired student. Respond with strict JSON only, no markdown fences, in the form \
{\"contains_element\": boolean, \"element_type\": string, \"description\": string}. \
The description must convey the information the figure carries, not its visual styling.";

pub struct GenerativeDescriber {
    client: Client,
    api_key: String,
    model: String,
}

impl GenerativeDescriber {
    pub fn new(api_key: String, model: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl Descriptor for GenerativeDescriber {
    async fn describe(&self, jpeg: &[u8]) -> Result<Value> {
        let base64_data = base64::engine::general_purpose::STANDARD.encode(jpeg);

        let url = format!(
            "{BASE_URL}/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let payload = json!({
            "contents": [{
                "parts": [
                    {"text": DESCRIBE_PROMPT},
                    {"inline_data": {"mime_type": "image/jpeg", "data": base64_data}},
                ]
            }]
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .context("failed to call describe API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("describe API returned error {status}: {body}");
        }

        let body: Value = response
            .json()
            .await
            .context("describe API returned invalid JSON")?;

        let text = body
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(|t| t.as_str())
            .context("describe API response missing candidate text")?;

        debug!(model = %self.model, chars = text.len(), "received description");

        Ok(parse_description_text(text))
    }
}

/// Models often wrap JSON in markdown fences despite the prompt. Strip
/// them, then fall back to the raw text when the payload still does not
/// parse as JSON.
fn parse_description_text(text: &str) -> Value {
    let stripped = strip_code_fences(text);
    serde_json::from_str(stripped).unwrap_or_else(|_| Value::String(stripped.to_string()))
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
