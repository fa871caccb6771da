// gemini.rs — HTTP backend for the Gemini generateContent API.
//
// One request, one JSON payload back. The model is asked for a JSON
// response; some models still wrap it in a Markdown code fence, so the
// extraction step strips one before parsing.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{ModelBackend, ModelRequest};
use crate::error::AnalysisError;

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiClient {
    endpoint: String,
    api_key: String,
    model: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, api_key, model)
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            client: Client::new(),
        }
    }

    pub fn from_settings(settings: &crate::config::Settings) -> Self {
        Self::with_endpoint(
            settings.endpoint.clone(),
            settings.api_key.clone(),
            settings.model.clone(),
        )
    }

    fn request_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model,
        )
    }

    fn build_request_body(&self, request: &ModelRequest) -> Value {
        let mut parts = vec![json!({ "text": request.instruction })];

        if let Some(data_url) = &request.image_data_url {
            // `data:<mime>;base64,<payload>` → inline_data { mime_type, data }
            let (mime, data) = split_data_url(data_url);
            parts.push(json!({
                "inline_data": { "mime_type": mime, "data": data }
            }));
        }

        if let Some(text) = &request.text {
            parts.push(json!({ "text": text }));
        }

        json!({
            "contents": [ { "role": "user", "parts": parts } ],
            "generationConfig": {
                "response_mime_type": "application/json",
                "max_output_tokens": 300
            }
        })
    }
}

#[async_trait]
impl ModelBackend for GeminiClient {
    async fn generate(&self, request: &ModelRequest) -> Result<Value, AnalysisError> {
        let body = self.build_request_body(request);

        let response = self
            .client
            .post(self.request_url())
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::Backend(format!("connection failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".into());
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(AnalysisError::Backend(format!(
                    "authentication failed: {error_body}"
                )));
            }
            if status.as_u16() == 429 {
                return Err(AnalysisError::Backend("rate limited".into()));
            }
            return Err(AnalysisError::Backend(format!(
                "HTTP {status}: {error_body}"
            )));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::Backend(format!("invalid response body: {e}")))?;

        extract_payload(&envelope)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

fn split_data_url(data_url: &str) -> (&str, &str) {
    let rest = data_url.strip_prefix("data:").unwrap_or(data_url);
    match rest.split_once(";base64,") {
        Some((mime, data)) => (mime, data),
        None => ("application/octet-stream", rest),
    }
}

/// Pull the model's text out of the generateContent envelope and parse it
/// as JSON. An envelope with no candidates or no text yields `Null`, which
/// the inference client treats as an empty payload.
fn extract_payload(envelope: &Value) -> Result<Value, AnalysisError> {
    let Some(parts) = envelope
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
    else {
        log::debug!("Gemini response carried no candidates");
        return Ok(Value::Null);
    };

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    let stripped = strip_code_fence(&text);
    serde_json::from_str(stripped)
        .map_err(|e| AnalysisError::SchemaViolation(format!("response is not JSON: {e}")))
}

/// Remove a single surrounding ```json … ``` (or bare ```) fence.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}
