use async_trait::async_trait;
use serde_json::Value;

use crate::error::AnalysisError;

pub mod client;
pub mod gemini;

pub use client::{DetectionResult, InferenceClient, RecommendationResult};
pub use gemini::GeminiClient;

/// One structured request to the generative backend: a fixed instruction
/// plus the caller's input (an image payload, a summary string, or both).
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub instruction: String,
    /// `data:image/jpeg;base64,…` payload for vision requests.
    pub image_data_url: Option<String>,
    /// Free-text input for text-only requests.
    pub text: Option<String>,
}

impl ModelRequest {
    pub fn vision(instruction: impl Into<String>, image_data_url: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            image_data_url: Some(image_data_url.into()),
            text: None,
        }
    }

    pub fn text(instruction: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            image_data_url: None,
            text: Some(text.into()),
        }
    }
}

/// Trait for generative-model backends (Gemini, Azure OpenAI, mocks).
///
/// One request, one structured JSON payload back. No streaming, no retries —
/// retry policy, if any, belongs to the caller.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, request: &ModelRequest) -> Result<Value, AnalysisError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
