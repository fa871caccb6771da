// client.rs — Schema-validated wrapper over the generative backend.
//
// Two independent operations: posture-issue detection from an image, and a
// coaching tip from a summary of detected issues. Each validates its input
// before calling the backend and its output shape after, and normalizes
// every failure into a classified `AnalysisError`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::{ModelBackend, ModelRequest};
use crate::capture::CapturedFrame;
use crate::error::AnalysisError;
use crate::vocabulary::{self, ISSUE_VOCABULARY};

/// Ordered list of detected issue labels. Empty means "no issues found" —
/// a meaningful result, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub issues: Vec<String>,
}

/// One free-text coaching tip. Non-empty when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub recommendation: String,
}

pub struct InferenceClient {
    backend: Arc<dyn ModelBackend>,
    detect_instruction: String,
}

impl InferenceClient {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            backend,
            detect_instruction: vocabulary::build_detect_instruction(&ISSUE_VOCABULARY),
        }
    }

    /// Detect posture issues in one captured frame.
    ///
    /// An empty or absent backend payload yields an empty issue list, since
    /// "no issues" is a legitimate outcome indistinguishable from some
    /// empty-payload backend behaviors. A present-but-misshapen payload is a
    /// `SchemaViolation`.
    pub async fn detect_issues(
        &self,
        frame: &CapturedFrame,
    ) -> Result<DetectionResult, AnalysisError> {
        if frame.jpeg.is_empty() {
            return Err(AnalysisError::SchemaViolation(
                "empty image payload".into(),
            ));
        }

        let request = ModelRequest::vision(self.detect_instruction.clone(), frame.to_data_url());
        log::info!(
            "Requesting issue detection from {} ({}x{} frame)",
            self.backend.name(),
            frame.width,
            frame.height
        );
        let payload = self.backend.generate(&request).await?;
        let result = parse_detection(payload)?;
        for issue in &result.issues {
            if !vocabulary::is_known_issue(issue) {
                log::warn!("Backend named an issue outside the vocabulary: {:?}", issue);
            }
        }
        Ok(result)
    }

    /// Turn a non-empty issue summary into one concise coaching tip.
    ///
    /// Unlike detection there is no safe empty default: an absent or
    /// malformed payload is a genuine `SchemaViolation`.
    pub async fn get_recommendation(
        &self,
        issues_summary: &str,
    ) -> Result<RecommendationResult, AnalysisError> {
        if issues_summary.trim().is_empty() {
            return Err(AnalysisError::SchemaViolation(
                "empty issues summary".into(),
            ));
        }

        let request = ModelRequest::text(vocabulary::recommend_instruction(), issues_summary);
        log::info!("Requesting recommendation from {}", self.backend.name());
        let payload = self.backend.generate(&request).await?;
        parse_recommendation(payload)
    }
}

fn parse_detection(payload: Value) -> Result<DetectionResult, AnalysisError> {
    // Null or `{}` from the backend means nothing was flagged.
    if payload.is_null() {
        return Ok(DetectionResult { issues: Vec::new() });
    }
    let obj = payload
        .as_object()
        .ok_or_else(|| AnalysisError::SchemaViolation("detection payload is not an object".into()))?;
    let Some(issues) = obj.get("issues") else {
        return Ok(DetectionResult { issues: Vec::new() });
    };
    if issues.is_null() {
        return Ok(DetectionResult { issues: Vec::new() });
    }
    let items = issues.as_array().ok_or_else(|| {
        AnalysisError::SchemaViolation("`issues` is not an array".into())
    })?;
    let mut parsed = Vec::with_capacity(items.len());
    for item in items {
        let label = item.as_str().ok_or_else(|| {
            AnalysisError::SchemaViolation(format!("non-string issue entry: {item}"))
        })?;
        parsed.push(label.to_string());
    }
    Ok(DetectionResult { issues: parsed })
}

fn parse_recommendation(payload: Value) -> Result<RecommendationResult, AnalysisError> {
    let text = payload
        .get("recommendation")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            AnalysisError::SchemaViolation("missing `recommendation` string".into())
        })?;
    if text.trim().is_empty() {
        return Err(AnalysisError::SchemaViolation(
            "empty `recommendation` string".into(),
        ));
    }
    Ok(RecommendationResult {
        recommendation: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CannedBackend {
        payload: Value,
        calls: AtomicU32,
    }

    impl CannedBackend {
        fn returning(payload: Value) -> Arc<Self> {
            Arc::new(Self {
                payload,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ModelBackend for CannedBackend {
        async fn generate(&self, _request: &ModelRequest) -> Result<Value, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.payload.clone())
        }
        fn name(&self) -> &str {
            "canned"
        }
    }

    fn frame() -> CapturedFrame {
        CapturedFrame {
            jpeg: vec![0xFF, 0xD8, 0xFF, 0xD9],
            width: 640,
            height: 480,
        }
    }

    #[tokio::test]
    async fn detection_parses_ordered_issue_list() {
        let backend =
            CannedBackend::returning(json!({"issues": ["Slouching", "Rounded Shoulders"]}));
        let client = InferenceClient::new(backend);
        let result = client.detect_issues(&frame()).await.unwrap();
        assert_eq!(result.issues, vec!["Slouching", "Rounded Shoulders"]);
    }

    #[tokio::test]
    async fn empty_issue_list_is_a_valid_result() {
        let backend = CannedBackend::returning(json!({"issues": []}));
        let client = InferenceClient::new(backend);
        let result = client.detect_issues(&frame()).await.unwrap();
        assert!(result.issues.is_empty());
    }

    #[tokio::test]
    async fn absent_payload_defaults_to_no_issues() {
        for payload in [Value::Null, json!({}), json!({"issues": null})] {
            let client = InferenceClient::new(CannedBackend::returning(payload));
            let result = client.detect_issues(&frame()).await.unwrap();
            assert!(result.issues.is_empty());
        }
    }

    #[tokio::test]
    async fn misshapen_detection_payload_is_schema_violation() {
        for payload in [
            json!({"issues": "Slouching"}),
            json!({"issues": [1, 2]}),
            json!(["Slouching"]),
        ] {
            let client = InferenceClient::new(CannedBackend::returning(payload));
            let err = client.detect_issues(&frame()).await.unwrap_err();
            assert!(matches!(err, AnalysisError::SchemaViolation(_)));
        }
    }

    #[tokio::test]
    async fn empty_image_payload_rejected_before_backend_call() {
        let backend = CannedBackend::returning(json!({"issues": []}));
        let client = InferenceClient::new(Arc::clone(&backend) as Arc<dyn ModelBackend>);
        let bad = CapturedFrame {
            jpeg: Vec::new(),
            width: 640,
            height: 480,
        };
        let err = client.detect_issues(&bad).await.unwrap_err();
        assert!(matches!(err, AnalysisError::SchemaViolation(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn recommendation_requires_the_single_string_field() {
        let backend =
            CannedBackend::returning(json!({"recommendation": "Keep your screen at eye level."}));
        let client = InferenceClient::new(backend);
        let result = client.get_recommendation("Slouching, Hunched Back").await.unwrap();
        assert_eq!(result.recommendation, "Keep your screen at eye level.");
    }

    #[tokio::test]
    async fn recommendation_has_no_empty_default() {
        for payload in [
            Value::Null,
            json!({}),
            json!({"recommendation": ""}),
            json!({"recommendation": 7}),
        ] {
            let client = InferenceClient::new(CannedBackend::returning(payload));
            let err = client.get_recommendation("Slouching").await.unwrap_err();
            assert!(matches!(err, AnalysisError::SchemaViolation(_)));
        }
    }

    #[tokio::test]
    async fn blank_summary_rejected_before_backend_call() {
        let backend = CannedBackend::returning(json!({"recommendation": "tip"}));
        let client = InferenceClient::new(Arc::clone(&backend) as Arc<dyn ModelBackend>);
        let err = client.get_recommendation("   ").await.unwrap_err();
        assert!(matches!(err, AnalysisError::SchemaViolation(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }
}
