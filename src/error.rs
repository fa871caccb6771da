/// Error type for the analysis core.
///
/// Every kind here is recoverable: the orchestrator maps each one to a
/// terminal session state and a user-actionable message. There are no
/// fatal variants.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Camera access was refused or the device failed to open.
    #[error("camera access denied")]
    PermissionDenied,

    /// The chosen file does not declare a video media type.
    #[error("not a video file: {0}")]
    InvalidFileType(String),

    /// Capture was attempted on media that cannot render a frame yet.
    #[error("frame not ready: {0}")]
    FrameNotReady(&'static str),

    /// A request or response failed validation against its schema.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// A recommendation was requested with an empty issue list.
    #[error("no issues to recommend against")]
    NoIssuesToRecommend,

    /// An analysis trigger arrived while the session cannot accept one.
    #[error("not ready: {0}")]
    NotReady(&'static str),

    /// The backend call itself failed (transport, auth, rate limit, 5xx).
    #[error("backend error: {0}")]
    Backend(String),
}

impl AnalysisError {
    /// True for failures the user can resolve by waiting or retrying the
    /// same action, as opposed to picking a different media source.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalysisError::FrameNotReady(_)
                | AnalysisError::SchemaViolation(_)
                | AnalysisError::Backend(_)
        )
    }
}
