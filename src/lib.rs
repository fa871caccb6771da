//! Posture analysis core: capture one frame from a camera or an uploaded
//! video, ask a generative model which posture issues it sees, then
//! optionally ask for a short coaching tip. This crate owns media-source
//! state, frame capture, the schema-validated backend exchange, and the
//! analysis session state machine — it renders nothing itself.

pub mod ai;
pub mod capture;
pub mod config;
pub mod error;
pub mod media;
pub mod orchestrator;
pub mod vocabulary;

pub use ai::{DetectionResult, GeminiClient, InferenceClient, RecommendationResult};
pub use capture::CapturedFrame;
pub use config::Settings;
pub use error::AnalysisError;
pub use media::{
    CameraDevice, LiveStream, MediaHandle, MediaMode, MediaSourceController, PermissionState,
    UploadedVideo,
};
pub use orchestrator::{
    AnalysisOrchestrator, AnalysisPhase, AnalysisSession, MediaState, SessionEvent,
};
