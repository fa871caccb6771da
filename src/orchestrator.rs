// orchestrator.rs — Sequences capture → detection → recommendation and owns
// the analysis session state machine.
//
// The orchestrator is the sole writer of `AnalysisSession`, the sole caller
// of frame capture and the inference client, and the only place overlap
// suppression is enforced. It renders nothing itself: state transitions are
// published as `SessionEvent`s on a channel for an external presentation
// layer to consume.

use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::Mutex as TokioMutex;

use crate::ai::InferenceClient;
use crate::capture::capture_frame;
use crate::config::Settings;
use crate::error::AnalysisError;
use crate::media::{MediaMode, MediaSourceController, PermissionState, UploadedVideo};

/// Where the current analysis session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnalysisPhase {
    Idle,
    Capturing,
    AwaitingDetection,
    DetectionDone,
    AwaitingRecommendation,
    RecommendationDone,
    Failed,
}

impl AnalysisPhase {
    /// True while an analysis or recommendation request is outstanding.
    /// A new trigger in this window is rejected, not queued.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            AnalysisPhase::Capturing
                | AnalysisPhase::AwaitingDetection
                | AnalysisPhase::AwaitingRecommendation
        )
    }
}

/// One analyze-then-optionally-recommend interaction tied to a single
/// captured frame. Replaced wholesale (never merged) on restart or media
/// change; `id` tags outstanding requests so stale results are discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisSession {
    pub id: u64,
    pub phase: AnalysisPhase,
    pub issues: Option<Vec<String>>,
    pub recommendation: Option<String>,
    pub error: Option<String>,
}

impl AnalysisSession {
    fn fresh(id: u64) -> Self {
        Self {
            id,
            phase: AnalysisPhase::Idle,
            issues: None,
            recommendation: None,
            error: None,
        }
    }
}

/// Typed session-transition events for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    PhaseChanged {
        session_id: u64,
        phase: AnalysisPhase,
    },
    /// Detection finished with zero issues — distinct "all clear" signal.
    AllClear { session_id: u64 },
    IssuesDetected {
        session_id: u64,
        issues: Vec<String>,
    },
    RecommendationReady {
        session_id: u64,
        recommendation: String,
    },
    AnalysisFailed {
        session_id: u64,
        message: String,
    },
}

/// Snapshot of the media source for the presentation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MediaState {
    pub mode: MediaMode,
    pub playable: bool,
    pub permission: PermissionState,
}

pub struct AnalysisOrchestrator {
    media: TokioMutex<MediaSourceController>,
    client: InferenceClient,
    session: Mutex<AnalysisSession>,
    next_id: Mutex<u64>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    warmup: Duration,
    max_frame_width: u32,
    jpeg_quality: u8,
}

impl AnalysisOrchestrator {
    /// Build the orchestrator and the event channel the presentation layer
    /// reads from.
    pub fn new(
        media: MediaSourceController,
        client: InferenceClient,
        settings: &Settings,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            media: TokioMutex::new(media),
            client,
            session: Mutex::new(AnalysisSession::fresh(1)),
            next_id: Mutex::new(2),
            event_tx,
            warmup: Duration::from_millis(settings.warmup_ms),
            max_frame_width: settings.max_frame_width,
            jpeg_quality: settings.jpeg_quality,
        };
        (orchestrator, event_rx)
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> AnalysisSession {
        self.session.lock().unwrap().clone()
    }

    /// Snapshot of the media source.
    pub async fn media_state(&self) -> MediaState {
        let media = self.media.lock().await;
        MediaState {
            mode: media.mode(),
            playable: media.is_playable(),
            permission: media.permission(),
        }
    }

    /// Switch media mode. An actual change releases any live stream and
    /// discards the whole session — results are mode-specific and must
    /// never be shown against a different source.
    pub async fn select_mode(&self, mode: MediaMode) {
        let changed = {
            let mut media = self.media.lock().await;
            let changed = media.mode() != mode;
            media.select_mode(mode);
            changed
        };
        if changed {
            self.reset_session();
        }
    }

    /// Request camera access. Success replaces the live stream and discards
    /// the session; denial leaves the session alone and is recoverable.
    pub async fn acquire_webcam(&self) -> Result<(), AnalysisError> {
        {
            let mut media = self.media.lock().await;
            media.acquire_webcam().await?;
        }
        self.reset_session();
        Ok(())
    }

    /// Accept an uploaded video. Success discards the session; an invalid
    /// file leaves both the previous file and the session unchanged.
    pub async fn set_uploaded_file(&self, video: UploadedVideo) -> Result<(), AnalysisError> {
        {
            let mut media = self.media.lock().await;
            media.set_uploaded_file(video)?;
        }
        self.reset_session();
        Ok(())
    }

    /// Release the live stream. Called when the owning view goes away.
    pub async fn teardown(&self) {
        self.media.lock().await.teardown();
    }

    /// Run capture → detection for a fresh session.
    ///
    /// Guard failures (busy, no playable media, missing permission) return
    /// an error and leave the session untouched. Once a session is started,
    /// pipeline failures are recorded in the session itself — the call
    /// returns `Ok(())` and the session ends in `Failed`.
    pub async fn start_analysis(&self) -> Result<(), AnalysisError> {
        {
            let session = self.session.lock().unwrap();
            if session.phase.is_in_flight() {
                log::debug!("Analysis trigger ignored: session {} in flight", session.id);
                return Err(AnalysisError::NotReady("analysis already in flight"));
            }
        }

        {
            let media = self.media.lock().await;
            if media.mode() == MediaMode::Webcam
                && media.permission() != PermissionState::Granted
            {
                return Err(AnalysisError::NotReady("camera permission not granted"));
            }
            if !media.is_playable() {
                return Err(AnalysisError::NotReady("no playable media"));
            }
        }

        // Claim the session. Re-checked because the media guard awaited.
        let sid = {
            let mut session = self.session.lock().unwrap();
            if session.phase.is_in_flight() {
                return Err(AnalysisError::NotReady("analysis already in flight"));
            }
            let id = self.allocate_id();
            *session = AnalysisSession::fresh(id);
            session.phase = AnalysisPhase::Capturing;
            id
        };
        self.emit_phase(sid, AnalysisPhase::Capturing);
        log::info!("Session {}: analysis started", sid);

        // A live stream can report ready before it has painted its first
        // frame; a bounded warm-up wait covers that window.
        tokio::time::sleep(self.warmup).await;

        let frame = {
            let media = self.media.lock().await;
            match media.current_media() {
                Some(handle) => capture_frame(handle, self.max_frame_width, self.jpeg_quality),
                None => Err(AnalysisError::FrameNotReady("media source went away")),
            }
        };

        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                // No inference call is made for an unready frame.
                self.fail_session(sid, &e, true);
                return Ok(());
            }
        };

        if !self.transition(sid, AnalysisPhase::AwaitingDetection) {
            return Ok(());
        }

        match self.client.detect_issues(&frame).await {
            Ok(result) => {
                let applied = {
                    let mut session = self.session.lock().unwrap();
                    if session.id != sid {
                        false
                    } else {
                        session.phase = AnalysisPhase::DetectionDone;
                        session.issues = Some(result.issues.clone());
                        true
                    }
                };
                if !applied {
                    log::info!("Session {}: stale detection result discarded", sid);
                    return Ok(());
                }
                self.emit_phase(sid, AnalysisPhase::DetectionDone);
                if result.issues.is_empty() {
                    log::info!("Session {}: no issues detected", sid);
                    self.emit(SessionEvent::AllClear { session_id: sid });
                } else {
                    log::info!("Session {}: detected {:?}", sid, result.issues);
                    self.emit(SessionEvent::IssuesDetected {
                        session_id: sid,
                        issues: result.issues,
                    });
                }
            }
            Err(e) => {
                // Detection failure clears the issue list — never leave a
                // stale list from a previous run visible.
                self.fail_session(sid, &e, true);
            }
        }
        Ok(())
    }

    /// Run the recommendation request against the current detection result.
    ///
    /// Valid only in `DetectionDone` with a non-empty issue list; the guard
    /// failures return an error without touching the session or calling the
    /// backend.
    pub async fn request_recommendation(&self) -> Result<(), AnalysisError> {
        let (sid, summary) = {
            let mut session = self.session.lock().unwrap();
            if session.phase != AnalysisPhase::DetectionDone {
                return Err(AnalysisError::NotReady("no completed detection"));
            }
            let issues = session.issues.as_deref().unwrap_or(&[]);
            if issues.is_empty() {
                return Err(AnalysisError::NoIssuesToRecommend);
            }
            let summary = issues.join(", ");
            session.phase = AnalysisPhase::AwaitingRecommendation;
            (session.id, summary)
        };
        self.emit_phase(sid, AnalysisPhase::AwaitingRecommendation);
        log::info!("Session {}: recommendation requested", sid);

        match self.client.get_recommendation(&summary).await {
            Ok(result) => {
                let applied = {
                    let mut session = self.session.lock().unwrap();
                    if session.id != sid {
                        false
                    } else {
                        session.phase = AnalysisPhase::RecommendationDone;
                        session.recommendation = Some(result.recommendation.clone());
                        true
                    }
                };
                if !applied {
                    log::info!("Session {}: stale recommendation discarded", sid);
                    return Ok(());
                }
                self.emit_phase(sid, AnalysisPhase::RecommendationDone);
                self.emit(SessionEvent::RecommendationReady {
                    session_id: sid,
                    recommendation: result.recommendation,
                });
            }
            Err(e) => {
                // The detected issues are still valid; keep them visible.
                self.fail_session(sid, &e, false);
            }
        }
        Ok(())
    }

    fn allocate_id(&self) -> u64 {
        let mut id = self.next_id.lock().unwrap();
        let current = *id;
        *id += 1;
        current
    }

    /// Discard the session wholesale and return to `Idle` under a new id,
    /// which also invalidates any in-flight request's eventual result.
    fn reset_session(&self) {
        let id = self.allocate_id();
        {
            let mut session = self.session.lock().unwrap();
            *session = AnalysisSession::fresh(id);
        }
        log::info!("Session discarded; now idle as session {}", id);
        self.emit_phase(id, AnalysisPhase::Idle);
    }

    /// Move session `sid` to `phase` if it is still the live session.
    /// Returns false when the session has been replaced in the meantime.
    fn transition(&self, sid: u64, phase: AnalysisPhase) -> bool {
        {
            let mut session = self.session.lock().unwrap();
            if session.id != sid {
                return false;
            }
            session.phase = phase;
        }
        self.emit_phase(sid, phase);
        true
    }

    fn fail_session(&self, sid: u64, error: &AnalysisError, clear_issues: bool) {
        let message = if error.is_retryable() {
            format!("{error}; try again")
        } else {
            error.to_string()
        };
        let applied = {
            let mut session = self.session.lock().unwrap();
            if session.id != sid {
                false
            } else {
                session.phase = AnalysisPhase::Failed;
                session.error = Some(message.clone());
                if clear_issues {
                    session.issues = None;
                }
                true
            }
        };
        if !applied {
            log::info!("Session {}: stale failure discarded", sid);
            return;
        }
        log::warn!("Session {} failed: {}", sid, message);
        self.emit_phase(sid, AnalysisPhase::Failed);
        self.emit(SessionEvent::AnalysisFailed {
            session_id: sid,
            message,
        });
    }

    fn emit_phase(&self, session_id: u64, phase: AnalysisPhase) {
        self.emit(SessionEvent::PhaseChanged { session_id, phase });
    }

    fn emit(&self, event: SessionEvent) {
        // The presentation layer may not be listening; that is fine.
        let _ = self.event_tx.send(event);
    }
}
