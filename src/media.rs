// media.rs — Owns the current media source: a live camera stream or an
// uploaded video file. The controller is the only component allowed to
// stop a live stream, and it guarantees at most one is active at a time.

use async_trait::async_trait;
use image::RgbImage;
use serde::Serialize;
use std::sync::Arc;

use crate::error::AnalysisError;

/// Which kind of media source the user has selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MediaMode {
    Webcam,
    Upload,
}

/// Camera permission state, meaningful in `Webcam` mode only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PermissionState {
    Unknown,
    Granted,
    Denied,
}

/// A playable piece of media that can render its current visual content.
///
/// `is_ready` means enough data is buffered to paint a frame. A freshly
/// opened live stream may report ready before it has painted anything —
/// callers handle that with a short warm-up delay before capturing.
pub trait MediaHandle: Send {
    fn is_ready(&self) -> bool;

    /// Intrinsic pixel dimensions. Either may be zero while the source is
    /// still settling; capture refuses zero-area handles.
    fn dimensions(&self) -> (u32, u32);

    /// Render the current visual content as raw RGB pixels.
    /// Returns `None` when nothing has been painted yet.
    fn current_frame(&self) -> Option<RgbImage>;
}

/// A live camera stream. Stopping must be idempotent.
pub trait LiveStream: MediaHandle {
    fn stop(&mut self);
}

/// External camera capability: request access and obtain a live stream.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Ask for camera access. Denial and hardware failure both surface as
    /// an error; the caller translates that into a permission state.
    async fn open(&self) -> Result<Box<dyn LiveStream>, AnalysisError>;
}

/// A user-chosen video file together with its playable handle.
pub struct UploadedVideo {
    pub file_name: String,
    pub mime_type: String,
    handle: Box<dyn MediaHandle>,
}

impl UploadedVideo {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        handle: Box<dyn MediaHandle>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            handle,
        }
    }
}

/// Tracks the active media source and owns the live-stream resource.
pub struct MediaSourceController {
    camera: Arc<dyn CameraDevice>,
    mode: MediaMode,
    stream: Option<Box<dyn LiveStream>>,
    upload: Option<UploadedVideo>,
    permission: PermissionState,
}

impl MediaSourceController {
    pub fn new(camera: Arc<dyn CameraDevice>) -> Self {
        Self {
            camera,
            mode: MediaMode::Webcam,
            stream: None,
            upload: None,
            permission: PermissionState::Unknown,
        }
    }

    pub fn mode(&self) -> MediaMode {
        self.mode
    }

    pub fn permission(&self) -> PermissionState {
        self.permission
    }

    /// Switch the active source variant. Leaving `Webcam` releases the live
    /// stream before any other state changes; switching also discards any
    /// uploaded file, since results are mode-specific. Idempotent when the
    /// mode is unchanged.
    pub fn select_mode(&mut self, mode: MediaMode) {
        if mode == self.mode {
            return;
        }
        if self.mode == MediaMode::Webcam {
            self.release_stream();
        }
        self.upload = None;
        self.mode = mode;
        log::info!("Media mode switched to {:?}", mode);
    }

    /// Request camera access and store the resulting live stream.
    ///
    /// Denial is a reported, non-fatal condition: the permission state moves
    /// to `Denied` and the controller stays usable (the user can switch to
    /// upload mode).
    pub async fn acquire_webcam(&mut self) -> Result<(), AnalysisError> {
        if self.mode != MediaMode::Webcam {
            return Err(AnalysisError::NotReady("webcam mode is not active"));
        }
        // Never hold two streams, even across re-acquisition.
        self.release_stream();

        match self.camera.open().await {
            Ok(stream) => {
                self.stream = Some(stream);
                self.permission = PermissionState::Granted;
                log::info!("Webcam stream acquired");
                Ok(())
            }
            Err(e) => {
                self.permission = PermissionState::Denied;
                log::warn!("Webcam acquisition failed: {}", e);
                Err(AnalysisError::PermissionDenied)
            }
        }
    }

    /// Accept a user-chosen file, rejecting anything that is not a video.
    /// On rejection the previously accepted file (if any) is kept.
    pub fn set_uploaded_file(&mut self, video: UploadedVideo) -> Result<(), AnalysisError> {
        if !video.mime_type.starts_with("video/") {
            log::warn!("Rejected upload {:?} ({})", video.file_name, video.mime_type);
            return Err(AnalysisError::InvalidFileType(video.mime_type));
        }
        log::info!("Upload accepted: {:?}", video.file_name);
        self.upload = Some(video);
        Ok(())
    }

    pub fn has_upload(&self) -> bool {
        self.upload.is_some()
    }

    /// The single playable handle for the active mode, if any.
    pub fn current_media(&self) -> Option<&dyn MediaHandle> {
        match self.mode {
            MediaMode::Webcam => self.stream.as_deref().map(|s| s as &dyn MediaHandle),
            MediaMode::Upload => self.upload.as_ref().map(|u| u.handle.as_ref()),
        }
    }

    /// True when the active source can render a frame right now.
    pub fn is_playable(&self) -> bool {
        self.current_media().map(|h| h.is_ready()).unwrap_or(false)
    }

    /// Release the live stream. Safe to call any number of times.
    pub fn teardown(&mut self) {
        self.release_stream();
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            log::info!("Webcam stream stopped");
        }
    }
}

impl Drop for MediaSourceController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FakeStream {
        stops: Arc<AtomicU32>,
        stopped: bool,
    }

    impl MediaHandle for FakeStream {
        fn is_ready(&self) -> bool {
            !self.stopped
        }
        fn dimensions(&self) -> (u32, u32) {
            (640, 480)
        }
        fn current_frame(&self) -> Option<RgbImage> {
            Some(RgbImage::new(640, 480))
        }
    }

    impl LiveStream for FakeStream {
        fn stop(&mut self) {
            if !self.stopped {
                self.stopped = true;
                self.stops.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    struct FakeCamera {
        grant: bool,
        stops: Arc<AtomicU32>,
        opens: AtomicU32,
    }

    impl FakeCamera {
        fn new(grant: bool) -> Self {
            Self {
                grant,
                stops: Arc::new(AtomicU32::new(0)),
                opens: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl CameraDevice for FakeCamera {
        async fn open(&self) -> Result<Box<dyn LiveStream>, AnalysisError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.grant {
                Ok(Box::new(FakeStream {
                    stops: Arc::clone(&self.stops),
                    stopped: false,
                }))
            } else {
                Err(AnalysisError::PermissionDenied)
            }
        }
    }

    fn video(mime: &str) -> UploadedVideo {
        UploadedVideo::new(
            "clip.webm",
            mime,
            Box::new(FakeStream {
                stops: Arc::new(AtomicU32::new(0)),
                stopped: false,
            }),
        )
    }

    #[tokio::test]
    async fn grant_sets_permission_and_stores_stream() {
        let camera = Arc::new(FakeCamera::new(true));
        let mut ctl = MediaSourceController::new(camera);
        assert_eq!(ctl.permission(), PermissionState::Unknown);

        ctl.acquire_webcam().await.unwrap();
        assert_eq!(ctl.permission(), PermissionState::Granted);
        assert!(ctl.is_playable());
    }

    #[tokio::test]
    async fn denial_is_reported_but_not_fatal() {
        let camera = Arc::new(FakeCamera::new(false));
        let mut ctl = MediaSourceController::new(camera);

        let err = ctl.acquire_webcam().await.unwrap_err();
        assert!(matches!(err, AnalysisError::PermissionDenied));
        assert_eq!(ctl.permission(), PermissionState::Denied);
        assert!(!ctl.is_playable());

        // Still usable: switching to upload mode works.
        ctl.select_mode(MediaMode::Upload);
        ctl.set_uploaded_file(video("video/webm")).unwrap();
        assert!(ctl.is_playable());
    }

    #[tokio::test]
    async fn switching_away_from_webcam_stops_the_stream() {
        let camera = Arc::new(FakeCamera::new(true));
        let stops = Arc::clone(&camera.stops);
        let mut ctl = MediaSourceController::new(camera);
        ctl.acquire_webcam().await.unwrap();

        ctl.select_mode(MediaMode::Upload);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(ctl.current_media().is_none());
    }

    #[tokio::test]
    async fn reacquisition_never_leaves_two_streams() {
        let camera = Arc::new(FakeCamera::new(true));
        let stops = Arc::clone(&camera.stops);
        let mut ctl = MediaSourceController::new(camera);

        ctl.acquire_webcam().await.unwrap();
        ctl.acquire_webcam().await.unwrap();
        // The first stream was stopped before the second was stored.
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn teardown_is_idempotent() {
        let camera = Arc::new(FakeCamera::new(true));
        let stops = Arc::clone(&camera.stops);
        let mut ctl = MediaSourceController::new(camera);
        ctl.acquire_webcam().await.unwrap();

        ctl.teardown();
        ctl.teardown();
        drop(ctl);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn select_mode_is_idempotent() {
        let mut ctl = MediaSourceController::new(Arc::new(FakeCamera::new(true)));
        ctl.select_mode(MediaMode::Upload);
        ctl.set_uploaded_file(video("video/mp4")).unwrap();

        // Re-selecting the current mode keeps the uploaded file.
        ctl.select_mode(MediaMode::Upload);
        assert!(ctl.has_upload());

        // An actual switch discards it.
        ctl.select_mode(MediaMode::Webcam);
        assert!(!ctl.has_upload());
    }

    #[test]
    fn non_video_upload_is_rejected_and_prior_file_kept() {
        let mut ctl = MediaSourceController::new(Arc::new(FakeCamera::new(true)));
        ctl.select_mode(MediaMode::Upload);
        ctl.set_uploaded_file(video("video/mp4")).unwrap();

        let err = ctl.set_uploaded_file(video("image/png")).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidFileType(_)));
        assert!(ctl.has_upload());
        assert!(ctl.is_playable());
    }

    #[test]
    fn acquire_requires_webcam_mode() {
        let mut ctl = MediaSourceController::new(Arc::new(FakeCamera::new(true)));
        ctl.select_mode(MediaMode::Upload);
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let err = rt.block_on(ctl.acquire_webcam()).unwrap_err();
        assert!(matches!(err, AnalysisError::NotReady(_)));
    }
}
