// frame.rs — Renders a media handle's current content into an offscreen
// raster, downscales if oversized, and JPEG-encodes it for transport.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, GenericImageView};

use crate::error::AnalysisError;
use crate::media::MediaHandle;

/// The one encoding the system uses; fixed for its lifetime.
pub const JPEG_MIME: &str = "image/jpeg";

/// An immutable encoded still image plus its pixel dimensions.
///
/// Invariant: `width` and `height` are both non-zero — capture fails with
/// `FrameNotReady` instead of producing a zero-area frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl CapturedFrame {
    /// Self-describing transport payload: `data:image/jpeg;base64,…`.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", JPEG_MIME, BASE64.encode(&self.jpeg))
    }
}

/// Capture one still image from `handle`.
///
/// Preconditions: the handle reports ready, has non-zero intrinsic
/// dimensions, and has painted at least one frame. Frames wider than
/// `max_width` are downscaled with aspect preserved before encoding.
///
/// A freshly started live stream may report ready before it has painted;
/// the caller is responsible for a short warm-up delay first.
pub fn capture_frame(
    handle: &dyn MediaHandle,
    max_width: u32,
    jpeg_quality: u8,
) -> Result<CapturedFrame, AnalysisError> {
    if !handle.is_ready() {
        return Err(AnalysisError::FrameNotReady("media is not ready to play"));
    }
    let (w, h) = handle.dimensions();
    if w == 0 || h == 0 {
        return Err(AnalysisError::FrameNotReady("media has zero-size frame"));
    }

    let pixels = handle
        .current_frame()
        .ok_or(AnalysisError::FrameNotReady("no frame painted yet"))?;

    let img = DynamicImage::ImageRgb8(pixels);

    let img = if img.width() > max_width {
        let ratio = max_width as f64 / img.width() as f64;
        let new_h = (img.height() as f64 * ratio).round().max(1.0) as u32;
        img.resize_exact(max_width, new_h, imageops::FilterType::Triangle)
    } else {
        img
    };

    let (out_w, out_h) = img.dimensions();

    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, jpeg_quality);
    if let Err(e) = encoder.encode(
        img.to_rgb8().as_raw(),
        out_w,
        out_h,
        image::ExtendedColorType::Rgb8,
    ) {
        log::error!("JPEG encode failed: {}", e);
        return Err(AnalysisError::FrameNotReady("jpeg encode failed"));
    }

    log::debug!("Captured frame {}x{} ({} bytes)", out_w, out_h, jpeg.len());

    Ok(CapturedFrame {
        jpeg,
        width: out_w,
        height: out_h,
    })
}
