// Frame capture: turn the current content of a playable media handle
// into one encoded still image.

pub mod frame;

pub use frame::{capture_frame, CapturedFrame, JPEG_MIME};
