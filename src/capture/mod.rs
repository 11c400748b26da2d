//! Screen capture domain — public API.
//!
//! This module owns turning one rendered frame into the image we upload.
//! External code should only use the public items exported here.

mod region;
mod screenshot;
mod stretch;

pub use region::{crop_region, encode_png, CropError, Rect};
pub use screenshot::{capture_primary_monitor, ScreenError};
pub use stretch::{StretchGuard, StretchSuspender};

use image::{DynamicImage, RgbaImage};

/// One frame, converted to RGBA8 and cropped if requested.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub image: RgbaImage,
}

impl CapturedFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Builds the image for a notification from a rendered frame.
///
/// `chat_bounds` of `None` keeps the full frame. `Some(rect)` crops to the
/// chat box; the caller must have looked the rectangle up while stretched
/// mode was off.
pub fn capture(frame: DynamicImage, chat_bounds: Option<Rect>) -> Result<CapturedFrame, CaptureError> {
    let full = frame.into_rgba8();

    let image = match chat_bounds {
        None => full,
        Some(rect) => crop_region(&full, rect)?,
    };

    log::debug!(
        "[CAPTURE] Frame ready ({}x{}, cropped: {})",
        image.width(),
        image.height(),
        chat_bounds.is_some()
    );

    Ok(CapturedFrame { image })
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error(transparent)]
    Crop(#[from] CropError),

    #[error("Chat box bounds are not available")]
    ChatboxUnavailable,

    #[error("Frame source dropped the request before a frame was rendered")]
    FrameDropped,
}
