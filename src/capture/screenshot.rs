//! Full-screen capture using the `xcap` crate.
//!
//! This is the infrastructure layer — it talks to the OS. The desktop
//! host uses it as its frame source; a real game client hands us its
//! own rendered frames instead.

use image::DynamicImage;
use xcap::Monitor;

/// Captures the primary monitor's screen as a `DynamicImage`.
///
/// Returns the full-screen screenshot including all pixels.
/// The caller is responsible for cropping to the chat box.
pub fn capture_primary_monitor() -> Result<DynamicImage, ScreenError> {
    let monitors = Monitor::all().map_err(|e| ScreenError::MonitorEnumeration(e.to_string()))?;

    let mut fallback = None;
    let mut primary = None;
    for monitor in monitors {
        if monitor.is_primary().unwrap_or(false) {
            primary = Some(monitor);
            break;
        }
        // If no monitor reports as primary, use the first one
        if fallback.is_none() {
            fallback = Some(monitor);
        }
    }

    let monitor = primary.or(fallback).ok_or(ScreenError::NoPrimaryMonitor)?;

    let image = monitor
        .capture_image()
        .map_err(|e| ScreenError::CaptureFailed(e.to_string()))?;

    Ok(DynamicImage::ImageRgba8(image))
}

#[derive(Debug, thiserror::Error)]
pub enum ScreenError {
    #[error("Failed to enumerate monitors: {0}")]
    MonitorEnumeration(String),

    #[error("No primary monitor found")]
    NoPrimaryMonitor,

    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),
}
