//! Pure region cropping logic — functional core.
//!
//! This module has zero infrastructure dependencies.
//! It takes pixel data in, returns pixel data out.

use image::{imageops, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// A pixel rectangle in frame-buffer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Crops an RGBA frame to the specified rectangle.
///
/// This is a pure function with no side effects.
///
/// # Arguments
/// * `image` - The full frame
/// * `rect` - The region to keep, in the frame's own pixel coordinates
///
/// # Returns
/// A new image with exactly `rect.width` x `rect.height` pixels
pub fn crop_region(image: &RgbaImage, rect: Rect) -> Result<RgbaImage, CropError> {
    if rect.width == 0 || rect.height == 0 {
        return Err(CropError::ZeroDimension);
    }

    let (img_width, img_height) = image.dimensions();

    // u64 so a huge widget offset can't wrap around and pass the check
    let right = u64::from(rect.x) + u64::from(rect.width);
    let bottom = u64::from(rect.y) + u64::from(rect.height);

    if right > u64::from(img_width) || bottom > u64::from(img_height) {
        return Err(CropError::OutOfBounds {
            requested: (rect.x, rect.y, rect.width, rect.height),
            image_size: (img_width, img_height),
        });
    }

    Ok(imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image())
}

/// Encodes an RGBA image as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut png_bytes: Vec<u8> = Vec::new();
    image.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)?;
    Ok(png_bytes)
}

#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error("Crop rectangle has zero width or height")]
    ZeroDimension,

    #[error(
        "Crop rectangle ({},{},{},{}) exceeds frame bounds ({}x{})",
        requested.0, requested.1, requested.2, requested.3,
        image_size.0, image_size.1
    )]
    OutOfBounds {
        requested: (u32, u32, u32, u32),
        image_size: (u32, u32),
    },
}
