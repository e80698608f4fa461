//! Utility functions for loading and converting radiographs.

use crate::core::MrgError;
use image::{DynamicImage, GrayImage, RgbImage};
use std::path::Path;

/// Converts a DynamicImage to an RgbImage.
///
/// Single-channel images are broadcast to three identical channels.
pub fn dynamic_to_rgb(img: &DynamicImage) -> RgbImage {
    img.to_rgb8()
}

/// Converts a DynamicImage to an 8-bit GrayImage.
pub fn dynamic_to_gray(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Loads an image from a file path.
///
/// # Errors
///
/// Returns `MrgError::InvalidImage` if the file cannot be opened or decoded, or
/// if the decoded image has zero width or height.
pub fn load_image(path: &Path) -> Result<DynamicImage, MrgError> {
    // Format comes from the content, not the extension.
    let img = image::ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| MrgError::undecodable_image(path, image::ImageError::IoError(e)))?
        .decode()
        .map_err(|e| MrgError::undecodable_image(path, e))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(MrgError::invalid_image(
            path,
            format!("zero spatial extent ({}x{})", img.width(), img.height()),
        ));
    }
    Ok(img)
}
