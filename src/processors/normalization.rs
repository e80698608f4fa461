//! Per-channel image normalization.
//!
//! Pixel values are mapped as `value * alpha[c] + beta[c]` where
//! `alpha = scale / std` and `beta = -mean / std`, and laid out in CHW order
//! with a leading batch dimension of 1.

use crate::core::constants::{IMAGENET_MEAN, IMAGENET_STD};
use crate::core::{MrgError, Tensor4D};
use image::RgbImage;

/// Normalizes RGB images into model input tensors.
#[derive(Debug, Clone)]
pub struct NormalizeImage {
    /// Scaling factors for each channel (alpha = scale / std)
    pub alpha: Vec<f32>,
    /// Offset values for each channel (beta = -mean / std)
    pub beta: Vec<f32>,
}

impl NormalizeImage {
    /// Creates a new NormalizeImage instance with the specified parameters.
    ///
    /// # Arguments
    ///
    /// * `scale` - Optional scaling factor (defaults to 1.0/255.0)
    /// * `mean` - Optional mean values for each channel (defaults to the ImageNet mean)
    /// * `std` - Optional standard deviation values for each channel (defaults to the ImageNet std)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * Scale is less than or equal to 0
    /// * Mean or std vectors don't have exactly 3 elements
    /// * Any standard deviation value is less than or equal to 0
    pub fn new(
        scale: Option<f32>,
        mean: Option<Vec<f32>>,
        std: Option<Vec<f32>>,
    ) -> Result<Self, MrgError> {
        let scale = scale.unwrap_or(1.0 / 255.0);
        let mean = mean.unwrap_or_else(|| IMAGENET_MEAN.to_vec());
        let std = std.unwrap_or_else(|| IMAGENET_STD.to_vec());

        if scale <= 0.0 {
            return Err(MrgError::config_error("Scale must be greater than 0"));
        }

        if mean.len() != 3 {
            return Err(MrgError::config_error(
                "Mean must have exactly 3 elements for RGB",
            ));
        }

        if std.len() != 3 {
            return Err(MrgError::config_error(
                "Std must have exactly 3 elements for RGB",
            ));
        }

        for (i, &s) in std.iter().enumerate() {
            if s <= 0.0 {
                return Err(MrgError::config_error(format!(
                    "Standard deviation at index {i} must be greater than 0, got {s}"
                )));
            }
        }

        let alpha: Vec<f32> = std.iter().map(|s| scale / s).collect();
        let beta: Vec<f32> = mean.iter().zip(&std).map(|(m, s)| -m / s).collect();

        Ok(Self { alpha, beta })
    }

    /// ImageNet normalization of `[0, 255]` pixels: `(x / 255 - mean) / std`.
    pub fn imagenet() -> Result<Self, MrgError> {
        Self::new(None, None, None)
    }

    /// Normalization applied directly to raw `[0, 255]` values:
    /// `(x - mean) / std` with the same statistics on every channel.
    pub fn raw(mean: f32, std: f32) -> Result<Self, MrgError> {
        Self::new(Some(1.0), Some(vec![mean; 3]), Some(vec![std; 3]))
    }

    /// Normalizes a single raw channel value.
    #[inline]
    pub fn apply(&self, channel: usize, value: f32) -> f32 {
        value * self.alpha[channel] + self.beta[channel]
    }

    /// Normalizes an image into a `(1, 3, H, W)` tensor.
    pub fn normalize_to(&self, img: &RgbImage) -> Result<Tensor4D, MrgError> {
        let (width, height) = img.dimensions();
        let (w, h) = (width as usize, height as usize);
        let mut result = vec![0.0f32; 3 * h * w];

        for (x, y, pixel) in img.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                result[c * h * w + y * w + x] = self.apply(c, pixel[c] as f32);
            }
        }

        ndarray::Array4::from_shape_vec((1, 3, h, w), result).map_err(|e| {
            MrgError::normalization(
                format!("failed to create CHW tensor for {}x{} image", width, height),
                e,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(NormalizeImage::new(Some(0.0), None, None).is_err());
        assert!(NormalizeImage::new(None, Some(vec![0.5, 0.5]), None).is_err());
        assert!(NormalizeImage::new(None, None, Some(vec![1.0, 0.0, 1.0])).is_err());
    }

    #[test]
    fn test_imagenet_values() {
        let norm = NormalizeImage::imagenet().unwrap();
        let img = RgbImage::from_pixel(2, 2, Rgb([255, 0, 128]));
        let tensor = norm.normalize_to(&img).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 2, 2]);

        let expected_r = (1.0 - 0.485) / 0.229;
        let expected_g = (0.0 - 0.456) / 0.224;
        let expected_b = (128.0 / 255.0 - 0.406) / 0.225;
        assert!((tensor[[0, 0, 1, 1]] - expected_r).abs() < 1e-5);
        assert!((tensor[[0, 1, 0, 0]] - expected_g).abs() < 1e-5);
        assert!((tensor[[0, 2, 1, 0]] - expected_b).abs() < 1e-5);
    }

    #[test]
    fn test_raw_statistics() {
        let norm = NormalizeImage::raw(128.0, 64.0).unwrap();
        assert!((norm.apply(0, 128.0)).abs() < 1e-6);
        assert!((norm.apply(2, 192.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_chw_layout() {
        let norm = NormalizeImage::raw(0.0, 1.0).unwrap();
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(2, 1, Rgb([10, 20, 30]));
        let tensor = norm.normalize_to(&img).unwrap();
        assert_eq!(tensor[[0, 0, 1, 2]], 10.0);
        assert_eq!(tensor[[0, 1, 1, 2]], 20.0);
        assert_eq!(tensor[[0, 2, 1, 2]], 30.0);
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
    }
}
