//! Classifier-side image transform.
//!
//! Reproduces the transform the disease classifier was trained with: grayscale
//! input, optional histogram equalization and Gaussian blur, broadcast to three
//! channels, aspect-preserving resize of the long side followed by bottom/right
//! padding to a square (or a plain resize), then `(x - pixel_mean) / pixel_std`.

use image::{DynamicImage, GrayImage};
use tracing::debug;

use crate::core::config::{BorderPad, ClassifierConfig};
use crate::core::{MrgError, Tensor4D};
use crate::processors::NormalizeImage;
use crate::processors::cv;
use crate::utils::dynamic_to_gray;

/// How the transformed image reaches its final spatial size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetSize {
    /// Resize the long side to `long_side`, keep the aspect ratio and pad to a square.
    FixRatio { long_side: u32 },
    /// Resize to exactly `width` x `height`.
    Exact { width: u32, height: u32 },
}

/// Transform producing the classifier input tensor.
#[derive(Debug, Clone)]
pub struct ChexpertTransform {
    equalize_hist: bool,
    blur_kernel: Option<Vec<f32>>,
    target: TargetSize,
    border_pad: BorderPad,
    pixel_mean: f32,
    normalizer: NormalizeImage,
}

/// Size after scaling the long side to `long_side`, rounding half to even.
pub fn fix_ratio_size(width: u32, height: u32, long_side: u32) -> (u32, u32) {
    let (w, h) = (width as f64, height as f64);
    let (new_w, new_h) = if h >= w {
        let ratio = h / w;
        (
            (long_side as f64 / ratio).round_ties_even(),
            long_side as f64,
        )
    } else {
        let ratio = w / h;
        (
            long_side as f64,
            (long_side as f64 / ratio).round_ties_even(),
        )
    };
    ((new_w as u32).max(1), (new_h as u32).max(1))
}

impl ChexpertTransform {
    /// Builds the transform from the classifier configuration.
    pub fn from_config(cfg: &ClassifierConfig) -> Result<Self, MrgError> {
        if cfg.gaussian_blur > 0 && cfg.gaussian_blur % 2 == 0 {
            return Err(MrgError::config_error(format!(
                "gaussian_blur kernel must be odd, got {}",
                cfg.gaussian_blur
            )));
        }
        let std = if cfg.use_pixel_std { cfg.pixel_std } else { 1.0 };
        let normalizer = NormalizeImage::raw(cfg.pixel_mean, std)?;
        let target = if cfg.fix_ratio {
            TargetSize::FixRatio {
                long_side: cfg.long_side,
            }
        } else {
            TargetSize::Exact {
                width: cfg.width,
                height: cfg.height,
            }
        };

        Ok(Self {
            equalize_hist: cfg.use_equalize_hist,
            // A 1x1 kernel leaves the image untouched.
            blur_kernel: (cfg.gaussian_blur > 1).then(|| cv::gaussian_kernel(cfg.gaussian_blur)),
            target,
            border_pad: cfg.border_pad,
            pixel_mean: cfg.pixel_mean,
            normalizer,
        })
    }

    /// Spatial size (height, width) of the produced tensor.
    pub fn output_shape(&self) -> (u32, u32) {
        match self.target {
            TargetSize::FixRatio { long_side } => (long_side, long_side),
            TargetSize::Exact { width, height } => (height, width),
        }
    }

    fn prepare_gray(&self, img: &DynamicImage) -> GrayImage {
        let mut gray = dynamic_to_gray(img);
        if self.equalize_hist {
            gray = cv::equalize_hist(&gray);
        }
        if let Some(kernel) = &self.blur_kernel {
            gray = cv::gaussian_blur(&gray, kernel);
        }
        gray
    }

    fn resize(&self, gray: &GrayImage) -> GrayImage {
        let (new_w, new_h) = match self.target {
            TargetSize::FixRatio { long_side } => {
                fix_ratio_size(gray.width(), gray.height(), long_side)
            }
            TargetSize::Exact { width, height } => (width, height),
        };
        cv::resize_linear(gray, new_w, new_h)
    }

    /// Applies the transform, returning a `(1, 3, H, W)` tensor.
    pub fn apply(&self, img: &DynamicImage) -> Result<Tensor4D, MrgError> {
        // The three channels are identical copies of the gray plane.
        let resized = self.resize(&self.prepare_gray(img));

        let (canvas_h, canvas_w) = self.output_shape();
        let (w, h) = resized.dimensions();
        debug!(
            "classifier transform: {}x{} -> {}x{} on {}x{} canvas",
            img.width(),
            img.height(),
            w,
            h,
            canvas_w,
            canvas_h
        );

        let (cw, ch) = (canvas_w as usize, canvas_h as usize);
        let mut data = vec![0.0f32; 3 * ch * cw];
        for y in 0..canvas_h {
            for x in 0..canvas_w {
                let inside = x < w && y < h;
                let raw = if inside {
                    resized.get_pixel(x, y)[0] as f32
                } else {
                    match self.border_pad {
                        BorderPad::Zero => 0.0,
                        BorderPad::PixelMean => self.pixel_mean,
                        BorderPad::Edge => resized.get_pixel(x.min(w - 1), y.min(h - 1))[0] as f32,
                    }
                };
                for c in 0..3 {
                    data[c * ch * cw + y as usize * cw + x as usize] =
                        self.normalizer.apply(c, raw);
                }
            }
        }

        ndarray::Array4::from_shape_vec((1, 3, ch, cw), data).map_err(|e| {
            MrgError::normalization("failed to create classifier input tensor", e)
        })
    }
}
