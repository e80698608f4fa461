//! Radiograph preprocessing for both models.
//!
//! One source image yields two independent tensors: a 224x224 ImageNet-normalized
//! tensor for the report generator and a configuration-driven tensor for the
//! disease classifier.

use image::{DynamicImage, imageops::FilterType};
use std::path::Path;
use tracing::debug;

use crate::core::config::ClassifierConfig;
use crate::core::constants::REPORT_INPUT_SHAPE;
use crate::core::{MrgError, Tensor4D};
use crate::processors::{ChexpertTransform, NormalizeImage};
use crate::utils::{dynamic_to_rgb, load_image};

/// The two model inputs derived from one radiograph.
#[derive(Debug, Clone)]
pub struct PreprocessedPair {
    /// `(1, 3, 224, 224)` input of the report generator.
    pub report_input: Tensor4D,
    /// `(1, 3, H, W)` input of the disease classifier.
    pub classifier_input: Tensor4D,
}

/// Turns an image file into the inputs of both models.
#[derive(Debug, Clone)]
pub struct CxrPreprocessor {
    report_shape: (u32, u32),
    report_filter: FilterType,
    report_normalizer: NormalizeImage,
    classifier_transform: ChexpertTransform,
}

impl CxrPreprocessor {
    /// Creates the preprocessor; the classifier branch follows `classifier_cfg`.
    pub fn new(classifier_cfg: &ClassifierConfig) -> Result<Self, MrgError> {
        Ok(Self {
            report_shape: REPORT_INPUT_SHAPE,
            report_filter: FilterType::Triangle,
            report_normalizer: NormalizeImage::imagenet()?,
            classifier_transform: ChexpertTransform::from_config(classifier_cfg)?,
        })
    }

    /// Loads the image at `path` and produces both tensors.
    ///
    /// # Errors
    ///
    /// `MrgError::InvalidImage` when the file cannot be decoded or is empty.
    pub fn preprocess(&self, path: &Path) -> Result<PreprocessedPair, MrgError> {
        let img = load_image(path)?;
        self.preprocess_image(&img)
    }

    /// Produces both tensors from an already decoded image.
    pub fn preprocess_image(&self, img: &DynamicImage) -> Result<PreprocessedPair, MrgError> {
        let report_input = self.report_tensor(img)?;
        let classifier_input = self.classifier_transform.apply(img)?;
        debug!(
            "preprocessed {}x{} image: report {:?}, classifier {:?}",
            img.width(),
            img.height(),
            report_input.shape(),
            classifier_input.shape()
        );
        Ok(PreprocessedPair {
            report_input,
            classifier_input,
        })
    }

    fn report_tensor(&self, img: &DynamicImage) -> Result<Tensor4D, MrgError> {
        let rgb = dynamic_to_rgb(img);
        let (height, width) = self.report_shape;
        let resized = image::imageops::resize(&rgb, width, height, self.report_filter);
        self.report_normalizer.normalize_to(&resized)
    }
}
