//! Image processors turning radiographs into model input tensors.
//!
//! - [`NormalizeImage`]: per-channel scale/mean/std normalization into CHW tensors
//! - [`ChexpertTransform`]: the configuration-driven classifier transform
//! - [`CxrPreprocessor`]: produces both model inputs from one image
//! - [`cv`]: grayscale equalization, blur and resize with OpenCV arithmetic

pub mod chexpert;
pub mod cv;
pub mod cxr;
pub mod normalization;

pub use chexpert::{ChexpertTransform, TargetSize};
pub use cxr::{CxrPreprocessor, PreprocessedPair};
pub use normalization::NormalizeImage;
