//! Chest X-ray disease classification.
//!
//! - [`backbone`]: Inception-v3 and VGG feature extractors
//! - [`norm`]: normalization layers shared by the backbones and heads
//! - [`pooling`]: global pooling of the feature map
//! - [`decode`]: logit decoding per training criterion
//! - [`classifier`]: the assembled model and the [`DiseaseClassifier`] trait

pub mod backbone;
pub mod classifier;
pub mod decode;
pub mod norm;
pub mod pooling;

pub use classifier::{CxrClassifier, DiseaseClassifier};
pub use decode::{Criterion, ProbabilityDecoder};
pub use pooling::GlobalPool;
