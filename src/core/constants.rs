//! Constants used throughout the report generation pipeline.
//!
//! The normalization statistics and input sizes must match what the models were
//! trained with. A mismatch does not raise an error, it silently degrades the
//! model output.

/// ImageNet per-channel mean (RGB), used by the report generator input and the
/// Inception input re-mapping.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet per-channel standard deviation (RGB).
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Spatial size (height, width) of the report generator input.
pub const REPORT_INPUT_SHAPE: (u32, u32) = (224, 224);

/// The default threshold for parallel processing.
///
/// Batches with more images than this are processed with rayon.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 1;

/// Number of groups used when the backbone is configured with group normalization.
pub const GROUP_NORM_GROUPS: usize = 32;
