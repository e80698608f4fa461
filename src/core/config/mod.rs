//! Configuration types.
//!
//! - [`ClassifierConfig`]: network and transform hyperparameters of the disease classifier
//! - [`MrgConfig`]: process configuration tying models, disease map and artifact storage together
//! - [`OrtSessionConfig`]: ONNX Runtime session options

pub mod classifier;
pub mod onnx;
pub mod pipeline;

pub use classifier::{Backbone, BorderPad, ClassifierConfig, GlobalPoolType, NormType};
pub use onnx::{OrtGraphOptimizationLevel, OrtSessionConfig};
pub use pipeline::{DiseaseMapConfig, DiseaseMapPreset, MrgConfig, ReportGeneratorConfig};
