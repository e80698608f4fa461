//! # CXR MRG
//!
//! Medical report generation for chest radiographs. One image goes in; a
//! narrative report followed by a disease severity summary comes out.
//!
//! ## Components
//!
//! - **Report generator**: an exported image-to-text ONNX graph whose token ids
//!   are decoded with a vocabulary
//! - **Disease classifier**: an Inception v3 or VGG backbone with one head per
//!   disease group, run with candle from safetensors weights
//! - **Translator**: grades each disease probability into a severity tier and
//!   renders the tiers as sentences
//!
//! ## Modules
//!
//! * [`core`] - Error handling, configuration, constants and ONNX Runtime integration
//! * [`domain`] - Disease index maps, probability vectors and severity levels
//! * [`models`] - Report generator and disease classifier
//! * [`pipeline`] - Orchestration and probability-to-text translation
//! * [`processors`] - Image preprocessing for both models
//! * [`service`] - Request handling with per-request artifact storage
//! * [`utils`] - Image loading and candle helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cxr_mrg::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = MrgConfig::from_path("mrg.json")?;
//! let device = parse_device("cpu")?;
//! let pipeline = MrgPipeline::from_config(&cfg, &device)?;
//!
//! let report = pipeline.get_report(Path::new("cxr.png"))?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```
//!
//! ### JSON Configuration
//!
//! ```json
//! {
//!   "classifier_config": "config/JF.json",
//!   "classifier_weights": "weights/JFchexpert.safetensors",
//!   "report_generator": {
//!     "kind": "onnx",
//!     "model_path": "weights/r2gen.onnx",
//!     "vocab_path": "weights/idx2token.json"
//!   },
//!   "disease_map": "five",
//!   "assets_dir": "assets"
//! }
//! ```
//!
//! Relative paths are resolved against the directory of the configuration file.

pub mod core;
pub mod domain;
pub mod models;
pub mod pipeline;
pub mod processors;
pub mod service;
pub mod utils;

/// Prelude module for convenient imports.
///
/// ```rust
/// use cxr_mrg::prelude::*;
/// ```
///
/// Covers the common path: loading a configuration, building the pipeline and
/// handling requests. Model internals live in [`crate::models`].
pub mod prelude {
    pub use crate::core::config::{ClassifierConfig, MrgConfig};
    pub use crate::core::{MrgError, MrgResult};
    pub use crate::domain::{DiseaseIndexMap, ProbabilityVector, SeverityLevel};
    pub use crate::pipeline::{MrgPipeline, ProbabilityTranslator, translate};
    pub use crate::service::{ArtifactStore, MrgRequest, MrgResponse, MrgService};
    pub use crate::utils::{load_image, parse_device};
}
