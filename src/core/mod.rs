//! The core module of the report generation pipeline.
//!
//! This module contains the fundamental pieces shared by every component:
//! - Error handling
//! - Configuration management
//! - Constants (normalization statistics, input sizes)
//! - ONNX Runtime integration
//! - Tensor type aliases

pub mod batch;
pub mod config;
pub mod constants;
pub mod errors;
pub mod inference;

pub use batch::Tensor4D;
pub use config::{ClassifierConfig, MrgConfig, OrtSessionConfig, ReportGeneratorConfig};
pub use constants::*;
pub use errors::{MrgError, MrgResult, ProcessingStage, SimpleError};
pub use inference::OrtInfer;

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and formatting layer.
/// It's typically called at the start of an application to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
