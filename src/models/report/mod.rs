//! Report generation: image in, candidate narrative reports out.
//!
//! The pipeline only depends on the [`ReportGenerator`] trait. The ONNX
//! implementation runs an exported image-to-text graph and decodes its token
//! ids with a [`Vocabulary`].

pub mod onnx;
pub mod vocab;

use std::sync::Arc;

use crate::core::config::ReportGeneratorConfig;
use crate::core::{MrgResult, Tensor4D};
pub use onnx::OnnxReportGenerator;
pub use vocab::Vocabulary;

/// Produces free-text radiology reports from the report-generator input tensor.
pub trait ReportGenerator: Send + Sync + std::fmt::Debug {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Generates candidate reports for a `(1, 3, 224, 224)` tensor. The first
    /// candidate is the one used in the final report.
    fn report(&self, input: &Tensor4D) -> MrgResult<Vec<String>>;
}

/// Builds the report generator selected by the configuration.
pub fn build_report_generator(cfg: &ReportGeneratorConfig) -> MrgResult<Arc<dyn ReportGenerator>> {
    match cfg {
        ReportGeneratorConfig::Onnx { .. } => Ok(Arc::new(OnnxReportGenerator::from_config(cfg)?)),
    }
}
