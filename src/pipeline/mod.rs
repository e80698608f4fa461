//! The report generation pipeline.
//!
//! [`MrgPipeline`] wires the preprocessor, both models and the
//! [`ProbabilityTranslator`] together.

pub mod orchestrator;
pub mod translator;

pub use orchestrator::{MrgPipeline, ReportParts};
pub use translator::{Grading, ProbabilityTranslator, translate};
