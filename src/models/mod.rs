//! Models of the report generation pipeline.
//!
//! The disease classifier runs on candle with weights from safetensors; the
//! report generator runs an ONNX graph through ONNX Runtime.

pub mod classification;
pub mod report;

pub use classification::{CxrClassifier, DiseaseClassifier};
pub use report::{OnnxReportGenerator, ReportGenerator, Vocabulary};
