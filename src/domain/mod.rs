//! Domain types shared by the classifier, the translator and the pipeline.

pub mod disease;
pub mod severity;

pub use disease::{DiseaseEntry, DiseaseIndexMap, ProbabilityVector};
pub use severity::SeverityLevel;
