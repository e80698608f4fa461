//! The report generation pipeline.
//!
//! One call runs the preprocessor, the report generator on the 224x224 tensor,
//! the disease classifier on the configuration-driven tensor, and the
//! translator, and returns `narrative + "\n" + summary`. Either model failing
//! fails the call; nothing is cached between calls.

use candle_core::Device;
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::config::{ClassifierConfig, MrgConfig};
use crate::core::{DEFAULT_PARALLEL_THRESHOLD, MrgError, MrgResult, SimpleError};
use crate::domain::{DiseaseIndexMap, ProbabilityVector};
use crate::models::report::build_report_generator;
use crate::models::{CxrClassifier, DiseaseClassifier, ReportGenerator};
use crate::pipeline::translator::ProbabilityTranslator;
use crate::processors::{CxrPreprocessor, PreprocessedPair};

/// Intermediate results of one pipeline run.
#[derive(Debug, Clone)]
pub struct ReportParts {
    /// First candidate of the report generator.
    pub narrative: String,
    /// Decoded classifier output.
    pub probabilities: ProbabilityVector,
    /// Severity sentences rendered from `probabilities`.
    pub summary: String,
}

impl ReportParts {
    /// The final report text.
    pub fn compose(&self) -> String {
        format!("{}\n{}", self.narrative, self.summary)
    }
}

/// Chest X-ray report generation pipeline.
///
/// Immutable after construction and shareable across threads; concurrent calls
/// do not interfere.
#[derive(Debug, Clone)]
pub struct MrgPipeline {
    preprocessor: CxrPreprocessor,
    generator: Arc<dyn ReportGenerator>,
    classifier: Arc<dyn DiseaseClassifier>,
    translator: ProbabilityTranslator,
}

impl MrgPipeline {
    /// Assembles a pipeline from already built components.
    ///
    /// # Errors
    ///
    /// `ConfigError` when the disease map references an index the classifier
    /// does not produce.
    pub fn new(
        preprocessor: CxrPreprocessor,
        generator: Arc<dyn ReportGenerator>,
        classifier: Arc<dyn DiseaseClassifier>,
        diseases: DiseaseIndexMap,
    ) -> MrgResult<Self> {
        if diseases.max_index() >= classifier.num_outputs() {
            return Err(MrgError::config_error(format!(
                "disease map uses index {} but the classifier produces {} probabilities",
                diseases.max_index(),
                classifier.num_outputs()
            )));
        }
        Ok(Self {
            preprocessor,
            generator,
            classifier,
            translator: ProbabilityTranslator::new(diseases),
        })
    }

    /// Loads every model named by `cfg`. Paths in `cfg` must already be resolved.
    pub fn from_config(cfg: &MrgConfig, device: &Device) -> MrgResult<Self> {
        let classifier_cfg = ClassifierConfig::from_path(&cfg.classifier_config)?;
        let preprocessor = CxrPreprocessor::new(&classifier_cfg)?;
        let classifier = CxrClassifier::load(&classifier_cfg, &cfg.classifier_weights, device)?;
        let generator = build_report_generator(&cfg.report_generator)?;
        let diseases = cfg.disease_map.build()?;
        info!(
            "pipeline ready: report generator '{}', {} disease(s)",
            generator.name(),
            diseases.len()
        );
        Self::new(preprocessor, generator, Arc::new(classifier), diseases)
    }

    pub fn translator(&self) -> &ProbabilityTranslator {
        &self.translator
    }

    fn run(&self, pair: &PreprocessedPair) -> MrgResult<ReportParts> {
        let candidates = self.generator.report(&pair.report_input)?;
        let narrative = candidates.into_iter().next().ok_or_else(|| {
            MrgError::model_inference(
                self.generator.name(),
                "generate report",
                SimpleError::new("no candidate report returned"),
            )
        })?;
        let probabilities = self.classifier.infer(&pair.classifier_input)?;
        let summary = self.translator.translate(&probabilities)?;
        debug!("narrative: {narrative:?}, summary: {summary:?}");
        Ok(ReportParts {
            narrative,
            probabilities,
            summary,
        })
    }

    /// Runs the pipeline and keeps the intermediate results.
    pub fn analyze(&self, image_path: &Path) -> MrgResult<ReportParts> {
        let pair = self.preprocessor.preprocess(image_path)?;
        self.run(&pair)
    }

    /// Runs the pipeline on an already decoded image.
    pub fn analyze_image(&self, image: &image::DynamicImage) -> MrgResult<ReportParts> {
        let pair = self.preprocessor.preprocess_image(image)?;
        self.run(&pair)
    }

    /// Produces the report for the image at `image_path`.
    ///
    /// # Errors
    ///
    /// `InvalidImage` before any model is invoked when the image cannot be
    /// decoded; any model error fails the whole call.
    pub fn get_report(&self, image_path: &Path) -> MrgResult<String> {
        info!("generating report for {}", image_path.display());
        self.analyze(image_path).map(|parts| parts.compose())
    }

    /// Runs the pipeline once per path, in input order, keeping the
    /// intermediate results. Independent calls run in parallel when there is
    /// more than one path.
    pub fn analyze_many<P: AsRef<Path> + Sync>(&self, paths: &[P]) -> Vec<MrgResult<ReportParts>> {
        let analyze = |p: &P| {
            info!("generating report for {}", p.as_ref().display());
            self.analyze(p.as_ref())
        };
        if paths.len() > DEFAULT_PARALLEL_THRESHOLD {
            paths.par_iter().map(analyze).collect()
        } else {
            paths.iter().map(analyze).collect()
        }
    }

    /// Produces one report per path, in input order.
    pub fn get_reports<P: AsRef<Path> + Sync>(&self, paths: &[P]) -> Vec<MrgResult<String>> {
        self.analyze_many(paths)
            .into_iter()
            .map(|parts| parts.map(|p| p.compose()))
            .collect()
    }
}
