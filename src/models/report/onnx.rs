//! ONNX Runtime backed report generator.

use ndarray::Array2;
use tracing::{debug, info};

use super::{ReportGenerator, Vocabulary};
use crate::core::config::ReportGeneratorConfig;
use crate::core::{MrgError, MrgResult, OrtInfer, SimpleError, Tensor4D};

/// Runs an image-to-text graph that emits token ids.
#[derive(Debug)]
pub struct OnnxReportGenerator {
    infer: OrtInfer,
    vocab: Vocabulary,
}

impl OnnxReportGenerator {
    pub fn new(infer: OrtInfer, vocab: Vocabulary) -> Self {
        Self { infer, vocab }
    }

    /// Creates the session pool and loads the vocabulary.
    ///
    /// # Errors
    ///
    /// `WeightLoad` when the model or the vocabulary cannot be loaded.
    pub fn from_config(cfg: &ReportGeneratorConfig) -> MrgResult<Self> {
        let ReportGeneratorConfig::Onnx {
            model_path,
            vocab_path,
            input_name,
            output_name,
            session_pool_size,
            ort_session,
        } = cfg;

        info!(
            "loading report generator from {} ({} session(s))",
            model_path.display(),
            session_pool_size
        );
        let infer = OrtInfer::from_config(
            model_path,
            Some(input_name.as_str()),
            output_name.as_deref(),
            *session_pool_size,
            ort_session.as_ref(),
        )?;
        let vocab = Vocabulary::from_path(vocab_path)?;
        debug!("report vocabulary has {} tokens", vocab.len());
        Ok(Self::new(infer, vocab))
    }
}

/// Decodes every row of `ids` into text, requiring a non-empty first row.
pub(crate) fn decode_candidates(
    vocab: &Vocabulary,
    ids: &Array2<i64>,
    model_name: &str,
) -> MrgResult<Vec<String>> {
    let candidates: Vec<String> = ids
        .rows()
        .into_iter()
        .map(|row| vocab.decode(&row.to_vec()))
        .collect();
    match candidates.first() {
        Some(first) if !first.trim().is_empty() => Ok(candidates),
        _ => Err(MrgError::model_inference(
            model_name,
            "decode report",
            SimpleError::new("generator produced an empty report"),
        )),
    }
}

impl ReportGenerator for OnnxReportGenerator {
    fn name(&self) -> &str {
        self.infer.model_name()
    }

    fn report(&self, input: &Tensor4D) -> MrgResult<Vec<String>> {
        let ids = self.infer.infer_token_ids(input)?;
        debug!("report generator returned token ids {:?}", ids.shape());
        decode_candidates(&self.vocab, &ids, self.infer.model_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn vocab() -> Vocabulary {
        Vocabulary::from_pairs([
            (1, "no".to_string()),
            (2, "acute".to_string()),
            (3, "findings".to_string()),
        ])
    }

    #[test]
    fn test_decode_candidates_in_row_order() {
        let ids = array![[1, 2, 3, 0], [3, 0, 0, 0]];
        let out = decode_candidates(&vocab(), &ids, "r2gen").unwrap();
        assert_eq!(out, vec!["no acute findings".to_string(), "findings".to_string()]);
    }

    #[test]
    fn test_empty_first_candidate_is_inference_error() {
        let ids = array![[0, 1, 2], [1, 2, 3]];
        let err = decode_candidates(&vocab(), &ids, "r2gen").unwrap_err();
        assert!(matches!(err, MrgError::ModelInference { .. }));

        let none = Array2::<i64>::zeros((0, 4));
        assert!(decode_candidates(&vocab(), &none, "r2gen").is_err());
    }

    #[test]
    fn test_from_config_missing_model() {
        let cfg = ReportGeneratorConfig::Onnx {
            model_path: "/nonexistent/r2gen.onnx".into(),
            vocab_path: "/nonexistent/vocab.json".into(),
            input_name: "images".to_string(),
            output_name: None,
            session_pool_size: 1,
            ort_session: None,
        };
        assert!(OnnxReportGenerator::from_config(&cfg).is_err());
    }
}
