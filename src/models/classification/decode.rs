//! Logit decoding into per-disease probabilities.

use crate::core::{MrgError, MrgResult, SimpleError};
use crate::domain::ProbabilityVector;

/// How raw head outputs become probabilities, derived from the training criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    /// `BCE` and `FL`: every logit is an independent sigmoid.
    Independent,
    /// `CE`: each head is a softmax and the positive class is index 1.
    TwoClass,
}

impl Criterion {
    /// Parses the configured criterion.
    ///
    /// # Errors
    ///
    /// `UnsupportedCriterion` for anything other than `BCE`, `FL` or `CE`.
    pub fn parse(criterion: &str) -> MrgResult<Self> {
        match criterion {
            "BCE" | "FL" => Ok(Self::Independent),
            "CE" => Ok(Self::TwoClass),
            other => Err(MrgError::UnsupportedCriterion {
                criterion: other.to_string(),
            }),
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Turns per-head logits into a [`ProbabilityVector`].
#[derive(Debug, Clone, Copy)]
pub struct ProbabilityDecoder {
    criterion: Criterion,
    model_name: &'static str,
}

impl ProbabilityDecoder {
    pub fn new(criterion: Criterion) -> Self {
        Self {
            criterion,
            model_name: "cxr-classifier",
        }
    }

    pub fn criterion(&self) -> Criterion {
        self.criterion
    }

    /// Decodes one logit slice per head.
    ///
    /// Independent decoding flattens all heads in order; two-class decoding
    /// yields one probability per head.
    ///
    /// # Errors
    ///
    /// `ModelInference` when a logit is not finite or a two-class head has
    /// fewer than two outputs.
    pub fn decode(&self, heads: &[Vec<f32>]) -> MrgResult<ProbabilityVector> {
        if let Some(bad) = heads.iter().flatten().find(|v| !v.is_finite()) {
            return Err(MrgError::model_inference(
                self.model_name,
                "decode logits",
                SimpleError::new(format!("non-finite logit {bad}")),
            ));
        }

        let probs = match self.criterion {
            Criterion::Independent => heads.iter().flatten().map(|&x| sigmoid(x)).collect(),
            Criterion::TwoClass => {
                let mut probs = Vec::with_capacity(heads.len());
                for (i, head) in heads.iter().enumerate() {
                    if head.len() < 2 {
                        return Err(MrgError::model_inference(
                            self.model_name,
                            "decode logits",
                            SimpleError::new(format!(
                                "head {i} has {} outputs, two-class decoding needs at least 2",
                                head.len()
                            )),
                        ));
                    }
                    probs.push(softmax(head)[1]);
                }
                probs
            }
        };
        Ok(ProbabilityVector::new(probs))
    }
}
