//! Probability-to-text translation.
//!
//! Each disease of the index map is graded into a [`SeverityLevel`] and the
//! non-empty tiers above [`SeverityLevel::NoSign`] are rendered as one sentence
//! each, in ascending tier order:
//!
//! ```text
//! Small possibility of Aatelectasis.Patient is likely to have Pulmonary consolidation.
//! ```
//!
//! Sentences are concatenated without a separator. Diseases graded
//! `NoSign` are computed but never rendered.

use tracing::warn;

use crate::core::{MrgError, MrgResult};
use crate::domain::{DiseaseIndexMap, ProbabilityVector, SeverityLevel};

/// Disease names grouped by tier, each group in index-map order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grading {
    tiers: [Vec<String>; 4],
}

impl Grading {
    /// Names assigned to `level`.
    pub fn names(&self, level: SeverityLevel) -> &[String] {
        &self.tiers[level.as_index()]
    }

    /// Iterates non-empty tiers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (SeverityLevel, &[String])> {
        SeverityLevel::ALL
            .into_iter()
            .map(|level| (level, self.names(level)))
            .filter(|(_, names)| !names.is_empty())
    }

    /// Total number of graded diseases.
    pub fn len(&self) -> usize {
        self.tiers.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Renders a probability vector as severity sentences for a fixed disease map.
#[derive(Debug, Clone)]
pub struct ProbabilityTranslator {
    diseases: DiseaseIndexMap,
}

impl ProbabilityTranslator {
    pub fn new(diseases: DiseaseIndexMap) -> Self {
        Self { diseases }
    }

    pub fn disease_map(&self) -> &DiseaseIndexMap {
        &self.diseases
    }

    fn score(&self, probs: &ProbabilityVector, name: &str, index: usize) -> MrgResult<f32> {
        probs.get(index).ok_or_else(|| {
            MrgError::invalid_input(format!(
                "disease '{name}' maps to index {index} but only {} probabilities are available",
                probs.len()
            ))
        })
    }

    /// Groups the diseases by severity tier.
    ///
    /// Negative and NaN scores belong to no tier and are skipped.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when a disease index is outside the probability vector.
    pub fn grade(&self, probs: &ProbabilityVector) -> MrgResult<Grading> {
        let mut grading = Grading::default();
        for (name, index) in self.diseases.iter() {
            let score = self.score(probs, name, index)?;
            match SeverityLevel::from_probability(score) {
                Some(level) => grading.tiers[level.as_index()].push(name.to_string()),
                None => warn!("skipping '{}' with out-of-range score {}", name, score),
            }
        }
        Ok(grading)
    }

    /// Renders the severity sentences.
    pub fn translate(&self, probs: &ProbabilityVector) -> MrgResult<String> {
        let grading = self.grade(probs)?;
        let mut text = String::new();
        for (level, names) in grading.iter() {
            if level == SeverityLevel::NoSign {
                continue;
            }
            text.push_str(level.prefix());
            text.push(' ');
            text.push_str(&names.join(", "));
            text.push('.');
        }
        Ok(text)
    }

    /// Renders every score, e.g. `Edema score: 0.050, Mass score: 0.950.`
    pub fn score_summary(&self, probs: &ProbabilityVector) -> MrgResult<String> {
        let parts = self
            .diseases
            .iter()
            .map(|(name, index)| {
                self.score(probs, name, index)
                    .map(|score| format!("{name} score: {score:.3}"))
            })
            .collect::<MrgResult<Vec<_>>>()?;
        Ok(format!("{}.", parts.join(", ")))
    }
}

/// Translates `probs` with `diseases` in one call.
pub fn translate(probs: &ProbabilityVector, diseases: &DiseaseIndexMap) -> MrgResult<String> {
    ProbabilityTranslator::new(diseases.clone()).translate(probs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DiseaseEntry;

    fn five() -> ProbabilityTranslator {
        ProbabilityTranslator::new(DiseaseIndexMap::five_diseases())
    }

    fn probs(values: &[f32]) -> ProbabilityVector {
        ProbabilityVector::from(values.to_vec())
    }

    #[test]
    fn test_five_disease_report() {
        let text = five()
            .translate(&probs(&[0.05, 0.95, 0.6, 0.3, 0.1]))
            .unwrap();
        assert_eq!(
            text,
            "Small possibility of Aatelectasis.\
             Patient is likely to have Pulmonary consolidation.\
             Definitely have Pulmonary edema."
        );
    }

    #[test]
    fn test_all_low_scores_render_nothing() {
        let text = five().translate(&probs(&[0.0, 0.1, 0.19, 0.05, 0.199])).unwrap();
        assert_eq!(text, "");
    }

    #[test]
    fn test_tier_boundaries() {
        let text = five()
            .translate(&probs(&[0.2, 0.5, 0.9, 0.89999, 1.0]))
            .unwrap();
        assert_eq!(
            text,
            "Small possibility of Cardiac hypertrophy.\
             Patient is likely to have Pulmonary edema, Aatelectasis.\
             Definitely have Pulmonary consolidation, Pleural effusion."
        );
    }

    #[test]
    fn test_names_keep_map_order_within_tier() {
        let text = five().translate(&probs(&[0.3, 0.3, 0.3, 0.3, 0.3])).unwrap();
        assert_eq!(
            text,
            "Small possibility of Cardiac hypertrophy, Pulmonary edema, \
             Pulmonary consolidation, Aatelectasis, Pleural effusion."
        );
    }

    #[test]
    fn test_grade_keeps_no_sign_tier() {
        let grading = five().grade(&probs(&[0.05, 0.95, 0.6, 0.3, 0.1])).unwrap();
        assert_eq!(
            grading.names(SeverityLevel::NoSign),
            &["Cardiac hypertrophy".to_string(), "Pleural effusion".to_string()]
        );
        assert_eq!(grading.len(), 5);
        assert_eq!(grading.iter().count(), 4);
    }

    #[test]
    fn test_negative_and_nan_scores_are_skipped() {
        let translator = five();
        let p = probs(&[-0.5, f32::NAN, 0.95, 0.0, 1.5]);
        let grading = translator.grade(&p).unwrap();
        assert_eq!(grading.len(), 3);
        assert_eq!(
            translator.translate(&p).unwrap(),
            "Definitely have Pulmonary consolidation, Pleural effusion."
        );
    }

    #[test]
    fn test_index_out_of_range() {
        let err = five().translate(&probs(&[0.5, 0.5])).unwrap_err();
        assert!(matches!(err, MrgError::InvalidInput { .. }));
    }

    #[test]
    fn test_custom_map_reads_mapped_indices() {
        let map = DiseaseIndexMap::from_entries(vec![
            DiseaseEntry::new("Edema", 9),
            DiseaseEntry::new("Mass", 4),
        ])
        .unwrap();
        let mut values = vec![0.0; 14];
        values[9] = 0.7;
        values[4] = 0.7;
        assert_eq!(
            translate(&probs(&values), &map).unwrap(),
            "Patient is likely to have Edema, Mass."
        );
    }

    #[test]
    fn test_score_summary() {
        let summary = five()
            .score_summary(&probs(&[0.05, 0.95, 0.6, 0.3, 0.1]))
            .unwrap();
        assert_eq!(
            summary,
            "Cardiac hypertrophy score: 0.050, Pulmonary edema score: 0.950, \
             Pulmonary consolidation score: 0.600, Aatelectasis score: 0.300, \
             Pleural effusion score: 0.100."
        );
    }

    #[test]
    fn test_translation_is_deterministic() {
        let p = probs(&[0.21, 0.49, 0.51, 0.89, 0.91]);
        assert_eq!(five().translate(&p).unwrap(), five().translate(&p).unwrap());
    }
}
