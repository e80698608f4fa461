//! Disease names, their classifier output indices, and decoded probabilities.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::{MrgError, MrgResult};

/// One disease and the index of its probability in the classifier output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseEntry {
    pub name: String,
    pub index: usize,
}

impl DiseaseEntry {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

/// Ordered mapping from disease name to classifier output index.
///
/// Iteration order is the order the diseases are listed in, which is also the
/// order they appear in rendered sentences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiseaseIndexMap {
    entries: Vec<DiseaseEntry>,
}

impl DiseaseIndexMap {
    /// Builds a map from an ordered list of entries.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the list is empty, a name is blank, or a name repeats.
    pub fn from_entries(entries: Vec<DiseaseEntry>) -> MrgResult<Self> {
        if entries.is_empty() {
            return Err(MrgError::invalid_input("disease map must not be empty"));
        }
        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.name.trim().is_empty() {
                return Err(MrgError::invalid_input("disease name must not be blank"));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(MrgError::invalid_input(format!(
                    "duplicate disease name '{}'",
                    entry.name
                )));
            }
        }
        Ok(Self { entries })
    }

    fn from_names(names: &[&str]) -> Self {
        Self {
            entries: names
                .iter()
                .enumerate()
                .map(|(index, name)| DiseaseEntry::new(*name, index))
                .collect(),
        }
    }

    /// The five findings composed into reports.
    pub fn five_diseases() -> Self {
        Self::from_names(&[
            "Cardiac hypertrophy",
            "Pulmonary edema",
            "Pulmonary consolidation",
            "Aatelectasis",
            "Pleural effusion",
        ])
    }

    /// The fourteen ChestX-ray14 labels.
    pub fn chestx_ray14() -> Self {
        Self::from_names(&[
            "Atelectasis",
            "Cardiomegaly",
            "Pleural_Effusion",
            "Infiltration",
            "Mass",
            "Nodule",
            "Pneumonia",
            "Pneumothorax",
            "Consolidation",
            "Edema",
            "Emphysema",
            "Fibrosis",
            "Pleural_Thickening",
            "Hernia",
        ])
    }

    /// Iterates `(name, index)` pairs in map order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|e| (e.name.as_str(), e.index))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of a disease by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.index)
    }

    /// Largest index referenced by the map.
    pub fn max_index(&self) -> usize {
        self.entries.iter().map(|e| e.index).max().unwrap_or(0)
    }
}

/// One probability per classifier output, in output order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbabilityVector(Vec<f32>);

impl ProbabilityVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.0.get(index).copied()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f32>> for ProbabilityVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}
