//! Token vocabulary of the report generator.

use std::collections::HashMap;
use std::path::Path;

use crate::core::{MrgError, MrgResult, SimpleError};

/// Token emitted for ids missing from the vocabulary.
pub const UNKNOWN_TOKEN: &str = "<unk>";

/// Maps token ids to tokens. Id 0 is reserved as the end-of-sequence marker.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    idx2token: HashMap<i64, String>,
}

impl Vocabulary {
    /// Builds a vocabulary from `(id, token)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (i64, String)>) -> Self {
        Self {
            idx2token: pairs.into_iter().collect(),
        }
    }

    /// Loads an `idx2token` JSON object such as `{"1": "the", "2": "heart"}`.
    ///
    /// # Errors
    ///
    /// `WeightLoad` when the file cannot be read, is not a JSON object of
    /// strings, or has a key that is not a positive integer.
    pub fn from_path(path: &Path) -> MrgResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MrgError::weight_load(path, "read vocabulary", e))?;
        let raw: HashMap<String, String> = serde_json::from_str(&content)
            .map_err(|e| MrgError::weight_load(path, "parse vocabulary", e))?;

        let mut idx2token = HashMap::with_capacity(raw.len());
        for (key, token) in raw {
            let id: i64 = key.trim().parse().map_err(|_| {
                MrgError::weight_load(
                    path,
                    "parse vocabulary",
                    SimpleError::new(format!("token id '{key}' is not an integer")),
                )
            })?;
            if id <= 0 {
                return Err(MrgError::weight_load(
                    path,
                    "parse vocabulary",
                    SimpleError::new(format!("token id {id} must be positive")),
                ));
            }
            idx2token.insert(id, token);
        }
        Ok(Self { idx2token })
    }

    pub fn len(&self) -> usize {
        self.idx2token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idx2token.is_empty()
    }

    /// Decodes one id sequence: tokens are joined by single spaces and the
    /// first id `<= 0` ends the sequence.
    pub fn decode(&self, ids: &[i64]) -> String {
        ids.iter()
            .take_while(|&&id| id > 0)
            .map(|id| {
                self.idx2token
                    .get(id)
                    .map(String::as_str)
                    .unwrap_or(UNKNOWN_TOKEN)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
