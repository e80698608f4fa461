//! Per-request artifact storage.
//!
//! Every request owns `<root>/<uuid>/`, holding `<uuid>.png` (the uploaded
//! image) and `<uuid>.txt` (the generated report).

use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::core::{MrgError, MrgResult};

/// Filesystem store for uploaded images and generated reports.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

/// Parses a request id, returning its canonical hyphenated form.
///
/// Only UUIDs are accepted, so an id can never name a path outside the store.
pub fn canonical_request_id(id: &str) -> MrgResult<String> {
    Uuid::parse_str(id.trim())
        .map(|uuid| uuid.hyphenated().to_string())
        .map_err(|e| MrgError::invalid_input(format!("request id '{id}' is not a UUID: {e}")))
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of request `id`, created on demand.
    pub fn request_dir(&self, id: &str) -> MrgResult<PathBuf> {
        let id = canonical_request_id(id)?;
        let dir = self.root.join(&id);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn artifact_path(&self, id: &str, extension: &str) -> MrgResult<PathBuf> {
        let dir = self.request_dir(id)?;
        let id = canonical_request_id(id)?;
        Ok(dir.join(format!("{id}.{extension}")))
    }

    /// Writes the uploaded image bytes as `<uuid>.png`.
    pub fn save_image(&self, id: &str, bytes: &[u8]) -> MrgResult<PathBuf> {
        let path = self.artifact_path(id, "png")?;
        std::fs::write(&path, bytes)?;
        debug!("stored {} image bytes at {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Writes the report as `<uuid>.txt`.
    pub fn save_report(&self, id: &str, report: &str) -> MrgResult<PathBuf> {
        let path = self.artifact_path(id, "txt")?;
        std::fs::write(&path, report)?;
        debug!("stored report at {}", path.display());
        Ok(path)
    }
}
