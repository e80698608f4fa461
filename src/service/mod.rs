//! Request handling around the pipeline.
//!
//! A request carries a base64 encoded image and a UUID. The service decodes the
//! image, stores it, runs the pipeline, stores the report and answers with the
//! report text. Transport is left to the caller; the JSON shapes are
//! `{"encoded_img": "...", "unique_uuid": "..."}` in and `{"mrg_result": "..."}` out.

pub mod store;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::{MrgError, MrgResult};
use crate::pipeline::MrgPipeline;
pub use store::{ArtifactStore, canonical_request_id};

/// Incoming report request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MrgRequest {
    /// Base64 encoded image file.
    pub encoded_img: String,
    /// Client chosen request id; must be a UUID.
    pub unique_uuid: String,
}

/// Answer to an [`MrgRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MrgResponse {
    pub mrg_result: String,
}

/// Serves report requests with one shared pipeline.
#[derive(Debug, Clone)]
pub struct MrgService {
    pipeline: MrgPipeline,
    store: ArtifactStore,
}

impl MrgService {
    pub fn new(pipeline: MrgPipeline, store: ArtifactStore) -> Self {
        Self { pipeline, store }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Handles one request.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a bad id or bad base64, `InvalidImage` when the bytes
    /// are not an image, and any pipeline error.
    pub fn handle(&self, request: &MrgRequest) -> MrgResult<MrgResponse> {
        let id = canonical_request_id(&request.unique_uuid)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(request.encoded_img.trim())
            .map_err(|e| MrgError::invalid_input(format!("encoded_img is not valid base64: {e}")))?;
        info!("request {id}: {} image bytes", bytes.len());

        let image_path = self.store.save_image(&id, &bytes)?;
        let report = self.pipeline.get_report(&image_path)?;
        self.store.save_report(&id, &report)?;
        Ok(MrgResponse { mrg_result: report })
    }

    /// Handles a JSON request body and returns the JSON response body.
    pub fn handle_json(&self, body: &str) -> MrgResult<String> {
        let request: MrgRequest = serde_json::from_str(body)
            .map_err(|e| MrgError::invalid_input(format!("malformed request: {e}")))?;
        let response = self.handle(&request)?;
        to_json(&response)
    }
}

/// Encodes a response body. Failures are server-side, not caller input errors.
fn to_json<T: Serialize>(value: &T) -> MrgResult<String> {
    serde_json::to_string(value).map_err(|e| MrgError::serialization("cannot encode response", e))
}
