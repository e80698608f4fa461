//! Error types for the report generation pipeline.
//!
//! Every fallible operation in the crate returns [`MrgResult`]. The variants map
//! one-to-one onto the failure kinds callers care about: a bad input image, a
//! classifier configured with a decoding rule we do not implement, weights that
//! do not match the configured architecture, and failures inside a model call.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Stage of tensor preparation where a processing error occurred.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcessingStage {
    /// Error occurred during tensor operations.
    TensorOperation,
    /// Error occurred during image normalization.
    Normalization,
    /// Error occurred while encoding a response.
    Serialization,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::TensorOperation => write!(f, "tensor operation"),
            ProcessingStage::Normalization => write!(f, "normalization"),
            ProcessingStage::Serialization => write!(f, "serialization"),
        }
    }
}

/// Errors produced by the preprocessor, the models, the translator and the
/// request service.
#[derive(Error, Debug)]
pub enum MrgError {
    /// The input file could not be decoded or has zero spatial extent.
    #[error("invalid image '{}': {message}", path.display())]
    InvalidImage {
        /// Path of the rejected image.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
        /// Decoder error, when decoding was the problem.
        #[source]
        source: Option<image::ImageError>,
    },

    /// The classifier configuration names a decoding rule that is not implemented.
    #[error("unsupported criterion '{criterion}' (expected BCE, FL or CE)")]
    UnsupportedCriterion {
        /// The criterion string found in the configuration.
        criterion: String,
    },

    /// Weights could not be loaded or do not match the configured architecture.
    #[error("failed to load weights from '{}': {context}", path.display())]
    WeightLoad {
        /// Weight artifact path.
        path: PathBuf,
        /// What was being loaded.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A model forward pass failed.
    #[error("inference failed in model '{model_name}': {context}")]
    ModelInference {
        /// Name of the model that failed.
        model_name: String,
        /// Additional context about the failure.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error occurred while preparing tensors.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from ndarray shape handling.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

/// Convenient result alias for pipeline operations.
pub type MrgResult<T> = Result<T, MrgError>;

/// Minimal error carrying only a message, used as a `source` when there is no
/// underlying library error.
#[derive(Debug)]
pub struct SimpleError {
    message: String,
}

impl SimpleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SimpleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SimpleError {}

impl MrgError {
    /// Creates an `InvalidImage` error without an underlying decoder error.
    pub fn invalid_image(path: &Path, message: impl Into<String>) -> Self {
        Self::InvalidImage {
            path: path.to_path_buf(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates an `InvalidImage` error from a decoder failure.
    pub fn undecodable_image(path: &Path, error: image::ImageError) -> Self {
        Self::InvalidImage {
            path: path.to_path_buf(),
            message: "cannot decode image".to_string(),
            source: Some(error),
        }
    }

    /// Creates a `WeightLoad` error.
    pub fn weight_load(
        path: &Path,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::WeightLoad {
            path: path.to_path_buf(),
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a `ModelInference` error.
    pub fn model_inference(
        model_name: &str,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ModelInference {
            model_name: model_name.to_string(),
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a `Processing` error for tensor operations.
    pub fn tensor_operation(
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind: ProcessingStage::TensorOperation,
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a `Processing` error for normalization.
    pub fn normalization(
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind: ProcessingStage::Normalization,
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a `Processing` error for response encoding.
    pub fn serialization(
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind: ProcessingStage::Serialization,
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a `ConfigError`.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Creates an `InvalidInput` error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Returns true for errors raised before any model was invoked because the
    /// input image was rejected.
    pub fn is_invalid_image(&self) -> bool {
        matches!(self, Self::InvalidImage { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_image_display_includes_path() {
        let err = MrgError::invalid_image(Path::new("/tmp/a.png"), "zero width");
        let text = err.to_string();
        assert!(text.contains("/tmp/a.png"));
        assert!(text.contains("zero width"));
        assert!(err.is_invalid_image());
    }

    #[test]
    fn test_model_inference_keeps_source() {
        use std::error::Error as _;

        let err = MrgError::model_inference("classifier", "forward", SimpleError::new("nan"));
        assert_eq!(
            err.to_string(),
            "inference failed in model 'classifier': forward"
        );
        assert_eq!(err.source().map(|s| s.to_string()), Some("nan".to_string()));
    }

    #[test]
    fn test_unsupported_criterion_message() {
        let err = MrgError::UnsupportedCriterion {
            criterion: "MSE".to_string(),
        };
        assert!(err.to_string().contains("'MSE'"));
    }

    #[test]
    fn test_serialization_error_is_a_processing_failure() {
        let err = MrgError::serialization("encode response", SimpleError::new("bad key"));
        assert_eq!(err.to_string(), "serialization failed: encode response");
        assert!(matches!(
            err,
            MrgError::Processing {
                kind: ProcessingStage::Serialization,
                ..
            }
        ));
    }
}
