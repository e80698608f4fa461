use super::*;
use crate::core::config::{OrtGraphOptimizationLevel, OrtSessionConfig};
use ort::logging::LogLevel;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use std::path::Path;

impl OrtInfer {
    /// Creates a new OrtInfer instance with default ONNX Runtime settings and a single session.
    pub fn new(model_path: impl AsRef<Path>, input_name: Option<&str>) -> Result<Self, MrgError> {
        Self::from_config(model_path, input_name, None, 1, None)
    }

    /// Creates a pool of `pool_size` sessions for the model, applying the optional
    /// session configuration to each of them.
    pub fn from_config(
        model_path: impl AsRef<Path>,
        input_name: Option<&str>,
        output_name: Option<&str>,
        pool_size: usize,
        ort_session: Option<&OrtSessionConfig>,
    ) -> Result<Self, MrgError> {
        let path = model_path.as_ref();
        let pool_size = pool_size.max(1);
        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let builder = Session::builder()?;
            let builder = match ort_session {
                Some(cfg) => Self::apply_ort_config(builder, cfg)?,
                None => builder.with_log_level(LogLevel::Error)?,
            };
            let session = builder.commit_from_file(path).map_err(|e| {
                MrgError::weight_load(path, "failed to create ONNX session", e)
            })?;
            sessions.push(Mutex::new(session));
        }

        let model_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown_model")
            .to_string();

        Ok(OrtInfer {
            sessions,
            next_idx: std::sync::atomic::AtomicUsize::new(0),
            input_name: input_name.unwrap_or("images").to_string(),
            output_name: output_name.map(|s| s.to_string()),
            model_path: path.to_path_buf(),
            model_name,
        })
    }

    fn apply_ort_config(
        builder: SessionBuilder,
        cfg: &OrtSessionConfig,
    ) -> Result<SessionBuilder, MrgError> {
        let mut builder = builder.with_log_level(LogLevel::Error)?;
        if let Some(threads) = cfg.intra_threads {
            builder = builder.with_intra_threads(threads)?;
        }
        if let Some(threads) = cfg.inter_threads {
            builder = builder.with_inter_threads(threads)?;
        }
        if let Some(parallel) = cfg.parallel_execution {
            builder = builder.with_parallel_execution(parallel)?;
        }
        if let Some(level) = cfg.optimization_level {
            let level = match level {
                OrtGraphOptimizationLevel::DisableAll => GraphOptimizationLevel::Disable,
                OrtGraphOptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
                OrtGraphOptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
                OrtGraphOptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
            };
            builder = builder.with_optimization_level(level)?;
        }
        Ok(builder)
    }
}
