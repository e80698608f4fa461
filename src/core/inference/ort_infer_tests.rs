use super::*;
use crate::core::config::OrtSessionConfig;

#[test]
fn test_missing_model_is_weight_load_error() {
    let result = OrtInfer::new("dummy_path.onnx", None);
    assert!(matches!(result, Err(MrgError::WeightLoad { .. })));
}

#[test]
fn test_from_config_respects_session_config() {
    let cfg = OrtSessionConfig::new().with_intra_threads(2);
    let result = OrtInfer::from_config("dummy_path.onnx", Some("images"), None, 3, Some(&cfg));
    assert!(result.is_err());
}
