//! Candle helpers: device selection and error mapping.

use candle_core::Device;

use crate::core::MrgError;

#[cfg(not(feature = "cuda"))]
fn cuda_not_enabled() -> MrgError {
    MrgError::config_error("CUDA support not enabled. Compile with --features cuda")
}

/// Parses a device string into a Candle [`Device`].
///
/// Accepts `"cpu"`, `"cuda"` (or `"gpu"`) for CUDA device 0, and `"cuda:N"`.
///
/// # Errors
///
/// `ConfigError` for unknown strings, a malformed ordinal, or CUDA requested
/// without the `cuda` feature.
pub fn parse_device(device_str: &str) -> Result<Device, MrgError> {
    let device_str = device_str.trim().to_lowercase();
    match device_str.as_str() {
        "cpu" => Ok(Device::Cpu),
        "cuda" | "gpu" => cuda_device(0),
        s if s.starts_with("cuda:") => {
            let ordinal: usize = s["cuda:".len()..].parse().map_err(|_| {
                MrgError::config_error(format!("Invalid CUDA device ordinal in '{}'", s))
            })?;
            cuda_device(ordinal)
        }
        _ => Err(MrgError::config_error(format!(
            "Unknown device: '{}'. Use 'cpu', 'cuda', or 'cuda:N'",
            device_str
        ))),
    }
}

#[cfg(feature = "cuda")]
fn cuda_device(ordinal: usize) -> Result<Device, MrgError> {
    Device::new_cuda(ordinal).map_err(|e| {
        MrgError::config_error(format!("Failed to create CUDA device {}: {}", ordinal, e))
    })
}

#[cfg(not(feature = "cuda"))]
fn cuda_device(_ordinal: usize) -> Result<Device, MrgError> {
    Err(cuda_not_enabled())
}

/// Converts a Candle error raised during a forward pass.
pub fn candle_to_mrg_inference(
    model_name: &str,
    context: impl Into<String>,
    err: candle_core::Error,
) -> MrgError {
    MrgError::model_inference(model_name, context, err)
}

/// Converts a Candle error raised while moving data between ndarray and Candle.
pub fn candle_to_mrg_processing(context: impl Into<String>, err: candle_core::Error) -> MrgError {
    MrgError::tensor_operation(context, err)
}
