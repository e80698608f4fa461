//! Tensor type aliases shared by the preprocessors and the ONNX runtime wrapper.

/// Type alias for a 4D tensor of f32 values (batch, channels, height, width).
pub type Tensor4D = ndarray::Array4<f32>;
