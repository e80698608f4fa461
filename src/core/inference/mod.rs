//! ONNX Runtime inference engine.
//!
//! [`OrtInfer`] owns a small pool of sessions so that concurrent requests can run
//! the same model without serializing on a single session.

pub mod ort_infer;

pub use ort_infer::OrtInfer;
