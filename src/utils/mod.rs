//! Utility functions for the report generation pipeline.

pub mod candle;
pub mod image;

pub use candle::{candle_to_mrg_inference, candle_to_mrg_processing, parse_device};
pub use self::image::{dynamic_to_gray, dynamic_to_rgb, load_image};
