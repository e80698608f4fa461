//! Disease classifier configuration.
//!
//! The classifier is described by a JSON file holding both the network
//! hyperparameters and the statistics of the transform it was trained with.
//! The file is read once at process start and is immutable afterwards.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::errors::{MrgError, MrgResult};

/// Convolutional backbone producing the feature map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backbone {
    InceptionV3,
    Vgg11,
    Vgg11Bn,
    Vgg13,
    Vgg13Bn,
    Vgg16,
    Vgg16Bn,
    Vgg19,
    Vgg19Bn,
}

impl Backbone {
    /// Number of channels of the feature map the backbone emits.
    pub fn num_features(self) -> usize {
        match self {
            Backbone::InceptionV3 => 2048,
            _ => 512,
        }
    }

    /// Human readable name used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Backbone::InceptionV3 => "inception_v3",
            Backbone::Vgg11 => "vgg11",
            Backbone::Vgg11Bn => "vgg11_bn",
            Backbone::Vgg13 => "vgg13",
            Backbone::Vgg13Bn => "vgg13_bn",
            Backbone::Vgg16 => "vgg16",
            Backbone::Vgg16Bn => "vgg16_bn",
            Backbone::Vgg19 => "vgg19",
            Backbone::Vgg19Bn => "vgg19_bn",
        }
    }
}

/// Normalization layer following every backbone convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormType {
    BatchNorm,
    GroupNorm,
    InstanceNorm,
}

/// Global pooling applied to the feature map before the per-disease heads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GlobalPoolType {
    Avg,
    Max,
    Pcam,
    AvgMax,
    Lse,
    AvgMaxLse,
}

/// How the resized classifier input is padded up to a square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderPad {
    /// Pad with zeros.
    Zero,
    /// Pad with `pixel_mean`, which becomes zero after normalization.
    PixelMean,
    /// Replicate the edge pixels.
    Edge,
}

/// The immutable model configuration of the disease classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_backbone")]
    pub backbone: Backbone,

    #[serde(default = "default_norm_type")]
    pub norm_type: NormType,

    /// Output size of each disease head, one entry per head.
    #[serde(default = "default_num_classes")]
    pub num_classes: Vec<usize>,

    /// Training criterion; decides how logits are decoded.
    #[serde(default = "default_criterion")]
    pub criterion: String,

    /// Whether the backbone started from ImageNet weights. Enables the
    /// Inception input re-mapping.
    #[serde(default = "default_true")]
    pub pretrained: bool,

    #[serde(default = "default_global_pool")]
    pub global_pool: GlobalPoolType,

    #[serde(default = "default_lse_gamma")]
    pub lse_gamma: f32,

    /// Whether each head is preceded by a batch norm on the pooled feature.
    #[serde(default)]
    pub fc_bn: bool,

    /// Dropout before the heads. Training only.
    #[serde(default)]
    pub fc_drop: f32,

    #[serde(default = "default_attention_map")]
    pub attention_map: String,

    #[serde(default = "default_pixel_mean")]
    pub pixel_mean: f32,

    #[serde(default = "default_pixel_std")]
    pub pixel_std: f32,

    #[serde(default = "default_true")]
    pub use_pixel_std: bool,

    #[serde(rename = "use_equalizeHist", default = "default_true")]
    pub use_equalize_hist: bool,

    /// Gaussian blur kernel size; 0 disables the blur.
    #[serde(default = "default_gaussian_blur")]
    pub gaussian_blur: u32,

    #[serde(default = "default_border_pad")]
    pub border_pad: BorderPad,

    #[serde(default = "default_true")]
    pub fix_ratio: bool,

    #[serde(default = "default_side")]
    pub long_side: u32,

    #[serde(default = "default_side")]
    pub width: u32,

    #[serde(default = "default_side")]
    pub height: u32,
}

fn default_backbone() -> Backbone {
    Backbone::InceptionV3
}

fn default_norm_type() -> NormType {
    NormType::BatchNorm
}

fn default_num_classes() -> Vec<usize> {
    vec![1; 5]
}

fn default_criterion() -> String {
    "BCE".to_string()
}

fn default_true() -> bool {
    true
}

fn default_global_pool() -> GlobalPoolType {
    GlobalPoolType::AvgMax
}

fn default_lse_gamma() -> f32 {
    0.5
}

fn default_attention_map() -> String {
    "None".to_string()
}

fn default_pixel_mean() -> f32 {
    128.0
}

fn default_pixel_std() -> f32 {
    64.0
}

fn default_gaussian_blur() -> u32 {
    3
}

fn default_border_pad() -> BorderPad {
    BorderPad::PixelMean
}

fn default_side() -> u32 {
    512
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backbone: default_backbone(),
            norm_type: default_norm_type(),
            num_classes: default_num_classes(),
            criterion: default_criterion(),
            pretrained: true,
            global_pool: default_global_pool(),
            lse_gamma: default_lse_gamma(),
            fc_bn: false,
            fc_drop: 0.0,
            attention_map: default_attention_map(),
            pixel_mean: default_pixel_mean(),
            pixel_std: default_pixel_std(),
            use_pixel_std: true,
            use_equalize_hist: true,
            gaussian_blur: default_gaussian_blur(),
            border_pad: default_border_pad(),
            fix_ratio: true,
            long_side: default_side(),
            width: default_side(),
            height: default_side(),
        }
    }
}

impl ClassifierConfig {
    /// Loads and validates a classifier configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> MrgResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MrgError::config_error(format!(
                "failed to read classifier config from {}: {}",
                path.display(),
                e
            ))
        })?;
        let cfg: Self = serde_json::from_str(&content).map_err(|e| {
            MrgError::config_error(format!("failed to parse classifier config: {}", e))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks the invariants the classifier and its transform rely on.
    pub fn validate(&self) -> MrgResult<()> {
        if self.num_classes.is_empty() {
            return Err(MrgError::config_error("num_classes must not be empty"));
        }
        if let Some(i) = self.num_classes.iter().position(|&n| n == 0) {
            return Err(MrgError::config_error(format!(
                "num_classes[{i}] must be at least 1"
            )));
        }
        if self.criterion == "CE" && self.num_classes.iter().any(|&n| n < 2) {
            return Err(MrgError::config_error(
                "criterion CE requires at least two classes per head",
            ));
        }
        if self.attention_map != "None" {
            return Err(MrgError::config_error(format!(
                "attention map '{}' is not supported",
                self.attention_map
            )));
        }
        if self.fix_ratio && self.long_side == 0 {
            return Err(MrgError::config_error("long_side must be greater than 0"));
        }
        if !self.fix_ratio && (self.width == 0 || self.height == 0) {
            return Err(MrgError::config_error(
                "width and height must be greater than 0",
            ));
        }
        if self.use_pixel_std && self.pixel_std <= 0.0 {
            return Err(MrgError::config_error("pixel_std must be greater than 0"));
        }
        if self.global_pool == GlobalPoolType::Pcam && self.num_classes.iter().any(|&n| n != 1) {
            return Err(MrgError::config_error(
                "PCAM pooling requires single-output heads",
            ));
        }
        let uses_lse = matches!(
            self.global_pool,
            GlobalPoolType::Lse | GlobalPoolType::AvgMaxLse
        );
        if uses_lse && !(self.lse_gamma > 0.0 && self.lse_gamma.is_finite()) {
            return Err(MrgError::config_error(format!(
                "lse_gamma must be a positive finite number, got {}",
                self.lse_gamma
            )));
        }
        Ok(())
    }

    /// Number of disease heads.
    pub fn num_heads(&self) -> usize {
        self.num_classes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chexpert_layout() {
        let json = r#"{
            "backbone": "vgg16_bn",
            "norm_type": "GroupNorm",
            "num_classes": [1, 1, 1, 1, 1],
            "criterion": "BCE",
            "pretrained": false,
            "global_pool": "AVG_MAX_LSE",
            "use_equalizeHist": false,
            "border_pad": "zero",
            "long_side": 384
        }"#;
        let cfg: ClassifierConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.backbone, Backbone::Vgg16Bn);
        assert_eq!(cfg.norm_type, NormType::GroupNorm);
        assert_eq!(cfg.global_pool, GlobalPoolType::AvgMaxLse);
        assert!(!cfg.use_equalize_hist);
        assert_eq!(cfg.border_pad, BorderPad::Zero);
        assert_eq!(cfg.long_side, 384);
        // Defaults fill the rest.
        assert_eq!(cfg.pixel_mean, 128.0);
        assert_eq!(cfg.gaussian_blur, 3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_unknown_criterion_still_parses() {
        // Criterion is checked when the classifier is built, not when parsing.
        let cfg: ClassifierConfig = serde_json::from_str(r#"{"criterion": "MSE"}"#).unwrap();
        assert_eq!(cfg.criterion, "MSE");
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        let cfg = ClassifierConfig {
            num_classes: vec![],
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ClassifierConfig {
            num_classes: vec![1, 0],
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ClassifierConfig {
            attention_map: "FPA".to_string(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ClassifierConfig {
            global_pool: GlobalPoolType::Pcam,
            num_classes: vec![2, 2],
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ClassifierConfig {
            criterion: "CE".to_string(),
            num_classes: vec![2, 1],
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_lse_gamma_must_be_positive_for_lse_pooling() {
        for pool in [GlobalPoolType::Lse, GlobalPoolType::AvgMaxLse] {
            for gamma in [0.0, -1.0, f32::NAN] {
                let cfg = ClassifierConfig {
                    global_pool: pool,
                    lse_gamma: gamma,
                    ..Default::default()
                };
                let err = cfg.validate().unwrap_err();
                assert!(matches!(err, MrgError::ConfigError { .. }));
            }
        }

        // Other poolings never read the gamma.
        let cfg = ClassifierConfig {
            global_pool: GlobalPoolType::Avg,
            lse_gamma: 0.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = ClassifierConfig::from_path("/nonexistent/JF.json").unwrap_err();
        assert!(matches!(err, MrgError::ConfigError { .. }));
    }

    #[test]
    fn test_backbone_features() {
        assert_eq!(Backbone::InceptionV3.num_features(), 2048);
        assert_eq!(Backbone::Vgg19.num_features(), 512);
        assert_eq!(Backbone::Vgg13Bn.name(), "vgg13_bn");
    }
}
