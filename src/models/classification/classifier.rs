//! The chest X-ray disease classifier.
//!
//! A backbone produces a feature map, a global pool reduces it, and one 1x1
//! convolution head per disease produces logits, which are decoded into
//! probabilities according to the training criterion. Weights come from a
//! single safetensors file laid out as `backbone.*`, `fc_<i>.*` and, with
//! `fc_bn`, `bn_<i>.*`.

use candle_core::{DType, Device, IndexOp, Module, Tensor};
use candle_nn::{Conv2d, VarBuilder};
use std::path::Path;
use tracing::{debug, info};

use super::backbone::BackboneNet;
use super::decode::{Criterion, ProbabilityDecoder};
use super::norm::FrozenBatchNorm;
use super::pooling::GlobalPool;
use crate::core::config::ClassifierConfig;
use crate::core::{MrgError, MrgResult, SimpleError, Tensor4D};
use crate::domain::ProbabilityVector;
use crate::utils::{candle_to_mrg_inference, candle_to_mrg_processing};

const MODEL_NAME: &str = "cxr-classifier";
const HEAD_BN_EPS: f64 = 1e-5;

/// Anything that maps a preprocessed classifier input to disease probabilities.
pub trait DiseaseClassifier: Send + Sync + std::fmt::Debug {
    /// Runs the classifier on a `(1, 3, H, W)` tensor.
    fn infer(&self, input: &Tensor4D) -> MrgResult<ProbabilityVector>;

    /// Number of probabilities produced per image.
    fn num_outputs(&self) -> usize;
}

#[derive(Debug, Clone)]
struct Head {
    fc: Conv2d,
    bn: Option<FrozenBatchNorm>,
}

/// Candle implementation of [`DiseaseClassifier`].
#[derive(Debug)]
pub struct CxrClassifier {
    backbone: BackboneNet,
    pool: GlobalPool,
    heads: Vec<Head>,
    decoder: ProbabilityDecoder,
    num_outputs: usize,
    device: Device,
}

impl CxrClassifier {
    /// Loads the classifier described by `cfg` from a safetensors file.
    ///
    /// # Errors
    ///
    /// `UnsupportedCriterion` before any weights are read when the criterion is
    /// unknown; `WeightLoad` when the file is missing, unreadable, or its
    /// tensors do not match the configured architecture.
    pub fn load(cfg: &ClassifierConfig, weights: &Path, device: &Device) -> MrgResult<Self> {
        cfg.validate()?;
        let criterion = Criterion::parse(&cfg.criterion)?;
        if !weights.is_file() {
            return Err(MrgError::weight_load(
                weights,
                "open classifier weights",
                SimpleError::new("file not found"),
            ));
        }

        info!(
            "loading {} classifier ({} heads) from {}",
            cfg.backbone.name(),
            cfg.num_heads(),
            weights.display()
        );
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, device)
                .map_err(|e| MrgError::weight_load(weights, "open classifier weights", e))?
        };
        Self::build(cfg, criterion, vb, device)
            .map_err(|e| MrgError::weight_load(weights, format!("build {}", cfg.backbone.name()), e))
    }

    /// Builds the classifier from an existing variable store.
    pub fn from_var_builder(
        cfg: &ClassifierConfig,
        vb: VarBuilder,
        device: &Device,
    ) -> MrgResult<Self> {
        cfg.validate()?;
        let criterion = Criterion::parse(&cfg.criterion)?;
        Self::build(cfg, criterion, vb, device).map_err(|e| {
            MrgError::weight_load(
                Path::new("<var-builder>"),
                format!("build {}", cfg.backbone.name()),
                e,
            )
        })
    }

    fn build(
        cfg: &ClassifierConfig,
        criterion: Criterion,
        vb: VarBuilder,
        device: &Device,
    ) -> candle_core::Result<Self> {
        let backbone = BackboneNet::load(cfg, vb.pp("backbone"))?;
        let pool = GlobalPool::new(cfg.global_pool, cfg.lse_gamma);
        let in_channels = backbone.num_features() * pool.expand();

        let mut heads = Vec::with_capacity(cfg.num_heads());
        for (i, &num_class) in cfg.num_classes.iter().enumerate() {
            let fc = candle_nn::conv2d(
                in_channels,
                num_class,
                1,
                Default::default(),
                vb.pp(format!("fc_{i}")),
            )?;
            let bn = if cfg.fc_bn {
                Some(FrozenBatchNorm::load(
                    in_channels,
                    HEAD_BN_EPS,
                    vb.pp(format!("bn_{i}")),
                )?)
            } else {
                None
            };
            heads.push(Head { fc, bn });
        }

        let num_outputs = match criterion {
            Criterion::Independent => cfg.num_classes.iter().sum(),
            Criterion::TwoClass => cfg.num_heads(),
        };
        Ok(Self {
            backbone,
            pool,
            heads,
            decoder: ProbabilityDecoder::new(criterion),
            num_outputs,
            device: device.clone(),
        })
    }

    fn to_candle(&self, input: &Tensor4D) -> MrgResult<Tensor> {
        let (n, c, h, w) = input.dim();
        let data: Vec<f32> = input.iter().copied().collect();
        Tensor::from_vec(data, (n, c, h, w), &self.device)
            .map_err(|e| candle_to_mrg_processing("copy classifier input to device", e))
    }

    /// Runs backbone, pooling and heads; returns the logits of the first
    /// image, one vector per head.
    fn logits(&self, x: &Tensor) -> candle_core::Result<Vec<Vec<f32>>> {
        let feat = self.backbone.forward(x)?;
        let mut logits = Vec::with_capacity(self.heads.len());
        for head in &self.heads {
            let logit_map = if self.pool.needs_logit_map() {
                Some(head.fc.forward(&feat)?)
            } else {
                None
            };
            let mut pooled = self.pool.forward(&feat, logit_map.as_ref())?;
            if let Some(bn) = &head.bn {
                pooled = bn.forward(&pooled)?;
            }
            let logit = head.fc.forward(&pooled)?.flatten_from(1)?;
            logits.push(logit.i(0)?.to_vec1::<f32>()?);
        }
        Ok(logits)
    }
}

impl DiseaseClassifier for CxrClassifier {
    fn infer(&self, input: &Tensor4D) -> MrgResult<ProbabilityVector> {
        if input.shape()[0] != 1 || input.shape()[1] != 3 {
            return Err(MrgError::invalid_input(format!(
                "classifier expects a (1, 3, H, W) tensor, got {:?}",
                input.shape()
            )));
        }
        let x = self.to_candle(input)?;
        let logits = self
            .logits(&x)
            .map_err(|e| candle_to_mrg_inference(MODEL_NAME, "forward pass", e))?;
        let probs = self.decoder.decode(&logits)?;
        debug!("classifier probabilities: {:?}", probs.as_slice());
        Ok(probs)
    }

    fn num_outputs(&self) -> usize {
        self.num_outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{Backbone, GlobalPoolType};
    use std::collections::HashMap;

    fn vgg_cfg() -> ClassifierConfig {
        ClassifierConfig {
            backbone: Backbone::Vgg11,
            num_classes: vec![1; 5],
            ..Default::default()
        }
    }

    fn input(size: usize) -> Tensor4D {
        Tensor4D::zeros((1, 3, size, size))
    }

    #[test]
    fn test_zero_weights_give_half_probabilities() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let clf = CxrClassifier::from_var_builder(&vgg_cfg(), vb, &Device::Cpu).unwrap();
        assert_eq!(clf.num_outputs(), 5);
        let probs = clf.infer(&input(32)).unwrap();
        assert_eq!(probs.len(), 5);
        assert!(probs.as_slice().iter().all(|p| (p - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_every_pool_and_head_bn() {
        for pool in [
            GlobalPoolType::Avg,
            GlobalPoolType::Max,
            GlobalPoolType::Pcam,
            GlobalPoolType::AvgMax,
            GlobalPoolType::Lse,
            GlobalPoolType::AvgMaxLse,
        ] {
            let cfg = ClassifierConfig {
                global_pool: pool,
                fc_bn: true,
                ..vgg_cfg()
            };
            let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
            let clf = CxrClassifier::from_var_builder(&cfg, vb, &Device::Cpu).unwrap();
            let probs = clf.infer(&input(32)).unwrap();
            assert_eq!(probs.len(), 5, "pool {pool:?}");
        }
    }

    #[test]
    fn test_two_class_heads() {
        let cfg = ClassifierConfig {
            criterion: "CE".to_string(),
            num_classes: vec![2, 2, 2],
            ..vgg_cfg()
        };
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let clf = CxrClassifier::from_var_builder(&cfg, vb, &Device::Cpu).unwrap();
        assert_eq!(clf.num_outputs(), 3);
        let probs = clf.infer(&input(32)).unwrap();
        assert!(probs.as_slice().iter().all(|p| (p - 0.5).abs() < 1e-6));
    }

    /// Zero tensors for every `vgg11` backbone convolution.
    fn vgg11_zero_backbone(dev: &Device) -> HashMap<String, Tensor> {
        let convs = [
            (0, 3, 64),
            (3, 64, 128),
            (6, 128, 256),
            (8, 256, 256),
            (11, 256, 512),
            (13, 512, 512),
            (16, 512, 512),
            (18, 512, 512),
        ];
        let mut vars = HashMap::new();
        for (idx, in_c, out_c) in convs {
            vars.insert(
                format!("backbone.features.{idx}.weight"),
                Tensor::zeros((out_c, in_c, 3, 3), DType::F32, dev).unwrap(),
            );
            vars.insert(
                format!("backbone.features.{idx}.bias"),
                Tensor::zeros(out_c, DType::F32, dev).unwrap(),
            );
        }
        vars
    }

    #[test]
    fn test_head_bias_drives_probability() {
        let dev = Device::Cpu;
        let cfg = ClassifierConfig {
            num_classes: vec![1, 1],
            global_pool: GlobalPoolType::Avg,
            ..vgg_cfg()
        };
        let mut vars = vgg11_zero_backbone(&dev);
        for i in 0..2 {
            vars.insert(
                format!("fc_{i}.weight"),
                Tensor::zeros((1, 512, 1, 1), DType::F32, &dev).unwrap(),
            );
        }
        vars.insert("fc_0.bias".to_string(), Tensor::new(&[3.0f32], &dev).unwrap());
        vars.insert("fc_1.bias".to_string(), Tensor::new(&[-3.0f32], &dev).unwrap());
        let vb = VarBuilder::from_tensors(vars, DType::F32, &dev);

        let clf = CxrClassifier::from_var_builder(&cfg, vb, &dev).unwrap();
        let probs = clf.infer(&input(32)).unwrap();
        let expected = 1.0 / (1.0 + (-3.0f32).exp());
        assert!((probs.as_slice()[0] - expected).abs() < 1e-5);
        assert!((probs.as_slice()[1] - (1.0 - expected)).abs() < 1e-5);
    }

    #[test]
    fn test_missing_head_tensor_is_weight_load() {
        let dev = Device::Cpu;
        let vb = VarBuilder::from_tensors(vgg11_zero_backbone(&dev), DType::F32, &dev);
        let err = CxrClassifier::from_var_builder(&vgg_cfg(), vb, &dev).unwrap_err();
        assert!(matches!(err, MrgError::WeightLoad { .. }));
    }

    #[test]
    fn test_unknown_criterion_is_rejected_before_weights() {
        let cfg = ClassifierConfig {
            criterion: "MSE".to_string(),
            ..vgg_cfg()
        };
        let err = CxrClassifier::load(&cfg, Path::new("/nonexistent.safetensors"), &Device::Cpu)
            .unwrap_err();
        assert!(matches!(err, MrgError::UnsupportedCriterion { .. }));
    }

    #[test]
    fn test_missing_weights_file() {
        let err = CxrClassifier::load(&vgg_cfg(), Path::new("/nonexistent.safetensors"), &Device::Cpu)
            .unwrap_err();
        assert!(matches!(err, MrgError::WeightLoad { .. }));
    }

    #[test]
    fn test_mismatched_weights_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        let mut tensors = HashMap::new();
        // Wrong shape for the first VGG convolution.
        tensors.insert(
            "backbone.features.0.weight".to_string(),
            Tensor::zeros((8, 3, 3, 3), DType::F32, &Device::Cpu).unwrap(),
        );
        candle_core::safetensors::save(&tensors, &path).unwrap();

        let err = CxrClassifier::load(&vgg_cfg(), &path, &Device::Cpu).unwrap_err();
        assert!(matches!(err, MrgError::WeightLoad { .. }));
    }

    #[test]
    fn test_rejects_wrong_channel_count() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let clf = CxrClassifier::from_var_builder(&vgg_cfg(), vb, &Device::Cpu).unwrap();
        let err = clf.infer(&Tensor4D::zeros((1, 1, 32, 32))).unwrap_err();
        assert!(matches!(err, MrgError::InvalidInput { .. }));
    }
}
