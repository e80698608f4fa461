//! VGG feature extractor.
//!
//! Only the `features` stack is built. Tensor names index the sequential layout
//! of convolution, optional normalization, ReLU and max pool, so `features.0` is
//! the first convolution and, with normalization, `features.1` its norm layer.

use candle_core::{Module, Result, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, VarBuilder};

use crate::core::config::NormType;
use crate::models::classification::norm::Norm;

const NORM_EPS: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Conv(usize),
    Pool,
}

use Stage::{Conv as C, Pool as M};

const CFG_A: &[Stage] = &[
    C(64), M, C(128), M, C(256), C(256), M, C(512), C(512), M, C(512), C(512), M,
];
const CFG_B: &[Stage] = &[
    C(64), C(64), M, C(128), C(128), M, C(256), C(256), M, C(512), C(512), M, C(512), C(512), M,
];
const CFG_D: &[Stage] = &[
    C(64), C(64), M, C(128), C(128), M, C(256), C(256), C(256), M, C(512), C(512), C(512), M,
    C(512), C(512), C(512), M,
];
const CFG_E: &[Stage] = &[
    C(64), C(64), M, C(128), C(128), M, C(256), C(256), C(256), C(256), M, C(512), C(512),
    C(512), C(512), M, C(512), C(512), C(512), C(512), M,
];

/// Network depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VggDepth {
    D11,
    D13,
    D16,
    D19,
}

impl VggDepth {
    fn stages(self) -> &'static [Stage] {
        match self {
            VggDepth::D11 => CFG_A,
            VggDepth::D13 => CFG_B,
            VggDepth::D16 => CFG_D,
            VggDepth::D19 => CFG_E,
        }
    }
}

#[derive(Debug, Clone)]
enum Layer {
    Conv { conv: Conv2d, norm: Option<Norm> },
    Pool,
}

#[derive(Debug, Clone)]
pub struct Vgg {
    layers: Vec<Layer>,
}

impl Vgg {
    /// Channels of the returned feature map.
    pub const NUM_FEATURES: usize = 512;

    /// Builds the feature stack. `norm` adds a normalization layer after each
    /// convolution (the `_bn` variants).
    pub fn load(depth: VggDepth, norm: Option<NormType>, vb: VarBuilder) -> Result<Self> {
        let vb = vb.pp("features");
        let conv_cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };

        let mut layers = Vec::new();
        let mut idx = 0usize;
        let mut in_channels = 3usize;
        for stage in depth.stages() {
            match *stage {
                Stage::Pool => {
                    layers.push(Layer::Pool);
                    idx += 1;
                }
                Stage::Conv(out_channels) => {
                    let conv =
                        candle_nn::conv2d(in_channels, out_channels, 3, conv_cfg, vb.pp(idx))?;
                    let norm = match norm {
                        Some(nt) => Some(Norm::load(nt, out_channels, NORM_EPS, vb.pp(idx + 1))?),
                        None => None,
                    };
                    // conv, [norm], relu
                    idx += if norm.is_some() { 3 } else { 2 };
                    layers.push(Layer::Conv { conv, norm });
                    in_channels = out_channels;
                }
            }
        }
        Ok(Self { layers })
    }
}

impl Module for Vgg {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = xs.clone();
        for layer in &self.layers {
            xs = match layer {
                Layer::Conv { conv, norm } => {
                    let ys = conv.forward(&xs)?;
                    let ys = match norm {
                        Some(norm) => norm.forward(&ys)?,
                        None => ys,
                    };
                    ys.relu()?
                }
                Layer::Pool => xs.max_pool2d(2)?,
            };
        }
        Ok(xs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use std::collections::HashMap;

    #[test]
    fn test_vgg11_output_shape() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let net = Vgg::load(VggDepth::D11, None, vb).unwrap();
        let x = Tensor::zeros((1, 3, 32, 32), DType::F32, &Device::Cpu).unwrap();
        let y = net.forward(&x).unwrap();
        assert_eq!(y.dims(), &[1, Vgg::NUM_FEATURES, 1, 1]);
    }

    #[test]
    fn test_vgg19_bn_output_shape() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let net = Vgg::load(VggDepth::D19, Some(NormType::BatchNorm), vb).unwrap();
        let x = Tensor::zeros((1, 3, 64, 32), DType::F32, &Device::Cpu).unwrap();
        let y = net.forward(&x).unwrap();
        assert_eq!(y.dims(), &[1, 512, 2, 1]);
    }

    #[test]
    fn test_layer_counts() {
        let convs = |s: &[Stage]| s.iter().filter(|s| matches!(s, Stage::Conv(_))).count();
        assert_eq!(convs(CFG_A), 8);
        assert_eq!(convs(CFG_B), 10);
        assert_eq!(convs(CFG_D), 13);
        assert_eq!(convs(CFG_E), 16);
    }

    #[test]
    fn test_tensor_names_follow_sequential_index() {
        // The first two convolutions of vgg11_bn live at features.0 and features.4.
        let dev = Device::Cpu;
        let mut vars: HashMap<String, Tensor> = HashMap::new();
        let mut put = |name: &str, shape: &[usize]| {
            vars.insert(
                name.to_string(),
                Tensor::zeros(shape, DType::F32, &dev).unwrap(),
            );
        };
        put("features.0.weight", &[64, 3, 3, 3]);
        put("features.0.bias", &[64]);
        for stat in ["weight", "bias", "running_mean", "running_var"] {
            put(&format!("features.1.{stat}"), &[64]);
        }
        put("features.4.weight", &[128, 64, 3, 3]);
        let vb = VarBuilder::from_tensors(vars, DType::F32, &dev);
        let err = Vgg::load(VggDepth::D11, Some(NormType::BatchNorm), vb).unwrap_err();
        // Loading progresses past features.4.weight and stops at its missing bias.
        assert!(err.to_string().contains("features.4.bias"));
    }
}
