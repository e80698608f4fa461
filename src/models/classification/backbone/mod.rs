//! Convolutional backbones producing the classifier feature map.

pub mod inception;
pub mod vgg;

use candle_core::{Module, Result, Tensor};
use candle_nn::VarBuilder;

use crate::core::config::{Backbone, ClassifierConfig};
pub use inception::Inception3;
pub use vgg::{Vgg, VggDepth};

/// The configured backbone network.
#[derive(Debug, Clone)]
pub enum BackboneNet {
    Inception(Inception3),
    Vgg(Vgg),
}

impl BackboneNet {
    /// Builds the backbone named by `cfg.backbone` from tensors under `vb`.
    pub fn load(cfg: &ClassifierConfig, vb: VarBuilder) -> Result<Self> {
        let vgg = |depth, with_norm: bool| {
            let norm = with_norm.then_some(cfg.norm_type);
            Vgg::load(depth, norm, vb.clone()).map(Self::Vgg)
        };
        match cfg.backbone {
            Backbone::InceptionV3 => {
                Inception3::load(cfg.norm_type, cfg.pretrained, vb.clone()).map(Self::Inception)
            }
            Backbone::Vgg11 => vgg(VggDepth::D11, false),
            Backbone::Vgg11Bn => vgg(VggDepth::D11, true),
            Backbone::Vgg13 => vgg(VggDepth::D13, false),
            Backbone::Vgg13Bn => vgg(VggDepth::D13, true),
            Backbone::Vgg16 => vgg(VggDepth::D16, false),
            Backbone::Vgg16Bn => vgg(VggDepth::D16, true),
            Backbone::Vgg19 => vgg(VggDepth::D19, false),
            Backbone::Vgg19Bn => vgg(VggDepth::D19, true),
        }
    }

    pub fn num_features(&self) -> usize {
        match self {
            Self::Inception(_) => Inception3::NUM_FEATURES,
            Self::Vgg(_) => Vgg::NUM_FEATURES,
        }
    }
}

impl Module for BackboneNet {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            Self::Inception(net) => net.forward(xs),
            Self::Vgg(net) => net.forward(xs),
        }
    }
}
