//! Normalization layers following the backbone convolutions.
//!
//! Batch norm and instance norm (which tracks running statistics) are both
//! evaluated with their stored statistics, so they share one frozen layer.
//! Group norm always uses [`GROUP_NORM_GROUPS`] groups.

use candle_core::{Module, Result, Tensor};
use candle_nn::{GroupNorm, VarBuilder};

use crate::core::GROUP_NORM_GROUPS;
use crate::core::config::NormType;

/// Batch norm folded into a per-channel scale and shift.
#[derive(Debug, Clone)]
pub struct FrozenBatchNorm {
    scale: Tensor,
    shift: Tensor,
}

impl FrozenBatchNorm {
    /// Loads `weight`, `bias`, `running_mean` and `running_var` of length `channels`.
    pub fn load(channels: usize, eps: f64, vb: VarBuilder) -> Result<Self> {
        let weight = vb.get(channels, "weight")?;
        let bias = vb.get(channels, "bias")?;
        let mean = vb.get(channels, "running_mean")?;
        let var = vb.get(channels, "running_var")?;

        let scale = weight.div(&var.affine(1.0, eps)?.sqrt()?)?;
        let shift = bias.sub(&mean.mul(&scale)?)?;
        Ok(Self {
            scale: scale.reshape((1, channels, 1, 1))?,
            shift: shift.reshape((1, channels, 1, 1))?,
        })
    }
}

impl Module for FrozenBatchNorm {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        xs.broadcast_mul(&self.scale)?.broadcast_add(&self.shift)
    }
}

#[derive(Debug, Clone)]
pub enum Norm {
    Frozen(FrozenBatchNorm),
    Group(GroupNorm),
}

impl Norm {
    pub fn load(norm_type: NormType, channels: usize, eps: f64, vb: VarBuilder) -> Result<Self> {
        match norm_type {
            NormType::BatchNorm | NormType::InstanceNorm => {
                Ok(Self::Frozen(FrozenBatchNorm::load(channels, eps, vb)?))
            }
            NormType::GroupNorm => Ok(Self::Group(candle_nn::group_norm(
                GROUP_NORM_GROUPS,
                channels,
                eps,
                vb,
            )?)),
        }
    }
}

impl Module for Norm {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            Self::Frozen(bn) => bn.forward(xs),
            Self::Group(gn) => gn.forward(xs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use std::collections::HashMap;

    fn bn_vars() -> HashMap<String, Tensor> {
        let dev = Device::Cpu;
        let mut vars = HashMap::new();
        vars.insert("weight".to_string(), Tensor::new(&[2.0f32, 1.0], &dev).unwrap());
        vars.insert("bias".to_string(), Tensor::new(&[0.5f32, -1.0], &dev).unwrap());
        vars.insert(
            "running_mean".to_string(),
            Tensor::new(&[1.0f32, 0.0], &dev).unwrap(),
        );
        vars.insert(
            "running_var".to_string(),
            Tensor::new(&[4.0f32, 1.0], &dev).unwrap(),
        );
        vars
    }

    #[test]
    fn test_frozen_batch_norm_uses_running_stats() {
        let vb = VarBuilder::from_tensors(bn_vars(), DType::F32, &Device::Cpu);
        let bn = FrozenBatchNorm::load(2, 0.0, vb).unwrap();
        let x = Tensor::new(&[5.0f32, 3.0], &Device::Cpu)
            .unwrap()
            .reshape((1, 2, 1, 1))
            .unwrap();
        let y = bn.forward(&x).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
        // (5 - 1) / 2 * 2 + 0.5 and (3 - 0) / 1 * 1 - 1
        assert!((y[0] - 4.5).abs() < 1e-6);
        assert!((y[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_instance_norm_matches_batch_norm() {
        let x = Tensor::new(&[5.0f32, 3.0], &Device::Cpu)
            .unwrap()
            .reshape((1, 2, 1, 1))
            .unwrap();
        let bn = Norm::load(
            NormType::BatchNorm,
            2,
            1e-5,
            VarBuilder::from_tensors(bn_vars(), DType::F32, &Device::Cpu),
        )
        .unwrap();
        let inorm = Norm::load(
            NormType::InstanceNorm,
            2,
            1e-5,
            VarBuilder::from_tensors(bn_vars(), DType::F32, &Device::Cpu),
        )
        .unwrap();
        let a = bn.forward(&x).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
        let b = inorm.forward(&x).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_group_norm_requires_divisible_channels() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        assert!(Norm::load(NormType::GroupNorm, 64, 1e-5, vb.clone()).is_ok());
        assert!(Norm::load(NormType::GroupNorm, 80, 1e-5, vb).is_err());
    }

    #[test]
    fn test_missing_statistics_fail() {
        let mut vars = bn_vars();
        vars.remove("running_var");
        let vb = VarBuilder::from_tensors(vars, DType::F32, &Device::Cpu);
        assert!(FrozenBatchNorm::load(2, 1e-5, vb).is_err());
    }
}
