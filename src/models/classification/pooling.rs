//! Global pooling of the backbone feature map.

use candle_core::{Result, Tensor};

use crate::core::config::GlobalPoolType;

/// Reduces an `(N, C, H, W)` feature map to `(N, C * expand, 1, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GlobalPool {
    Avg,
    Max,
    /// Probabilistic class activation map pooling; weights the feature map
    /// by the normalized sigmoid of the head's logit map.
    Pcam,
    AvgMax,
    Lse { gamma: f32 },
    AvgMaxLse { gamma: f32 },
}

impl GlobalPool {
    pub fn new(kind: GlobalPoolType, lse_gamma: f32) -> Self {
        match kind {
            GlobalPoolType::Avg => Self::Avg,
            GlobalPoolType::Max => Self::Max,
            GlobalPoolType::Pcam => Self::Pcam,
            GlobalPoolType::AvgMax => Self::AvgMax,
            GlobalPoolType::Lse => Self::Lse { gamma: lse_gamma },
            GlobalPoolType::AvgMaxLse => Self::AvgMaxLse { gamma: lse_gamma },
        }
    }

    /// Channel multiplier of the pooled feature.
    pub fn expand(&self) -> usize {
        match self {
            Self::AvgMax => 2,
            Self::AvgMaxLse { .. } => 3,
            _ => 1,
        }
    }

    pub fn needs_logit_map(&self) -> bool {
        matches!(self, Self::Pcam)
    }

    /// Pools `feat`. `logit_map` is the `(N, 1, H, W)` head output over the
    /// unpooled feature map and is required by [`GlobalPool::Pcam`] only.
    pub fn forward(&self, feat: &Tensor, logit_map: Option<&Tensor>) -> Result<Tensor> {
        match self {
            Self::Avg => avg_pool(feat),
            Self::Max => max_pool(feat),
            Self::Pcam => {
                let Some(logit_map) = logit_map else {
                    candle_core::bail!("PCAM pooling needs the head logit map");
                };
                pcam_pool(feat, logit_map)
            }
            Self::AvgMax => Tensor::cat(&[&avg_pool(feat)?, &max_pool(feat)?], 1),
            Self::Lse { gamma } => lse_pool(feat, *gamma),
            Self::AvgMaxLse { gamma } => Tensor::cat(
                &[&avg_pool(feat)?, &max_pool(feat)?, &lse_pool(feat, *gamma)?],
                1,
            ),
        }
    }
}

fn avg_pool(feat: &Tensor) -> Result<Tensor> {
    feat.mean_keepdim(3)?.mean_keepdim(2)
}

fn max_pool(feat: &Tensor) -> Result<Tensor> {
    feat.max_keepdim(3)?.max_keepdim(2)
}

fn pcam_pool(feat: &Tensor, logit_map: &Tensor) -> Result<Tensor> {
    let prob_map = candle_nn::ops::sigmoid(logit_map)?;
    let weight_map = prob_map.broadcast_div(&prob_map.sum_keepdim(3)?.sum_keepdim(2)?)?;
    feat.broadcast_mul(&weight_map)?
        .sum_keepdim(3)?
        .sum_keepdim(2)
}

/// Log-sum-exp pooling, `m + log(mean(exp(gamma * (x - m)))) / gamma` with `m`
/// the spatial maximum.
fn lse_pool(feat: &Tensor, gamma: f32) -> Result<Tensor> {
    let gamma = gamma as f64;
    let m = max_pool(feat)?;
    let shifted = feat.broadcast_sub(&m)?;
    let lse = shifted
        .affine(gamma, 0.0)?
        .exp()?
        .mean_keepdim(3)?
        .mean_keepdim(2)?
        .log()?
        .affine(1.0 / gamma, 0.0)?;
    m + lse
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn feat() -> Tensor {
        // One channel, 2x2 map: [[1, 2], [3, 6]]
        Tensor::new(&[1.0f32, 2.0, 3.0, 6.0], &Device::Cpu)
            .unwrap()
            .reshape((1, 1, 2, 2))
            .unwrap()
    }

    fn values(t: &Tensor) -> Vec<f32> {
        t.flatten_all().unwrap().to_vec1::<f32>().unwrap()
    }

    #[test]
    fn test_avg_and_max() {
        assert_eq!(values(&GlobalPool::Avg.forward(&feat(), None).unwrap()), vec![3.0]);
        assert_eq!(values(&GlobalPool::Max.forward(&feat(), None).unwrap()), vec![6.0]);

        let pooled = GlobalPool::AvgMax.forward(&feat(), None).unwrap();
        assert_eq!(pooled.dims(), &[1, 2, 1, 1]);
        assert_eq!(values(&pooled), vec![3.0, 6.0]);
    }

    #[test]
    fn test_lse_limits() {
        // Large gamma approaches max, small gamma approaches the mean.
        let sharp = values(&GlobalPool::Lse { gamma: 50.0 }.forward(&feat(), None).unwrap());
        assert!((sharp[0] - 6.0).abs() < 0.05);
        let smooth = values(&GlobalPool::Lse { gamma: 1e-3 }.forward(&feat(), None).unwrap());
        assert!((smooth[0] - 3.0).abs() < 0.05);
    }

    #[test]
    fn test_avg_max_lse_order() {
        let pool = GlobalPool::new(GlobalPoolType::AvgMaxLse, 0.5);
        assert_eq!(pool.expand(), 3);
        let v = values(&pool.forward(&feat(), None).unwrap());
        assert_eq!(v.len(), 3);
        assert_eq!(v[0], 3.0);
        assert_eq!(v[1], 6.0);
        assert!(v[2] > 3.0 && v[2] < 6.0);
    }

    #[test]
    fn test_pcam_uniform_logits_is_mean() {
        let logit_map = Tensor::zeros((1, 1, 2, 2), candle_core::DType::F32, &Device::Cpu).unwrap();
        let v = values(&GlobalPool::Pcam.forward(&feat(), Some(&logit_map)).unwrap());
        assert!((v[0] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_pcam_requires_logit_map() {
        assert!(GlobalPool::Pcam.needs_logit_map());
        assert!(GlobalPool::Pcam.forward(&feat(), None).is_err());
    }
}
