//! Inception-v3 feature extractor.
//!
//! The network stops after `Mixed_7c` and returns the `(N, 2048, h, w)` feature
//! map; the auxiliary head and the ImageNet classifier are not built. Tensor
//! names follow the torchvision layout with `bn` renamed to `norm`, e.g.
//! `Mixed_6b.branch7x7_2.conv.weight` and `Mixed_6b.branch7x7_2.norm.running_var`.

use candle_core::{Module, Result, Tensor};
use candle_nn::VarBuilder;

use crate::core::config::NormType;
use crate::core::{IMAGENET_MEAN, IMAGENET_STD};
use crate::models::classification::norm::Norm;

const NORM_EPS: f64 = 0.001;

/// Bias-free convolution, normalization and ReLU.
#[derive(Debug, Clone)]
struct BasicConv2d {
    weight: Tensor,
    stride: usize,
    padding: (usize, usize),
    norm: Norm,
}

impl BasicConv2d {
    fn load(
        in_channels: usize,
        out_channels: usize,
        kernel: (usize, usize),
        stride: usize,
        padding: (usize, usize),
        norm_type: NormType,
        vb: VarBuilder,
    ) -> Result<Self> {
        let weight = vb
            .pp("conv")
            .get((out_channels, in_channels, kernel.0, kernel.1), "weight")?;
        let norm = Norm::load(norm_type, out_channels, NORM_EPS, vb.pp("norm"))?;
        Ok(Self {
            weight,
            stride,
            padding,
            norm,
        })
    }

    fn square(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
        norm_type: NormType,
        vb: VarBuilder,
    ) -> Result<Self> {
        Self::load(
            in_channels,
            out_channels,
            (kernel, kernel),
            stride,
            (padding, padding),
            norm_type,
            vb,
        )
    }

    fn pointwise(
        in_channels: usize,
        out_channels: usize,
        norm_type: NormType,
        vb: VarBuilder,
    ) -> Result<Self> {
        Self::square(in_channels, out_channels, 1, 1, 0, norm_type, vb)
    }
}

impl Module for BasicConv2d {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let (ph, pw) = self.padding;
        let ys = if ph == pw {
            xs.conv2d(&self.weight, ph, self.stride, 1, 1)?
        } else {
            // candle only pads symmetrically in both dimensions.
            xs.pad_with_zeros(2, ph, ph)?
                .pad_with_zeros(3, pw, pw)?
                .conv2d(&self.weight, 0, self.stride, 1, 1)?
        };
        self.norm.forward(&ys)?.relu()
    }
}

/// 3x3 average pool, stride 1, zero padding counted in the mean.
fn avg_pool_same(xs: &Tensor) -> Result<Tensor> {
    xs.pad_with_zeros(2, 1, 1)?
        .pad_with_zeros(3, 1, 1)?
        .avg_pool2d_with_stride((3, 3), (1, 1))
}

fn max_pool_reduce(xs: &Tensor) -> Result<Tensor> {
    xs.max_pool2d_with_stride((3, 3), (2, 2))
}

#[derive(Debug, Clone)]
struct InceptionA {
    branch1x1: BasicConv2d,
    branch5x5_1: BasicConv2d,
    branch5x5_2: BasicConv2d,
    branch3x3dbl_1: BasicConv2d,
    branch3x3dbl_2: BasicConv2d,
    branch3x3dbl_3: BasicConv2d,
    branch_pool: BasicConv2d,
}

impl InceptionA {
    fn load(in_c: usize, pool_features: usize, nt: NormType, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            branch1x1: BasicConv2d::pointwise(in_c, 64, nt, vb.pp("branch1x1"))?,
            branch5x5_1: BasicConv2d::pointwise(in_c, 48, nt, vb.pp("branch5x5_1"))?,
            branch5x5_2: BasicConv2d::square(48, 64, 5, 1, 2, nt, vb.pp("branch5x5_2"))?,
            branch3x3dbl_1: BasicConv2d::pointwise(in_c, 64, nt, vb.pp("branch3x3dbl_1"))?,
            branch3x3dbl_2: BasicConv2d::square(64, 96, 3, 1, 1, nt, vb.pp("branch3x3dbl_2"))?,
            branch3x3dbl_3: BasicConv2d::square(96, 96, 3, 1, 1, nt, vb.pp("branch3x3dbl_3"))?,
            branch_pool: BasicConv2d::pointwise(in_c, pool_features, nt, vb.pp("branch_pool"))?,
        })
    }
}

impl Module for InceptionA {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let b1 = self.branch1x1.forward(xs)?;
        let b5 = self.branch5x5_2.forward(&self.branch5x5_1.forward(xs)?)?;
        let b3 = self.branch3x3dbl_3.forward(
            &self
                .branch3x3dbl_2
                .forward(&self.branch3x3dbl_1.forward(xs)?)?,
        )?;
        let bp = self.branch_pool.forward(&avg_pool_same(xs)?)?;
        Tensor::cat(&[&b1, &b5, &b3, &bp], 1)
    }
}

#[derive(Debug, Clone)]
struct InceptionB {
    branch3x3: BasicConv2d,
    branch3x3dbl_1: BasicConv2d,
    branch3x3dbl_2: BasicConv2d,
    branch3x3dbl_3: BasicConv2d,
}

impl InceptionB {
    fn load(in_c: usize, nt: NormType, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            branch3x3: BasicConv2d::square(in_c, 384, 3, 2, 0, nt, vb.pp("branch3x3"))?,
            branch3x3dbl_1: BasicConv2d::pointwise(in_c, 64, nt, vb.pp("branch3x3dbl_1"))?,
            branch3x3dbl_2: BasicConv2d::square(64, 96, 3, 1, 1, nt, vb.pp("branch3x3dbl_2"))?,
            branch3x3dbl_3: BasicConv2d::square(96, 96, 3, 2, 0, nt, vb.pp("branch3x3dbl_3"))?,
        })
    }
}

impl Module for InceptionB {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let b3 = self.branch3x3.forward(xs)?;
        let bd = self.branch3x3dbl_3.forward(
            &self
                .branch3x3dbl_2
                .forward(&self.branch3x3dbl_1.forward(xs)?)?,
        )?;
        let bp = max_pool_reduce(xs)?;
        Tensor::cat(&[&b3, &bd, &bp], 1)
    }
}

#[derive(Debug, Clone)]
struct InceptionC {
    branch1x1: BasicConv2d,
    branch7x7: [BasicConv2d; 3],
    branch7x7dbl: [BasicConv2d; 5],
    branch_pool: BasicConv2d,
}

impl InceptionC {
    fn load(in_c: usize, c7: usize, nt: NormType, vb: VarBuilder) -> Result<Self> {
        let row = |i: usize, o: usize, name: &str| {
            BasicConv2d::load(i, o, (1, 7), 1, (0, 3), nt, vb.pp(name))
        };
        let col = |i: usize, o: usize, name: &str| {
            BasicConv2d::load(i, o, (7, 1), 1, (3, 0), nt, vb.pp(name))
        };
        Ok(Self {
            branch1x1: BasicConv2d::pointwise(in_c, 192, nt, vb.pp("branch1x1"))?,
            branch7x7: [
                BasicConv2d::pointwise(in_c, c7, nt, vb.pp("branch7x7_1"))?,
                row(c7, c7, "branch7x7_2")?,
                col(c7, 192, "branch7x7_3")?,
            ],
            branch7x7dbl: [
                BasicConv2d::pointwise(in_c, c7, nt, vb.pp("branch7x7dbl_1"))?,
                col(c7, c7, "branch7x7dbl_2")?,
                row(c7, c7, "branch7x7dbl_3")?,
                col(c7, c7, "branch7x7dbl_4")?,
                row(c7, 192, "branch7x7dbl_5")?,
            ],
            branch_pool: BasicConv2d::pointwise(in_c, 192, nt, vb.pp("branch_pool"))?,
        })
    }
}

fn chain(layers: &[BasicConv2d], xs: &Tensor) -> Result<Tensor> {
    let mut ys = xs.clone();
    for layer in layers {
        ys = layer.forward(&ys)?;
    }
    Ok(ys)
}

impl Module for InceptionC {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let b1 = self.branch1x1.forward(xs)?;
        let b7 = chain(&self.branch7x7, xs)?;
        let bd = chain(&self.branch7x7dbl, xs)?;
        let bp = self.branch_pool.forward(&avg_pool_same(xs)?)?;
        Tensor::cat(&[&b1, &b7, &bd, &bp], 1)
    }
}

#[derive(Debug, Clone)]
struct InceptionD {
    branch3x3: [BasicConv2d; 2],
    branch7x7x3: [BasicConv2d; 4],
}

impl InceptionD {
    fn load(in_c: usize, nt: NormType, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            branch3x3: [
                BasicConv2d::pointwise(in_c, 192, nt, vb.pp("branch3x3_1"))?,
                BasicConv2d::square(192, 320, 3, 2, 0, nt, vb.pp("branch3x3_2"))?,
            ],
            branch7x7x3: [
                BasicConv2d::pointwise(in_c, 192, nt, vb.pp("branch7x7x3_1"))?,
                BasicConv2d::load(192, 192, (1, 7), 1, (0, 3), nt, vb.pp("branch7x7x3_2"))?,
                BasicConv2d::load(192, 192, (7, 1), 1, (3, 0), nt, vb.pp("branch7x7x3_3"))?,
                BasicConv2d::square(192, 192, 3, 2, 0, nt, vb.pp("branch7x7x3_4"))?,
            ],
        })
    }
}

impl Module for InceptionD {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let b3 = chain(&self.branch3x3, xs)?;
        let b7 = chain(&self.branch7x7x3, xs)?;
        let bp = max_pool_reduce(xs)?;
        Tensor::cat(&[&b3, &b7, &bp], 1)
    }
}

#[derive(Debug, Clone)]
struct InceptionE {
    branch1x1: BasicConv2d,
    branch3x3_1: BasicConv2d,
    branch3x3_2a: BasicConv2d,
    branch3x3_2b: BasicConv2d,
    branch3x3dbl_1: BasicConv2d,
    branch3x3dbl_2: BasicConv2d,
    branch3x3dbl_3a: BasicConv2d,
    branch3x3dbl_3b: BasicConv2d,
    branch_pool: BasicConv2d,
}

impl InceptionE {
    fn load(in_c: usize, nt: NormType, vb: VarBuilder) -> Result<Self> {
        let row = |name: &str| BasicConv2d::load(384, 384, (1, 3), 1, (0, 1), nt, vb.pp(name));
        let col = |name: &str| BasicConv2d::load(384, 384, (3, 1), 1, (1, 0), nt, vb.pp(name));
        Ok(Self {
            branch1x1: BasicConv2d::pointwise(in_c, 320, nt, vb.pp("branch1x1"))?,
            branch3x3_1: BasicConv2d::pointwise(in_c, 384, nt, vb.pp("branch3x3_1"))?,
            branch3x3_2a: row("branch3x3_2a")?,
            branch3x3_2b: col("branch3x3_2b")?,
            branch3x3dbl_1: BasicConv2d::pointwise(in_c, 448, nt, vb.pp("branch3x3dbl_1"))?,
            branch3x3dbl_2: BasicConv2d::square(448, 384, 3, 1, 1, nt, vb.pp("branch3x3dbl_2"))?,
            branch3x3dbl_3a: row("branch3x3dbl_3a")?,
            branch3x3dbl_3b: col("branch3x3dbl_3b")?,
            branch_pool: BasicConv2d::pointwise(in_c, 192, nt, vb.pp("branch_pool"))?,
        })
    }
}

impl Module for InceptionE {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let b1 = self.branch1x1.forward(xs)?;

        let b3 = self.branch3x3_1.forward(xs)?;
        let b3 = Tensor::cat(
            &[&self.branch3x3_2a.forward(&b3)?, &self.branch3x3_2b.forward(&b3)?],
            1,
        )?;

        let bd = self
            .branch3x3dbl_2
            .forward(&self.branch3x3dbl_1.forward(xs)?)?;
        let bd = Tensor::cat(
            &[
                &self.branch3x3dbl_3a.forward(&bd)?,
                &self.branch3x3dbl_3b.forward(&bd)?,
            ],
            1,
        )?;

        let bp = self.branch_pool.forward(&avg_pool_same(xs)?)?;
        Tensor::cat(&[&b1, &b3, &bd, &bp], 1)
    }
}

/// Per-channel affine re-mapping from ImageNet statistics to `[-1, 1]` scaling.
#[derive(Debug, Clone)]
struct InputTransform {
    scale: Tensor,
    shift: Tensor,
}

impl InputTransform {
    fn new(device: &candle_core::Device) -> Result<Self> {
        let scale: Vec<f32> = IMAGENET_STD.iter().map(|s| s / 0.5).collect();
        let shift: Vec<f32> = IMAGENET_MEAN.iter().map(|m| (m - 0.5) / 0.5).collect();
        Ok(Self {
            scale: Tensor::from_vec(scale, (1, 3, 1, 1), device)?,
            shift: Tensor::from_vec(shift, (1, 3, 1, 1), device)?,
        })
    }
}

/// Inception-v3 truncated after the last mixed block.
#[derive(Debug, Clone)]
pub struct Inception3 {
    transform_input: Option<InputTransform>,
    stem: [BasicConv2d; 5],
    mixed_5: [InceptionA; 3],
    mixed_6a: InceptionB,
    mixed_6: [InceptionC; 4],
    mixed_7a: InceptionD,
    mixed_7: [InceptionE; 2],
}

impl Inception3 {
    /// Channels of the returned feature map.
    pub const NUM_FEATURES: usize = 2048;

    /// Builds the network from `vb`; `transform_input` enables the ImageNet
    /// input re-mapping used by pretrained weights.
    pub fn load(norm_type: NormType, transform_input: bool, vb: VarBuilder) -> Result<Self> {
        let nt = norm_type;
        let transform_input = if transform_input {
            Some(InputTransform::new(vb.device())?)
        } else {
            None
        };
        Ok(Self {
            transform_input,
            stem: [
                BasicConv2d::square(3, 32, 3, 2, 0, nt, vb.pp("Conv2d_1a_3x3"))?,
                BasicConv2d::square(32, 32, 3, 1, 0, nt, vb.pp("Conv2d_2a_3x3"))?,
                BasicConv2d::square(32, 64, 3, 1, 1, nt, vb.pp("Conv2d_2b_3x3"))?,
                BasicConv2d::pointwise(64, 80, nt, vb.pp("Conv2d_3b_1x1"))?,
                BasicConv2d::square(80, 192, 3, 1, 0, nt, vb.pp("Conv2d_4a_3x3"))?,
            ],
            mixed_5: [
                InceptionA::load(192, 32, nt, vb.pp("Mixed_5b"))?,
                InceptionA::load(256, 64, nt, vb.pp("Mixed_5c"))?,
                InceptionA::load(288, 64, nt, vb.pp("Mixed_5d"))?,
            ],
            mixed_6a: InceptionB::load(288, nt, vb.pp("Mixed_6a"))?,
            mixed_6: [
                InceptionC::load(768, 128, nt, vb.pp("Mixed_6b"))?,
                InceptionC::load(768, 160, nt, vb.pp("Mixed_6c"))?,
                InceptionC::load(768, 160, nt, vb.pp("Mixed_6d"))?,
                InceptionC::load(768, 192, nt, vb.pp("Mixed_6e"))?,
            ],
            mixed_7a: InceptionD::load(768, nt, vb.pp("Mixed_7a"))?,
            mixed_7: [
                InceptionE::load(1280, nt, vb.pp("Mixed_7b"))?,
                InceptionE::load(2048, nt, vb.pp("Mixed_7c"))?,
            ],
        })
    }
}

impl Module for Inception3 {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = match &self.transform_input {
            Some(t) => xs.broadcast_mul(&t.scale)?.broadcast_add(&t.shift)?,
            None => xs.clone(),
        };
        let [c1a, c2a, c2b, c3b, c4a] = &self.stem;
        xs = c2b.forward(&c2a.forward(&c1a.forward(&xs)?)?)?;
        xs = max_pool_reduce(&xs)?;
        xs = c4a.forward(&c3b.forward(&xs)?)?;
        xs = max_pool_reduce(&xs)?;

        for block in &self.mixed_5 {
            xs = block.forward(&xs)?;
        }
        xs = self.mixed_6a.forward(&xs)?;
        for block in &self.mixed_6 {
            xs = block.forward(&xs)?;
        }
        xs = self.mixed_7a.forward(&xs)?;
        for block in &self.mixed_7 {
            xs = block.forward(&xs)?;
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
    fn test_smallest_input_yields_single_cell_feature_map() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let net = Inception3::load(NormType::BatchNorm, true, vb).unwrap();
        let x = Tensor::zeros((1, 3, 75, 75), DType::F32, &Device::Cpu).unwrap();
        let y = net.forward(&x).unwrap();
        assert_eq!(y.dims(), &[1, Inception3::NUM_FEATURES, 1, 1]);
    }

    #[test]
    fn test_asymmetric_kernel_keeps_spatial_size() {
        let dev = Device::Cpu;
        let mut vars = HashMap::new();
        vars.insert(
            "conv.weight".to_string(),
            Tensor::ones((1, 1, 1, 7), DType::F32, &dev).unwrap(),
        );
        vars.insert("norm.weight".to_string(), Tensor::ones(1, DType::F32, &dev).unwrap());
        vars.insert("norm.bias".to_string(), Tensor::zeros(1, DType::F32, &dev).unwrap());
        vars.insert(
            "norm.running_mean".to_string(),
            Tensor::zeros(1, DType::F32, &dev).unwrap(),
        );
        vars.insert(
            "norm.running_var".to_string(),
            Tensor::ones(1, DType::F32, &dev).unwrap(),
        );
        let vb = VarBuilder::from_tensors(vars, DType::F32, &dev);
        let conv = BasicConv2d::load(1, 1, (1, 7), 1, (0, 3), NormType::BatchNorm, vb).unwrap();

        let x = Tensor::ones((1, 1, 4, 9), DType::F32, &dev).unwrap();
        let y = conv.forward(&x).unwrap();
        assert_eq!(y.dims(), &[1, 1, 4, 9]);
        let row = y.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        // Left edge sees 4 of the 7 taps, the centre sees all of them.
        let scale = 1.0 / (1.0f32 + 1e-3).sqrt();
        assert!((row[0] - 4.0 * scale).abs() < 1e-4);
        assert!((row[4] - 7.0 * scale).abs() < 1e-4);
    }

    #[test]
    fn test_avg_pool_counts_padding() {
        let x = Tensor::ones((1, 1, 3, 3), DType::F32, &Device::Cpu).unwrap();
        let y = avg_pool_same(&x).unwrap();
        let v = y.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!((v[0] - 4.0 / 9.0).abs() < 1e-6);
        assert!((v[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_input_transform_maps_normalized_zero_to_mean_offset() {
        let t = InputTransform::new(&Device::Cpu).unwrap();
        let x = Tensor::zeros((1, 3, 1, 1), DType::F32, &Device::Cpu).unwrap();
        let y = x
            .broadcast_mul(&t.scale)
            .unwrap()
            .broadcast_add(&t.shift)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        assert!((y[0] - (0.485 - 0.5) / 0.5).abs() < 1e-6);
    }
}
