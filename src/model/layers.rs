//! Layer constructors and tensor helpers shared by both networks.
//!
//! The constructors mirror `candle_nn`'s but pin the initializers the
//! networks were trained with: Kaiming-normal (fan-out, ReLU gain) for
//! convolution weights, Kaiming-normal (fan-in) for linear weights, and
//! constant zero for every bias. Normalization scale/shift use candle's
//! defaults (1 / 0). Keeping the policy in the constructors means a freshly
//! built model is already correctly initialized — there is no separate
//! module-walking pass.

use candle_core::Tensor;
use candle_nn::init::{FanInOut, Init, NonLinearity, NormalOrUniform};
use candle_nn::{
    BatchNorm, BatchNormConfig, Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig,
    Linear, VarBuilder,
};

use crate::Result;

const KAIMING_FAN_OUT: Init = Init::Kaiming {
    dist: NormalOrUniform::Normal,
    fan: FanInOut::FanOut,
    non_linearity: NonLinearity::ReLU,
};

const KAIMING_FAN_IN: Init = Init::Kaiming {
    dist: NormalOrUniform::Normal,
    fan: FanInOut::FanIn,
    non_linearity: NonLinearity::ReLU,
};

/// 2D convolution with Kaiming-normal (fan-out) weight and zero bias.
pub fn conv2d(
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    cfg: Conv2dConfig,
    vb: VarBuilder,
) -> Result<Conv2d> {
    let ws = vb.get_with_hints(
        (
            out_channels,
            in_channels / cfg.groups,
            kernel_size,
            kernel_size,
        ),
        "weight",
        KAIMING_FAN_OUT,
    )?;
    let bs = vb.get_with_hints(out_channels, "bias", Init::Const(0.))?;
    Ok(Conv2d::new(ws, Some(bs), cfg))
}

/// Bias-free 2D convolution (used wherever a normalization layer follows).
pub fn conv2d_no_bias(
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    cfg: Conv2dConfig,
    vb: VarBuilder,
) -> Result<Conv2d> {
    let ws = vb.get_with_hints(
        (
            out_channels,
            in_channels / cfg.groups,
            kernel_size,
            kernel_size,
        ),
        "weight",
        KAIMING_FAN_OUT,
    )?;
    Ok(Conv2d::new(ws, None, cfg))
}

/// 2D transposed convolution with Kaiming-normal (fan-out) weight and zero
/// bias.
pub fn conv_transpose2d(
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    cfg: ConvTranspose2dConfig,
    vb: VarBuilder,
) -> Result<ConvTranspose2d> {
    let ws = vb.get_with_hints(
        (in_channels, out_channels, kernel_size, kernel_size),
        "weight",
        KAIMING_FAN_OUT,
    )?;
    let bs = vb.get_with_hints(out_channels, "bias", Init::Const(0.))?;
    Ok(ConvTranspose2d::new(ws, Some(bs), cfg))
}

/// Linear layer with Kaiming-normal (fan-in) weight and zero bias.
pub fn linear(in_dim: usize, out_dim: usize, vb: VarBuilder) -> Result<Linear> {
    let ws = vb.get_with_hints((out_dim, in_dim), "weight", KAIMING_FAN_IN)?;
    let bs = vb.get_with_hints(out_dim, "bias", Init::Const(0.))?;
    Ok(Linear::new(ws, Some(bs)))
}

/// Bias-free linear layer (the attention-gate bottleneck).
pub fn linear_no_bias(in_dim: usize, out_dim: usize, vb: VarBuilder) -> Result<Linear> {
    let ws = vb.get_with_hints((out_dim, in_dim), "weight", KAIMING_FAN_IN)?;
    Ok(Linear::new(ws, None))
}

/// Batch normalization with candle's defaults (scale 1, shift 0, eps 1e-5).
pub fn batch_norm(num_features: usize, vb: VarBuilder) -> Result<BatchNorm> {
    Ok(candle_nn::batch_norm(
        num_features,
        BatchNormConfig::default(),
        vb,
    )?)
}

/// Pixel shuffle: `[B, C*r², H, W]` → `[B, C, H*r, W*r]`.
pub fn pixel_shuffle(x: &Tensor, r: usize) -> Result<Tensor> {
    let (b, c, h, w) = x.dims4()?;
    let oc = c / (r * r);
    let x = x.reshape((b, oc, r, r, h, w))?;
    let x = x.permute([0, 1, 4, 2, 5, 3])?;
    Ok(x.reshape((b, oc, h * r, w * r))?)
}

/// Global average pool: `[B, C, H, W]` → `[B, C]`.
pub fn global_avg_pool(x: &Tensor) -> Result<Tensor> {
    Ok(x.mean(3)?.mean(2)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Module, Tensor};
    use candle_nn::VarMap;

    fn make_vb(device: &Device) -> (VarMap, VarBuilder<'static>) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        (varmap, vb)
    }

    #[test]
    fn conv2d_shape_and_init() {
        let device = Device::Cpu;
        let (_vm, vb) = make_vb(&device);
        let cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let conv = conv2d(4, 8, 3, cfg, vb).unwrap();
        let x = Tensor::randn(0.0_f32, 1.0, (2, 4, 6, 6), &device).unwrap();
        let out = conv.forward(&x).unwrap();
        assert_eq!(out.dims(), &[2, 8, 6, 6]);
        // Kaiming init must not leave the weights at zero.
        let wsum: f32 = conv
            .weight()
            .abs()
            .unwrap()
            .sum_all()
            .unwrap()
            .to_scalar()
            .unwrap();
        assert!(wsum > 0.0);
    }

    #[test]
    fn grouped_conv_weight_shape() {
        let device = Device::Cpu;
        let (_vm, vb) = make_vb(&device);
        let cfg = Conv2dConfig {
            padding: 1,
            groups: 4,
            ..Default::default()
        };
        let conv = conv2d_no_bias(16, 16, 3, cfg, vb).unwrap();
        assert_eq!(conv.weight().dims(), &[16, 4, 3, 3]);
    }

    #[test]
    fn conv_transpose_doubles_spatial() {
        let device = Device::Cpu;
        let (_vm, vb) = make_vb(&device);
        let cfg = ConvTranspose2dConfig {
            padding: 1,
            output_padding: 1,
            stride: 2,
            ..Default::default()
        };
        let conv = conv_transpose2d(8, 4, 3, cfg, vb).unwrap();
        let x = Tensor::randn(0.0_f32, 1.0, (1, 8, 5, 5), &device).unwrap();
        let out = conv.forward(&x).unwrap();
        assert_eq!(out.dims(), &[1, 4, 10, 10]);
    }

    #[test]
    fn pixel_shuffle_shape() {
        let device = Device::Cpu;
        let x = Tensor::randn(0.0_f32, 1.0, (1, 16, 4, 4), &device).unwrap();
        let out = pixel_shuffle(&x, 2).unwrap();
        assert_eq!(out.dims(), &[1, 4, 8, 8]);
    }

    #[test]
    fn global_avg_pool_matches_mean() {
        let device = Device::Cpu;
        let x = Tensor::full(3.0_f32, (2, 5, 4, 4), &device).unwrap();
        let out = global_avg_pool(&x).unwrap();
        assert_eq!(out.dims(), &[2, 5]);
        let v: Vec<Vec<f32>> = out.to_vec2().unwrap();
        assert!((v[0][0] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn linear_bias_starts_at_zero() {
        let device = Device::Cpu;
        let (_vm, vb) = make_vb(&device);
        let lin = linear(8, 4, vb).unwrap();
        let bsum: f32 = lin
            .bias()
            .unwrap()
            .abs()
            .unwrap()
            .sum_all()
            .unwrap()
            .to_scalar()
            .unwrap();
        assert_eq!(bsum, 0.0);
    }
}
