//! SE-Cat residual blocks (squeeze-excite with category conditioning).
//!
//! The building block of the generator's decoder: a ResNeXt-style
//! bottleneck whose channel-attention gate sees not only the feature map's
//! pooled statistics but also an external category embedding, so the gating
//! can follow the requested color tags.
//!
//! ```text
//! x ──1×1──[BN]──ReLU──3×3 grouped(stride)──[BN]──ReLU──1×1──[BN]──┐
//! │                                                            SE-Cat gate
//! └────────────────1×1 projection [BN] (when shape changes)───────(+)──ReLU
//! ```
//!
//! All `[BN]` layers exist only when the `bn` option is set; the convolutions
//! are bias-free either way.

use candle_core::{Module, Tensor};
use candle_nn::{BatchNorm, Conv2d, Conv2dConfig, Linear, ModuleT, VarBuilder};

use crate::config::CARDINALITY;
use crate::model::layers;
use crate::Result;

/// Output channels = planes × EXPANSION.
pub const EXPANSION: usize = 4;

/// Attention-gate bottleneck reduction ratio.
pub const REDUCTION: usize = 16;

/// Per-channel attention gate conditioned on an external category embedding.
///
/// Pools `[B, C, H, W]` to `[B, C]`, concatenates the `[B, K]` conditioning
/// vector, squeezes through a 2-layer bottleneck to per-channel scales in
/// (0, 1), and broadcast-multiplies them back onto the feature map.
#[derive(Debug)]
pub struct SeCatGate {
    fc1: Linear,
    fc2: Linear,
}

impl SeCatGate {
    pub fn new(
        channels: usize,
        cat_channels: usize,
        reduction: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let fc1 =
            layers::linear_no_bias(channels + cat_channels, channels / reduction, vb.pp("fc1"))?;
        let fc2 = layers::linear_no_bias(channels / reduction, channels, vb.pp("fc2"))?;
        Ok(Self { fc1, fc2 })
    }

    pub fn forward(&self, x: &Tensor, cat_feature: &Tensor) -> Result<Tensor> {
        let (b, c, _h, _w) = x.dims4()?;
        let y = layers::global_avg_pool(x)?;
        let y = Tensor::cat(&[&y, cat_feature], 1)?;
        let y = self.fc1.forward(&y)?.relu()?;
        let y = candle_nn::ops::sigmoid(&self.fc2.forward(&y)?)?;
        let y = y.reshape((b, c, 1, 1))?;
        Ok(x.broadcast_mul(&y)?)
    }
}

/// 1×1 projection (+ optional BN) for the residual path when the block
/// changes stride or channel count.
#[derive(Debug)]
struct Downsample {
    conv: Conv2d,
    bn: Option<BatchNorm>,
}

impl Downsample {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let out = self.conv.forward(x)?;
        match &self.bn {
            Some(bn) => Ok(bn.forward_t(&out, false)?),
            None => Ok(out),
        }
    }
}

/// SE-Cat residual bottleneck block.
#[derive(Debug)]
pub struct SeCatBottleneck {
    conv1: Conv2d,
    bn1: Option<BatchNorm>,
    conv2: Conv2d,
    bn2: Option<BatchNorm>,
    conv3: Conv2d,
    bn3: Option<BatchNorm>,
    gate: SeCatGate,
    downsample: Option<Downsample>,
}

impl SeCatBottleneck {
    /// Build one block. The residual projection is created exactly when the
    /// block changes spatial resolution or channel count, so the residual
    /// addition always type-checks.
    pub fn new(
        inplanes: usize,
        planes: usize,
        cat_channels: usize,
        stride: usize,
        bn: bool,
        vb: VarBuilder,
    ) -> Result<Self> {
        let outplanes = planes * EXPANSION;

        let conv1 = layers::conv2d_no_bias(inplanes, planes, 1, Default::default(), vb.pp("conv1"))?;
        let bn1 = if bn {
            Some(layers::batch_norm(planes, vb.pp("bn1"))?)
        } else {
            None
        };

        let cfg2 = Conv2dConfig {
            padding: 1,
            stride,
            groups: CARDINALITY,
            ..Default::default()
        };
        let conv2 = layers::conv2d_no_bias(planes, planes, 3, cfg2, vb.pp("conv2"))?;
        let bn2 = if bn {
            Some(layers::batch_norm(planes, vb.pp("bn2"))?)
        } else {
            None
        };

        let conv3 =
            layers::conv2d_no_bias(planes, outplanes, 1, Default::default(), vb.pp("conv3"))?;
        let bn3 = if bn {
            Some(layers::batch_norm(outplanes, vb.pp("bn3"))?)
        } else {
            None
        };

        let gate = SeCatGate::new(outplanes, cat_channels, REDUCTION, vb.pp("selayer"))?;

        let downsample = if stride != 1 || inplanes != outplanes {
            let cfg = Conv2dConfig {
                stride,
                ..Default::default()
            };
            let conv =
                layers::conv2d_no_bias(inplanes, outplanes, 1, cfg, vb.pp("downsample.conv"))?;
            let ds_bn = if bn {
                Some(layers::batch_norm(outplanes, vb.pp("downsample.bn"))?)
            } else {
                None
            };
            Some(Downsample { conv, bn: ds_bn })
        } else {
            None
        };

        Ok(Self {
            conv1,
            bn1,
            conv2,
            bn2,
            conv3,
            bn3,
            gate,
            downsample,
        })
    }

    pub fn forward(&self, x: &Tensor, cat_feature: &Tensor) -> Result<Tensor> {
        let mut out = self.conv1.forward(x)?;
        if let Some(bn) = &self.bn1 {
            out = bn.forward_t(&out, false)?;
        }
        out = out.relu()?;

        out = self.conv2.forward(&out)?;
        if let Some(bn) = &self.bn2 {
            out = bn.forward_t(&out, false)?;
        }
        out = out.relu()?;

        out = self.conv3.forward(&out)?;
        if let Some(bn) = &self.bn3 {
            out = bn.forward_t(&out, false)?;
        }

        out = self.gate.forward(&out, cat_feature)?;

        let residual = match &self.downsample {
            Some(ds) => ds.forward(x)?,
            None => x.clone(),
        };

        Ok((out + residual)?.relu()?)
    }
}

/// A chain of SE-Cat bottlenecks sharing one conditioning vector.
///
/// Only the first block may change stride/channels; the rest run at
/// `planes × EXPANSION` channels and stride 1.
#[derive(Debug)]
pub struct SeCatStack {
    blocks: Vec<SeCatBottleneck>,
}

impl SeCatStack {
    pub fn forward(&self, x: &Tensor, cat_feature: &Tensor) -> Result<Tensor> {
        let mut out = x.clone();
        for block in &self.blocks {
            out = block.forward(&out, cat_feature)?;
        }
        Ok(out)
    }
}

/// Build a stack of `block_count` SE-Cat bottlenecks.
pub fn secat_stack(
    inplanes: usize,
    planes: usize,
    cat_channels: usize,
    block_count: usize,
    stride: usize,
    bn: bool,
    vb: VarBuilder,
) -> Result<SeCatStack> {
    let mut blocks = Vec::with_capacity(block_count);
    blocks.push(SeCatBottleneck::new(
        inplanes,
        planes,
        cat_channels,
        stride,
        bn,
        vb.pp("0"),
    )?);
    for i in 1..block_count {
        blocks.push(SeCatBottleneck::new(
            planes * EXPANSION,
            planes,
            cat_channels,
            1,
            bn,
            vb.pp(format!("{i}")),
        )?);
    }
    Ok(SeCatStack { blocks })
}
