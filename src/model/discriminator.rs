//! Tag2Pix discriminator: image → realism + multi-label tag scores.
//!
//! ## Architecture
//!
//! ```text
//! image [B, 3, S, S]
//!   ─→ Conv(3→32) + Conv(32→32, s2)                  stem
//!   ─→ 4 × (2 SE bottlenecks + stride-2 conv)        32 → 64 → 128 → 256 → 512
//!   ─→ 3 × (1 SE bottleneck, stride 1)               512
//!   ─→ global average pool → [B, 512]
//!   ─→ Linear+Sigmoid ×3: adversarial [B,1], illustration tags [B,iv],
//!                          color tags [B,cv]
//! ```
//!
//! The blocks here are the plain squeeze-excite variant: the gate sees only
//! the feature map's pooled statistics. No conditioning vector is threaded
//! through — the discriminator judges pixel content alone, and all three
//! heads read the same pooled feature vector.

use candle_core::{Module, Tensor};
use candle_nn::{BatchNorm, Conv2d, Conv2dConfig, Linear, ModuleT, VarBuilder};

use crate::config::{DiscriminatorConfig, CARDINALITY};
use crate::model::layers;
use crate::model::secat::{EXPANSION, REDUCTION};
use crate::Result;

const LEAKY_SLOPE: f64 = 0.2;

/// Plain squeeze-excite gate: pooled channel statistics → per-channel scale.
#[derive(Debug)]
struct SeGate {
    fc1: Linear,
    fc2: Linear,
}

impl SeGate {
    fn new(channels: usize, vb: VarBuilder) -> Result<Self> {
        let fc1 = layers::linear_no_bias(channels, channels / REDUCTION, vb.pp("fc1"))?;
        let fc2 = layers::linear_no_bias(channels / REDUCTION, channels, vb.pp("fc2"))?;
        Ok(Self { fc1, fc2 })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (b, c, _h, _w) = x.dims4()?;
        let y = layers::global_avg_pool(x)?;
        let y = self.fc1.forward(&y)?.relu()?;
        let y = candle_nn::ops::sigmoid(&self.fc2.forward(&y)?)?;
        let y = y.reshape((b, c, 1, 1))?;
        Ok(x.broadcast_mul(&y)?)
    }
}

/// Non-conditioned ResNeXt bottleneck with squeeze-excite gate.
#[derive(Debug)]
struct SeBottleneck {
    conv1: Conv2d,
    bn1: Option<BatchNorm>,
    conv2: Conv2d,
    bn2: Option<BatchNorm>,
    conv3: Conv2d,
    bn3: Option<BatchNorm>,
    gate: SeGate,
    downsample: Option<(Conv2d, Option<BatchNorm>)>,
}

impl SeBottleneck {
    fn new(inplanes: usize, planes: usize, bn: bool, vb: VarBuilder) -> Result<Self> {
        let outplanes = planes * EXPANSION;
        let make_bn = |c, vb| -> Result<Option<BatchNorm>> {
            if bn {
                Ok(Some(layers::batch_norm(c, vb)?))
            } else {
                Ok(None)
            }
        };

        let conv1 = layers::conv2d_no_bias(inplanes, planes, 1, Default::default(), vb.pp("conv1"))?;
        let bn1 = make_bn(planes, vb.pp("bn1"))?;
        let cfg2 = Conv2dConfig {
            padding: 1,
            groups: CARDINALITY,
            ..Default::default()
        };
        let conv2 = layers::conv2d_no_bias(planes, planes, 3, cfg2, vb.pp("conv2"))?;
        let bn2 = make_bn(planes, vb.pp("bn2"))?;
        let conv3 =
            layers::conv2d_no_bias(planes, outplanes, 1, Default::default(), vb.pp("conv3"))?;
        let bn3 = make_bn(outplanes, vb.pp("bn3"))?;
        let gate = SeGate::new(outplanes, vb.pp("selayer"))?;

        let downsample = if inplanes != outplanes {
            let conv = layers::conv2d_no_bias(
                inplanes,
                outplanes,
                1,
                Default::default(),
                vb.pp("downsample.conv"),
            )?;
            Some((conv, make_bn(outplanes, vb.pp("downsample.bn"))?))
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

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
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

        out = self.gate.forward(&out)?;

        let residual = match &self.downsample {
            Some((conv, ds_bn)) => {
                let r = conv.forward(x)?;
                match ds_bn {
                    Some(bn) => bn.forward_t(&r, false)?,
                    None => r,
                }
            }
            None => x.clone(),
        };

        Ok((out + residual)?.relu()?)
    }
}

fn se_stack(
    inplanes: usize,
    planes: usize,
    block_count: usize,
    bn: bool,
    vb: VarBuilder,
) -> Result<Vec<SeBottleneck>> {
    let mut blocks = Vec::with_capacity(block_count);
    blocks.push(SeBottleneck::new(inplanes, planes, bn, vb.pp("0"))?);
    for i in 1..block_count {
        blocks.push(SeBottleneck::new(
            planes * EXPANSION,
            planes,
            bn,
            vb.pp(format!("{i}")),
        )?);
    }
    Ok(blocks)
}

/// Two SE bottlenecks followed by a stride-2 downsampling convolution.
#[derive(Debug)]
struct DownStage {
    blocks: Vec<SeBottleneck>,
    down: Conv2d,
}

impl DownStage {
    fn new(inplanes: usize, planes: usize, bn: bool, vb: VarBuilder) -> Result<Self> {
        let blocks = se_stack(inplanes, planes / 4, 2, bn, vb.pp("blocks"))?;
        let cfg = Conv2dConfig {
            padding: 1,
            stride: 2,
            ..Default::default()
        };
        let down = layers::conv2d(planes, planes, 3, cfg, vb.pp("down"))?;
        Ok(Self { blocks, down })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let mut out = x.clone();
        for block in &self.blocks {
            out = block.forward(&out)?;
        }
        Ok(candle_nn::ops::leaky_relu(
            &self.down.forward(&out)?,
            LEAKY_SLOPE,
        )?)
    }
}

/// Linear + Sigmoid scoring head.
#[derive(Debug)]
struct Head {
    linear: Linear,
}

impl Head {
    fn new(out_dim: usize, vb: VarBuilder) -> Result<Self> {
        let linear = layers::linear(512, out_dim, vb.pp("0"))?;
        Ok(Self { linear })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(candle_nn::ops::sigmoid(&self.linear.forward(x)?)?)
    }
}

/// The Tag2Pix discriminator.
pub struct Discriminator {
    stem1: Conv2d,
    stem2: Conv2d,
    conv2: DownStage,
    conv3: DownStage,
    conv4: DownStage,
    conv5: DownStage,
    conv6: Vec<SeBottleneck>,
    conv7: Vec<SeBottleneck>,
    conv8: Vec<SeBottleneck>,
    adv_judge: Head,
    iv_judge: Head,
    cv_judge: Head,
    cfg: DiscriminatorConfig,
}

impl Discriminator {
    pub fn new(cfg: &DiscriminatorConfig, vb: VarBuilder) -> Result<Self> {
        cfg.verify()?;
        let bn = cfg.net_opt.bn;

        let stem_cfg1 = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        // Stride-2 stem conv runs unpadded, matching the original.
        let stem_cfg2 = Conv2dConfig {
            stride: 2,
            ..Default::default()
        };
        let stem1 = layers::conv2d(cfg.input_dim, 32, 3, stem_cfg1, vb.pp("conv1.0"))?;
        let stem2 = layers::conv2d(32, 32, 3, stem_cfg2, vb.pp("conv1.2"))?;

        let conv2 = DownStage::new(32, 64, bn, vb.pp("conv2"))?;
        let conv3 = DownStage::new(64, 128, bn, vb.pp("conv3"))?;
        let conv4 = DownStage::new(128, 256, bn, vb.pp("conv4"))?;
        let conv5 = DownStage::new(256, 512, bn, vb.pp("conv5"))?;
        let conv6 = se_stack(512, 128, 1, bn, vb.pp("conv6"))?;
        let conv7 = se_stack(512, 128, 1, bn, vb.pp("conv7"))?;
        let conv8 = se_stack(512, 128, 1, bn, vb.pp("conv8"))?;

        let adv_judge = Head::new(cfg.output_dim, vb.pp("adv_judge"))?;
        let iv_judge = Head::new(cfg.iv_class_num, vb.pp("cit_judge"))?;
        let cv_judge = Head::new(cfg.cv_class_num, vb.pp("cvt_judge"))?;

        tracing::debug!(
            input_size = cfg.input_size,
            iv = cfg.iv_class_num,
            cv = cfg.cv_class_num,
            bn,
            "constructed discriminator"
        );

        Ok(Self {
            stem1,
            stem2,
            conv2,
            conv3,
            conv4,
            conv5,
            conv6,
            conv7,
            conv8,
            adv_judge,
            iv_judge,
            cv_judge,
            cfg: cfg.clone(),
        })
    }

    pub fn config(&self) -> &DiscriminatorConfig {
        &self.cfg
    }

    /// Score an image.
    ///
    /// Returns `(adv [B,1], iv_scores [B,iv], cv_scores [B,cv])`, each in
    /// (0, 1) — independent probabilities, not a normalized distribution.
    pub fn forward(&self, image: &Tensor) -> Result<(Tensor, Tensor, Tensor)> {
        let out = candle_nn::ops::leaky_relu(&self.stem1.forward(image)?, LEAKY_SLOPE)?;
        let mut out = candle_nn::ops::leaky_relu(&self.stem2.forward(&out)?, LEAKY_SLOPE)?;

        out = self.conv2.forward(&out)?;
        out = self.conv3.forward(&out)?;
        out = self.conv4.forward(&out)?;
        out = self.conv5.forward(&out)?;
        for block in self.conv6.iter().chain(&self.conv7).chain(&self.conv8) {
            out = block.forward(&out)?;
        }

        let pooled = layers::global_avg_pool(&out)?;

        let adv = self.adv_judge.forward(&pooled)?;
        let iv = self.iv_judge.forward(&pooled)?;
        let cv = self.cv_judge.forward(&pooled)?;
        Ok((adv, iv, cv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetOpt;
    use candle_core::{DType, Device, Tensor};
    use candle_nn::VarMap;

    fn make_vb(device: &Device) -> (VarMap, VarBuilder<'static>) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        (varmap, vb)
    }

    fn small_config() -> DiscriminatorConfig {
        DiscriminatorConfig {
            input_size: 64,
            cv_class_num: 5,
            iv_class_num: 9,
            ..DiscriminatorConfig::default()
        }
    }

    #[test]
    fn se_bottleneck_shapes() {
        let device = Device::Cpu;
        let (_vm, vb) = make_vb(&device);
        let block = SeBottleneck::new(32, 16, true, vb).unwrap();
        assert!(block.downsample.is_some());
        let x = Tensor::randn(0.0_f32, 1.0, (1, 32, 8, 8), &device).unwrap();
        let out = block.forward(&x).unwrap();
        assert_eq!(out.dims(), &[1, 64, 8, 8]);
    }

    #[test]
    fn down_stage_halves_spatial() {
        let device = Device::Cpu;
        let (_vm, vb) = make_vb(&device);
        let stage = DownStage::new(32, 64, true, vb).unwrap();
        let x = Tensor::randn(0.0_f32, 1.0, (1, 32, 16, 16), &device).unwrap();
        let out = stage.forward(&x).unwrap();
        assert_eq!(out.dims(), &[1, 64, 8, 8]);
    }

    #[test]
    fn three_heads_share_pooled_vector() {
        let device = Device::Cpu;
        let (_vm, vb) = make_vb(&device);
        let cfg = small_config();
        let disc = Discriminator::new(&cfg, vb).unwrap();

        let image = Tensor::randn(0.0_f32, 1.0, (2, 3, 64, 64), &device).unwrap();
        let (adv, iv, cv) = disc.forward(&image).unwrap();
        assert_eq!(adv.dims(), &[2, 1]);
        assert_eq!(iv.dims(), &[2, 9]);
        assert_eq!(cv.dims(), &[2, 5]);

        for scores in [&adv, &iv, &cv] {
            let min: f32 = scores.min_all().unwrap().to_scalar().unwrap();
            let max: f32 = scores.max_all().unwrap().to_scalar().unwrap();
            assert!(min > 0.0 && max < 1.0, "sigmoid range violated: {min}..{max}");
        }
    }

    #[test]
    fn bn_flag_strips_normalization() {
        let device = Device::Cpu;
        let (_vm, vb) = make_vb(&device);
        let cfg = DiscriminatorConfig {
            net_opt: NetOpt {
                bn: false,
                ..NetOpt::default()
            },
            ..small_config()
        };
        let disc = Discriminator::new(&cfg, vb).unwrap();
        for block in &disc.conv6 {
            assert!(block.bn1.is_none() && block.bn2.is_none() && block.bn3.is_none());
        }

        let image = Tensor::randn(0.0_f32, 1.0, (1, 3, 64, 64), &device).unwrap();
        let (adv, _iv, _cv) = disc.forward(&image).unwrap();
        assert_eq!(adv.dims(), &[1, 1]);
    }
}
