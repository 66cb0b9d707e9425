//! Tag2Pix generator: sketch + skeleton → colorized image.
//!
//! ## Architecture
//!
//! ```text
//! sketch ⧺ skeleton [B, 2, S, S]
//!   ─→ encoder: 5 × (Conv3×3 pair + LeakyReLU), strides (1,2,2,2,2)
//!        channels 16 → 32 → 64 → 128 → 256            e1..e5
//!
//! tags [B, cv]
//!   ─→ Linear → [B, 32, S/16, S/16] → conv tower + Tanh   color hint (64ch)
//!   ─→ 4-layer MLP                                        cond vector (64)
//! features [B, 512, 32, 32]  (cit only)
//!   ─→ FeatureConv                                        [B, 256, S/16, S/16]
//!
//! e5 ⧺ [features] ⧺ hint ─→ deconv1 ─┬─→ (⧺ e4) deconv2 → (⧺ e3) deconv3
//!                                    │        → (⧺ e2) deconv4 → (⧺ e1)
//!                                    │             conv pair + Tanh → image
//!                                    └─→ guide decoder (guide only) → guide
//! ```
//!
//! Each `deconv` is a [`DecoderBlock`]: an SE-Cat stack conditioned on the
//! 64-dim tag vector, then pixel-shuffle ×2. Both outputs are `[B, 3, S, S]`
//! in `[-1, 1]`.

use candle_core::{Module, Tensor};
use candle_nn::{BatchNorm, Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig, Linear,
    ModuleT, VarBuilder};

use crate::config::{
    FeatureConvConfig, GeneratorConfig, CIT_FEATURE_CHANNELS, COLOR_FC_OUT,
};
use crate::model::layers;
use crate::model::secat::{secat_stack, SeCatStack};
use crate::{Error, Result};

const LEAKY_SLOPE: f64 = 0.2;

/// Two 3×3 convolutions with LeakyReLU; the first carries the stride.
#[derive(Debug)]
struct EncoderBlock {
    conv1: Conv2d,
    conv2: Conv2d,
}

impl EncoderBlock {
    fn new(inplanes: usize, planes: usize, stride: usize, vb: VarBuilder) -> Result<Self> {
        let cfg1 = Conv2dConfig {
            padding: 1,
            stride,
            ..Default::default()
        };
        let cfg2 = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let conv1 = layers::conv2d(inplanes, planes, 3, cfg1, vb.pp("0"))?;
        let conv2 = layers::conv2d(planes, planes, 3, cfg2, vb.pp("2"))?;
        Ok(Self { conv1, conv2 })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = candle_nn::ops::leaky_relu(&self.conv1.forward(x)?, LEAKY_SLOPE)?;
        Ok(candle_nn::ops::leaky_relu(
            &self.conv2.forward(&x)?,
            LEAKY_SLOPE,
        )?)
    }
}

/// Reprojects an externally supplied feature tensor to the generator's
/// bottleneck resolution and channel count via three 3×3 convolutions.
#[derive(Debug)]
pub struct FeatureConv {
    conv1: Conv2d,
    bn1: Option<BatchNorm>,
    conv2: Conv2d,
    bn2: Option<BatchNorm>,
    conv3: Conv2d,
}

impl FeatureConv {
    pub fn new(cfg: &FeatureConvConfig, bn: bool, vb: VarBuilder) -> Result<Self> {
        let (stride1, stride2) = cfg.strides();
        let conv_cfg = |stride| Conv2dConfig {
            padding: 1,
            stride,
            ..Default::default()
        };

        let conv1 = layers::conv2d_no_bias(
            cfg.input_dim,
            cfg.output_dim,
            3,
            conv_cfg(stride1),
            vb.pp("0"),
        )?;
        let bn1 = if bn {
            Some(layers::batch_norm(cfg.output_dim, vb.pp("1"))?)
        } else {
            None
        };
        let conv2 = layers::conv2d_no_bias(
            cfg.output_dim,
            cfg.output_dim,
            3,
            conv_cfg(stride2),
            vb.pp("3"),
        )?;
        let bn2 = if bn {
            Some(layers::batch_norm(cfg.output_dim, vb.pp("4"))?)
        } else {
            None
        };
        let conv3 =
            layers::conv2d_no_bias(cfg.output_dim, cfg.output_dim, 3, conv_cfg(1), vb.pp("6"))?;

        Ok(Self {
            conv1,
            bn1,
            conv2,
            bn2,
            conv3,
        })
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
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
        Ok(self.conv3.forward(&out)?.relu()?)
    }
}

/// SE-Cat stack at fixed resolution, then pixel-shuffle ×2.
///
/// `planes` is the stack's output channel count; the shuffle trades it for
/// spatial resolution, leaving `planes / 4` channels at twice the size.
#[derive(Debug)]
pub struct DecoderBlock {
    stack: SeCatStack,
}

impl DecoderBlock {
    pub fn new(
        inplanes: usize,
        planes: usize,
        cat_channels: usize,
        block_count: usize,
        bn: bool,
        vb: VarBuilder,
    ) -> Result<Self> {
        let stack = secat_stack(
            inplanes,
            planes / 4,
            cat_channels,
            block_count,
            1,
            bn,
            vb.pp("secat_layer"),
        )?;
        Ok(Self { stack })
    }

    pub fn forward(&self, x: &Tensor, cat_feature: &Tensor) -> Result<Tensor> {
        let out = self.stack.forward(x, cat_feature)?;
        layers::pixel_shuffle(&out, 2)
    }
}

/// Projects the tag vector to a spatial color-hint map at the bottleneck.
#[derive(Debug)]
struct ColorHintBranch {
    linear: Linear,
    conv1: Conv2d,
    conv2: Conv2d,
    conv3: Conv2d,
    bottom_h: usize,
}

impl ColorHintBranch {
    fn new(cv_class_num: usize, bottom_h: usize, vb: VarBuilder) -> Result<Self> {
        let linear = layers::linear(cv_class_num, bottom_h * bottom_h * 32, vb.pp("linear"))?;
        let cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let conv1 = layers::conv2d(32, 64, 3, cfg, vb.pp("color_conv.0"))?;
        let conv2 = layers::conv2d(64, 64, 3, cfg, vb.pp("color_conv.2"))?;
        let conv3 = layers::conv2d(64, 64, 3, cfg, vb.pp("color_conv.4"))?;
        Ok(Self {
            linear,
            conv1,
            conv2,
            conv3,
            bottom_h,
        })
    }

    fn forward(&self, tags: &Tensor) -> Result<Tensor> {
        let (b, _cv) = tags.dims2()?;
        let x = self.linear.forward(tags)?;
        let x = x.reshape((b, 32, self.bottom_h, self.bottom_h))?;
        let x = candle_nn::ops::leaky_relu(&self.conv1.forward(&x)?, LEAKY_SLOPE)?;
        let x = candle_nn::ops::leaky_relu(&self.conv2.forward(&x)?, LEAKY_SLOPE)?;
        Ok(self.conv3.forward(&x)?.tanh()?)
    }
}

/// Embeds the tag vector into the 64-dim conditioning vector consumed by
/// every SE-Cat gate.
#[derive(Debug)]
struct TagMlp {
    fcs: Vec<Linear>,
    relu: bool,
}

impl TagMlp {
    fn new(cv_class_num: usize, relu: bool, vb: VarBuilder) -> Result<Self> {
        let dims = [cv_class_num, COLOR_FC_OUT, COLOR_FC_OUT, COLOR_FC_OUT];
        let mut fcs = Vec::with_capacity(dims.len());
        for (i, &in_dim) in dims.iter().enumerate() {
            fcs.push(layers::linear(in_dim, COLOR_FC_OUT, vb.pp(format!("{i}")))?);
        }
        Ok(Self { fcs, relu })
    }

    fn forward(&self, tags: &Tensor) -> Result<Tensor> {
        let mut x = tags.clone();
        let last = self.fcs.len() - 1;
        for (i, fc) in self.fcs.iter().enumerate() {
            x = fc.forward(&x)?;
            if self.relu && i < last {
                x = x.relu()?;
            }
        }
        Ok(x)
    }
}

/// Auxiliary guide head: maps the first decoder stage's output straight to a
/// full-resolution image with transposed convolutions, giving the training
/// loop an intermediate supervision target.
#[derive(Debug)]
struct GuideDecoder {
    deconv1: ConvTranspose2d,
    deconv2: ConvTranspose2d,
    deconv3: ConvTranspose2d,
    deconv4: ConvTranspose2d,
}

impl GuideDecoder {
    fn new(output_dim: usize, vb: VarBuilder) -> Result<Self> {
        let up = ConvTranspose2dConfig {
            padding: 1,
            output_padding: 1,
            stride: 2,
            ..Default::default()
        };
        let same = ConvTranspose2dConfig {
            padding: 1,
            ..Default::default()
        };
        let deconv1 = layers::conv_transpose2d(256, 128, 3, up, vb.pp("0"))?;
        let deconv2 = layers::conv_transpose2d(128, 64, 3, up, vb.pp("2"))?;
        let deconv3 = layers::conv_transpose2d(64, 32, 3, up, vb.pp("4"))?;
        let deconv4 = layers::conv_transpose2d(32, output_dim, 3, same, vb.pp("6"))?;
        Ok(Self {
            deconv1,
            deconv2,
            deconv3,
            deconv4,
        })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = candle_nn::ops::leaky_relu(&self.deconv1.forward(x)?, LEAKY_SLOPE)?;
        let x = candle_nn::ops::leaky_relu(&self.deconv2.forward(&x)?, LEAKY_SLOPE)?;
        let x = candle_nn::ops::leaky_relu(&self.deconv3.forward(&x)?, LEAKY_SLOPE)?;
        Ok(self.deconv4.forward(&x)?.tanh()?)
    }
}

/// Final block: two plain convolutions producing the Tanh-bounded image.
#[derive(Debug)]
struct ToImage {
    conv1: Conv2d,
    conv2: Conv2d,
}

impl ToImage {
    fn new(inplanes: usize, output_dim: usize, vb: VarBuilder) -> Result<Self> {
        let cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let conv1 = layers::conv2d(inplanes, 32, 3, cfg, vb.pp("0"))?;
        let conv2 = layers::conv2d(32, output_dim, 3, cfg, vb.pp("2"))?;
        Ok(Self { conv1, conv2 })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = candle_nn::ops::leaky_relu(&self.conv1.forward(x)?, LEAKY_SLOPE)?;
        Ok(self.conv2.forward(&x)?.tanh()?)
    }
}

/// The Tag2Pix generator.
pub struct Generator {
    conv1: EncoderBlock,
    conv2: EncoderBlock,
    conv3: EncoderBlock,
    conv4: EncoderBlock,
    conv5: EncoderBlock,
    color_hint: ColorHintBranch,
    tag_mlp: TagMlp,
    feature_conv: Option<FeatureConv>,
    deconv1: DecoderBlock,
    deconv2: DecoderBlock,
    deconv3: DecoderBlock,
    deconv4: DecoderBlock,
    to_image: ToImage,
    guide: Option<GuideDecoder>,
    cfg: GeneratorConfig,
}

impl Generator {
    /// Build the generator with the default CIT feature adapter.
    pub fn new(cfg: &GeneratorConfig, vb: VarBuilder) -> Result<Self> {
        Self::new_with_adapter(cfg, &FeatureConvConfig::default(), vb)
    }

    /// Build the generator with an explicit feature-adapter configuration.
    ///
    /// The decoder input arithmetic hardcodes the adapter width as
    /// [`CIT_FEATURE_CHANNELS`]; a diverging `output_dim` is rejected here
    /// rather than silently parameterized.
    pub fn new_with_adapter(
        cfg: &GeneratorConfig,
        feature_cfg: &FeatureConvConfig,
        vb: VarBuilder,
    ) -> Result<Self> {
        cfg.verify()?;
        if cfg.net_opt.cit && feature_cfg.output_dim != CIT_FEATURE_CHANNELS {
            return Err(Error::Config(format!(
                "feature adapter output_dim {} does not match the decoder's expected {}",
                feature_cfg.output_dim, CIT_FEATURE_CHANNELS
            )));
        }

        let bn = cfg.net_opt.bn;
        let bottom_h = cfg.bottom_h();

        let conv1 = EncoderBlock::new(cfg.input_dim, 16, 1, vb.pp("conv1"))?;
        let conv2 = EncoderBlock::new(16, 32, 2, vb.pp("conv2"))?;
        let conv3 = EncoderBlock::new(32, 64, 2, vb.pp("conv3"))?;
        let conv4 = EncoderBlock::new(64, 128, 2, vb.pp("conv4"))?;
        let conv5 = EncoderBlock::new(128, 256, 2, vb.pp("conv5"))?;

        let color_hint = ColorHintBranch::new(cfg.cv_class_num, bottom_h, vb.pp("color_hint"))?;
        let tag_mlp = TagMlp::new(cfg.cv_class_num, cfg.net_opt.relu, vb.pp("color_fc"))?;

        let feature_conv = if cfg.net_opt.cit {
            Some(FeatureConv::new(feature_cfg, bn, vb.pp("feature_conv"))?)
        } else {
            None
        };

        let bottom = cfg.bottom_layer_len();
        let deconv1 = DecoderBlock::new(
            bottom,
            4 * 256,
            COLOR_FC_OUT,
            cfg.layers[0],
            bn,
            vb.pp("deconv1"),
        )?;
        let deconv2 = DecoderBlock::new(
            256 + 128,
            4 * 128,
            COLOR_FC_OUT,
            cfg.layers[1],
            bn,
            vb.pp("deconv2"),
        )?;
        let deconv3 = DecoderBlock::new(
            128 + 64,
            4 * 64,
            COLOR_FC_OUT,
            cfg.layers[2],
            bn,
            vb.pp("deconv3"),
        )?;
        let deconv4 = DecoderBlock::new(
            64 + 32,
            4 * 32,
            COLOR_FC_OUT,
            cfg.layers[3],
            bn,
            vb.pp("deconv4"),
        )?;
        let to_image = ToImage::new(32 + 16, cfg.output_dim, vb.pp("deconv5"))?;

        let guide = if cfg.net_opt.guide {
            Some(GuideDecoder::new(cfg.output_dim, vb.pp("guide_decoder"))?)
        } else {
            None
        };

        tracing::debug!(
            input_size = cfg.input_size,
            bottom_layer_len = bottom,
            cit = cfg.net_opt.cit,
            guide = cfg.net_opt.guide,
            bn,
            "constructed generator"
        );

        Ok(Self {
            conv1,
            conv2,
            conv3,
            conv4,
            conv5,
            color_hint,
            tag_mlp,
            feature_conv,
            deconv1,
            deconv2,
            deconv3,
            deconv4,
            to_image,
            guide,
            cfg: cfg.clone(),
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.cfg
    }

    /// Run the generator.
    ///
    /// - `sketch`, `skeleton`: `[B, 1, S, S]` (any split of `input_dim`
    ///   channels works; they are concatenated on the channel axis)
    /// - `feature_tensor`: CIT features, required iff the `cit` option is on
    /// - `tags`: `[B, cv_class_num]` one-hot or multi-hot
    ///
    /// Returns `(image, guide_image)`, both `[B, 3, S, S]` in `[-1, 1]`.
    /// With the `guide` option off, the guide image is the final image.
    pub fn forward(
        &self,
        sketch: &Tensor,
        skeleton: &Tensor,
        feature_tensor: Option<&Tensor>,
        tags: &Tensor,
    ) -> Result<(Tensor, Tensor)> {
        let x = Tensor::cat(&[sketch, skeleton], 1)?;
        let e1 = self.conv1.forward(&x)?;
        let e2 = self.conv2.forward(&e1)?;
        let e3 = self.conv3.forward(&e2)?;
        let e4 = self.conv4.forward(&e3)?;
        let e5 = self.conv5.forward(&e4)?;

        let hint = self.color_hint.forward(tags)?;
        let cond = self.tag_mlp.forward(tags)?;

        let bottom = match (&self.feature_conv, feature_tensor) {
            (Some(fc), Some(feature)) => {
                let feature = fc.forward(feature)?;
                Tensor::cat(&[&e5, &feature, &hint], 1)?
            }
            (Some(_), None) => {
                return Err(Error::Config(
                    "cit is enabled but no feature tensor was supplied".into(),
                ))
            }
            (None, _) => Tensor::cat(&[&e5, &hint], 1)?,
        };

        let d1 = self.deconv1.forward(&bottom, &cond)?;
        let d2 = self.deconv2.forward(&Tensor::cat(&[&d1, &e4], 1)?, &cond)?;
        let d3 = self.deconv3.forward(&Tensor::cat(&[&d2, &e3], 1)?, &cond)?;
        let d4 = self.deconv4.forward(&Tensor::cat(&[&d3, &e2], 1)?, &cond)?;
        let image = self.to_image.forward(&Tensor::cat(&[&d4, &e1], 1)?)?;

        let guide_image = match &self.guide {
            Some(guide) => guide.forward(&d1)?,
            None => image.clone(),
        };

        Ok((image, guide_image))
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

    fn small_config(net_opt: NetOpt) -> GeneratorConfig {
        GeneratorConfig {
            input_size: 32,
            cv_class_num: 7,
            iv_class_num: 11,
            layers: vec![1, 1, 1, 1],
            net_opt,
            ..GeneratorConfig::default()
        }
    }

    fn small_adapter() -> FeatureConvConfig {
        // 4×4 features down to the 2×2 bottleneck of a 32-sized input.
        FeatureConvConfig {
            input_dim: 8,
            output_dim: 256,
            input_size: 4,
            output_size: 2,
        }
    }

    fn one_hot(b: usize, classes: usize, device: &Device) -> Tensor {
        let mut data = vec![0.0_f32; b * classes];
        for i in 0..b {
            data[i * classes] = 1.0;
        }
        Tensor::from_vec(data, (b, classes), device).unwrap()
    }

    #[test]
    fn feature_conv_halves_spatial() {
        let device = Device::Cpu;
        let (_vm, vb) = make_vb(&device);
        let cfg = FeatureConvConfig {
            input_dim: 8,
            output_dim: 16,
            input_size: 8,
            output_size: 4,
        };
        let fc = FeatureConv::new(&cfg, true, vb).unwrap();
        let x = Tensor::randn(0.0_f32, 1.0, (1, 8, 8, 8), &device).unwrap();
        let out = fc.forward(&x).unwrap();
        assert_eq!(out.dims(), &[1, 16, 4, 4]);
    }

    #[test]
    fn feature_conv_quarter_and_identity_ratios() {
        let device = Device::Cpu;
        let (_vm, vb) = make_vb(&device);
        let quarter = FeatureConvConfig {
            input_dim: 4,
            output_dim: 8,
            input_size: 16,
            output_size: 4,
        };
        let fc = FeatureConv::new(&quarter, false, vb.pp("q")).unwrap();
        let x = Tensor::randn(0.0_f32, 1.0, (1, 4, 16, 16), &device).unwrap();
        assert_eq!(fc.forward(&x).unwrap().dims(), &[1, 8, 4, 4]);

        let same = FeatureConvConfig {
            input_dim: 4,
            output_dim: 8,
            input_size: 8,
            output_size: 8,
        };
        let fc = FeatureConv::new(&same, false, vb.pp("s")).unwrap();
        let x = Tensor::randn(0.0_f32, 1.0, (1, 4, 8, 8), &device).unwrap();
        assert_eq!(fc.forward(&x).unwrap().dims(), &[1, 8, 8, 8]);
    }

    #[test]
    fn decoder_block_shuffles_channels_to_spatial() {
        let device = Device::Cpu;
        let (_vm, vb) = make_vb(&device);
        let block = DecoderBlock::new(48, 64, 8, 2, true, vb).unwrap();
        let x = Tensor::randn(0.0_f32, 1.0, (1, 48, 4, 4), &device).unwrap();
        let cat = Tensor::randn(0.0_f32, 1.0, (1, 8), &device).unwrap();
        let out = block.forward(&x, &cat).unwrap();
        assert_eq!(out.dims(), &[1, 16, 8, 8]);
    }

    #[test]
    fn forward_without_optional_branches() {
        let device = Device::Cpu;
        let (_vm, vb) = make_vb(&device);
        let cfg = small_config(NetOpt {
            bn: true,
            relu: true,
            cit: false,
            guide: false,
        });
        let gen = Generator::new(&cfg, vb).unwrap();

        let sketch = Tensor::randn(0.0_f32, 1.0, (1, 1, 32, 32), &device).unwrap();
        let skeleton = Tensor::randn(0.0_f32, 1.0, (1, 1, 32, 32), &device).unwrap();
        let tags = one_hot(1, 7, &device);
        let (image, guide) = gen.forward(&sketch, &skeleton, None, &tags).unwrap();

        assert_eq!(image.dims(), &[1, 3, 32, 32]);
        // guide off: guide output is the final output, bit for bit.
        let a: Vec<f32> = image.flatten_all().unwrap().to_vec1().unwrap();
        let b: Vec<f32> = guide.flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(a, b);

        let max_abs: f32 = image
            .abs()
            .unwrap()
            .max_all()
            .unwrap()
            .to_scalar()
            .unwrap();
        assert!(max_abs <= 1.0, "tanh output out of range: {max_abs}");
    }

    #[test]
    fn forward_with_guide_head() {
        let device = Device::Cpu;
        let (_vm, vb) = make_vb(&device);
        let cfg = small_config(NetOpt {
            bn: true,
            relu: false,
            cit: false,
            guide: true,
        });
        let gen = Generator::new(&cfg, vb).unwrap();

        let sketch = Tensor::randn(0.0_f32, 1.0, (2, 1, 32, 32), &device).unwrap();
        let skeleton = Tensor::randn(0.0_f32, 1.0, (2, 1, 32, 32), &device).unwrap();
        let tags = one_hot(2, 7, &device);
        let (image, guide) = gen.forward(&sketch, &skeleton, None, &tags).unwrap();

        assert_eq!(image.dims(), &[2, 3, 32, 32]);
        assert_eq!(guide.dims(), &[2, 3, 32, 32]);
        let max_abs: f32 = guide
            .abs()
            .unwrap()
            .max_all()
            .unwrap()
            .to_scalar()
            .unwrap();
        assert!(max_abs <= 1.0);
    }

    #[test]
    fn forward_with_cit_features() {
        let device = Device::Cpu;
        let (_vm, vb) = make_vb(&device);
        let cfg = small_config(NetOpt {
            bn: false,
            relu: true,
            cit: true,
            guide: false,
        });
        let gen = Generator::new_with_adapter(&cfg, &small_adapter(), vb).unwrap();
        assert_eq!(gen.config().bottom_layer_len(), 256 + 256 + 64);

        let sketch = Tensor::randn(0.0_f32, 1.0, (1, 1, 32, 32), &device).unwrap();
        let skeleton = Tensor::randn(0.0_f32, 1.0, (1, 1, 32, 32), &device).unwrap();
        let features = Tensor::randn(0.0_f32, 1.0, (1, 8, 4, 4), &device).unwrap();
        let tags = one_hot(1, 7, &device);
        let (image, _guide) = gen
            .forward(&sketch, &skeleton, Some(&features), &tags)
            .unwrap();
        assert_eq!(image.dims(), &[1, 3, 32, 32]);
    }

    #[test]
    fn cit_requires_feature_tensor() {
        let device = Device::Cpu;
        let (_vm, vb) = make_vb(&device);
        let cfg = small_config(NetOpt {
            bn: true,
            relu: true,
            cit: true,
            guide: false,
        });
        let gen = Generator::new_with_adapter(&cfg, &small_adapter(), vb).unwrap();

        let sketch = Tensor::randn(0.0_f32, 1.0, (1, 1, 32, 32), &device).unwrap();
        let skeleton = Tensor::randn(0.0_f32, 1.0, (1, 1, 32, 32), &device).unwrap();
        let tags = one_hot(1, 7, &device);
        let err = gen.forward(&sketch, &skeleton, None, &tags);
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn diverging_adapter_width_rejected() {
        let device = Device::Cpu;
        let (_vm, vb) = make_vb(&device);
        let cfg = small_config(NetOpt {
            bn: true,
            relu: true,
            cit: true,
            guide: false,
        });
        let adapter = FeatureConvConfig {
            output_dim: 128,
            ..small_adapter()
        };
        let err = Generator::new_with_adapter(&cfg, &adapter, vb);
        assert!(matches!(err, Err(Error::Config(_))));
    }
}
