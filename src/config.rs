//! Configuration for the Tag2Pix colorization networks.
//!
//! Matches the Python network defaults (`DEFAULT_NET_OPT`, the generator's
//! `layers=[12, 8, 5, 5]`, and the CIT feature tensor shape).

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Width of the conditioning vector produced by the tag MLP and consumed by
/// every SE-Cat attention gate.
pub const COLOR_FC_OUT: usize = 64;

/// Channel count of the spatial color-hint map at the bottleneck.
pub const COLOR_HINT_CHANNELS: usize = 64;

/// Channel count the decoder expects from the feature adapter when the
/// CIT conditioning path is enabled. The decoder's input arithmetic hardcodes
/// this width, so [`FeatureConvConfig::output_dim`] must match it.
pub const CIT_FEATURE_CHANNELS: usize = 256;

/// Group count of the 3×3 grouped convolutions (ResNeXt cardinality).
pub const CARDINALITY: usize = 16;

/// Optional sub-graph toggles. Fixed for the lifetime of a constructed model:
/// disabled branches are simply never built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetOpt {
    /// Batch normalization inside residual blocks and the feature adapter.
    pub bn: bool,
    /// ReLU between the layers of the tag-embedding MLP.
    pub relu: bool,
    /// Auxiliary feature-tensor conditioning path (CIT features).
    pub cit: bool,
    /// Auxiliary guide-image decoder head.
    pub guide: bool,
}

impl Default for NetOpt {
    fn default() -> Self {
        Self {
            bn: true,
            relu: true,
            cit: true,
            guide: true,
        }
    }
}

/// Generator construction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Input/output image side length. Must be a multiple of 16 (the encoder
    /// downsamples 16× to the bottleneck).
    pub input_size: usize,
    /// Number of color-variant tag classes (conditioning vector width).
    pub cv_class_num: usize,
    /// Number of illustration tag classes (unused by the forward pass but
    /// part of the training contract shared with the discriminator).
    pub iv_class_num: usize,
    /// Input channels: sketch + skeleton, concatenated.
    pub input_dim: usize,
    /// Output image channels.
    pub output_dim: usize,
    /// SE-Cat block counts for the four decoder stages. The dominant
    /// parameter-count driver.
    pub layers: Vec<usize>,
    pub net_opt: NetOpt,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            input_size: 256,
            cv_class_num: 115,
            iv_class_num: 370,
            input_dim: 2,
            output_dim: 3,
            layers: vec![12, 8, 5, 5],
            net_opt: NetOpt::default(),
        }
    }
}

impl GeneratorConfig {
    /// Bottleneck spatial side length (input_size / 16).
    pub fn bottom_h(&self) -> usize {
        self.input_size / 16
    }

    /// Channel count of the bottleneck concatenation fed to the first
    /// decoder stage: encoder output + optional CIT features + color hint.
    pub fn bottom_layer_len(&self) -> usize {
        let cit = if self.net_opt.cit {
            CIT_FEATURE_CHANNELS
        } else {
            0
        };
        256 + cit + COLOR_HINT_CHANNELS
    }

    /// Validate construction parameters.
    pub fn verify(&self) -> Result<()> {
        if self.input_size == 0 || self.input_size % 16 != 0 {
            return Err(Error::Config(format!(
                "input_size must be a non-zero multiple of 16, got {}",
                self.input_size
            )));
        }
        if self.layers.len() != 4 {
            return Err(Error::Config(format!(
                "layers must have 4 decoder stage counts, got {}",
                self.layers.len()
            )));
        }
        if self.layers.iter().any(|&n| n == 0) {
            return Err(Error::Config(
                "decoder stages need at least one block each".into(),
            ));
        }
        if self.cv_class_num == 0 {
            return Err(Error::Config("cv_class_num must be non-zero".into()));
        }
        Ok(())
    }
}

/// Feature-Conv adapter parameters. Defaults match the CIT feature tensor
/// (512 channels at 32×32) reprojected to the 16×16 generator bottleneck of
/// a 256-sized input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConvConfig {
    pub input_dim: usize,
    pub output_dim: usize,
    pub input_size: usize,
    pub output_size: usize,
}

impl Default for FeatureConvConfig {
    fn default() -> Self {
        Self {
            input_dim: 512,
            output_dim: 256,
            input_size: 32,
            output_size: 16,
        }
    }
}

impl FeatureConvConfig {
    /// Strides of the first two convolutions, derived from the spatial ratio
    /// so power-of-two downsampling factors compose from two layers.
    pub fn strides(&self) -> (usize, usize) {
        if self.input_size == self.output_size * 4 {
            (2, 2)
        } else if self.input_size == self.output_size * 2 {
            (2, 1)
        } else {
            (1, 1)
        }
    }
}

/// Discriminator construction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscriminatorConfig {
    /// Input image channels.
    pub input_dim: usize,
    /// Adversarial head width.
    pub output_dim: usize,
    pub input_size: usize,
    pub cv_class_num: usize,
    pub iv_class_num: usize,
    pub net_opt: NetOpt,
}

impl Default for DiscriminatorConfig {
    fn default() -> Self {
        Self {
            input_dim: 3,
            output_dim: 1,
            input_size: 256,
            cv_class_num: 115,
            iv_class_num: 370,
            net_opt: NetOpt::default(),
        }
    }
}

impl DiscriminatorConfig {
    /// Validate construction parameters.
    pub fn verify(&self) -> Result<()> {
        if self.cv_class_num == 0 || self.iv_class_num == 0 {
            return Err(Error::Config("tag class counts must be non-zero".into()));
        }
        if self.output_dim != 1 {
            return Err(Error::Config(format!(
                "adversarial head is scalar, output_dim must be 1, got {}",
                self.output_dim
            )));
        }
        Ok(())
    }
}
