//! Tag2Pix network inspection CLI.
//!
//! Builds the generator and discriminator from the given options, optionally
//! loads safetensors weights, runs one forward pass on random inputs, and
//! prints a one-line JSON summary to stdout:
//!
//! ```json
//! {"image_shape":[1,3,256,256],"adv":0.49,"elapsed_ms":1234}
//! ```
//!
//! Exit code 0 on success, non-zero on error. Useful as a shape smoke test
//! for configuration variants and as a weight-loading check.

use candle_core::{DType, Tensor};
use candle_nn::{VarBuilder, VarMap};
use clap::Parser;

use tag2pix_rs::config::{DiscriminatorConfig, GeneratorConfig, NetOpt};
use tag2pix_rs::model::discriminator::Discriminator;
use tag2pix_rs::model::generator::Generator;

#[derive(Parser, Debug)]
#[command(
    name = "tag2pix",
    about = "Tag2Pix colorization networks — construction and forward-pass smoke test"
)]
struct Args {
    /// Input/output image side length (multiple of 16).
    #[arg(long, default_value_t = 256)]
    input_size: usize,

    /// Number of color-variant tag classes.
    #[arg(long, default_value_t = 115)]
    cv_class_num: usize,

    /// Number of illustration tag classes.
    #[arg(long, default_value_t = 370)]
    iv_class_num: usize,

    /// Batch size for the forward pass.
    #[arg(long, short = 'b', default_value_t = 1)]
    batch: usize,

    /// Disable batch normalization.
    #[arg(long)]
    no_bn: bool,

    /// Drop the ReLU activations in the tag-embedding MLP.
    #[arg(long)]
    no_relu: bool,

    /// Enable the CIT feature-conditioning path.
    #[arg(long)]
    cit: bool,

    /// Enable the guide decoder head.
    #[arg(long)]
    guide: bool,

    /// Safetensors checkpoint to load weights from (random init otherwise).
    #[arg(long, short = 'w')]
    weights: Option<std::path::PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let device = candle_core::Device::cuda_if_available(0)?;
    let dtype = DType::F32;
    tracing::info!("Using device: {:?}", device);

    let net_opt = NetOpt {
        bn: !args.no_bn,
        relu: !args.no_relu,
        cit: args.cit,
        guide: args.guide,
    };
    let gen_cfg = GeneratorConfig {
        input_size: args.input_size,
        cv_class_num: args.cv_class_num,
        iv_class_num: args.iv_class_num,
        net_opt,
        ..GeneratorConfig::default()
    };
    let disc_cfg = DiscriminatorConfig {
        input_size: args.input_size,
        cv_class_num: args.cv_class_num,
        iv_class_num: args.iv_class_num,
        net_opt,
        ..DiscriminatorConfig::default()
    };

    let varmap = VarMap::new();
    let vb = match &args.weights {
        Some(path) => {
            tracing::info!("Loading weights from {}", path.display());
            unsafe { VarBuilder::from_mmaped_safetensors(&[path], dtype, &device)? }
        }
        None => VarBuilder::from_varmap(&varmap, dtype, &device),
    };

    let start = std::time::Instant::now();
    let generator = Generator::new(&gen_cfg, vb.pp("generator"))
        .map_err(|e| anyhow::anyhow!("failed to build generator: {e}"))?;
    let discriminator = Discriminator::new(&disc_cfg, vb.pp("discriminator"))
        .map_err(|e| anyhow::anyhow!("failed to build discriminator: {e}"))?;
    tracing::info!("Built both networks in {:.1?}", start.elapsed());

    let b = args.batch;
    let s = args.input_size;
    let sketch = Tensor::randn(0.0_f32, 1.0, (b, 1, s, s), &device)?;
    let skeleton = Tensor::randn(0.0_f32, 1.0, (b, 1, s, s), &device)?;
    let features = if args.cit {
        Some(Tensor::randn(0.0_f32, 1.0, (b, 512, 32, 32), &device)?)
    } else {
        None
    };
    let mut tags = vec![0.0_f32; b * args.cv_class_num];
    for i in 0..b {
        tags[i * args.cv_class_num] = 1.0;
    }
    let tags = Tensor::from_vec(tags, (b, args.cv_class_num), &device)?;

    let start = std::time::Instant::now();
    let (image, guide_image) = generator
        .forward(&sketch, &skeleton, features.as_ref(), &tags)
        .map_err(|e| anyhow::anyhow!("generator forward failed: {e}"))?;
    let gen_ms = start.elapsed().as_millis();

    let start = std::time::Instant::now();
    let (adv, iv, cv) = discriminator
        .forward(&image)
        .map_err(|e| anyhow::anyhow!("discriminator forward failed: {e}"))?;
    let disc_ms = start.elapsed().as_millis();

    let adv_mean: f32 = adv.mean_all()?.to_scalar()?;
    let summary = serde_json::json!({
        "image_shape": image.dims(),
        "guide_shape": guide_image.dims(),
        "adv_shape": adv.dims(),
        "iv_shape": iv.dims(),
        "cv_shape": cv.dims(),
        "adv_mean": adv_mean,
        "generator_ms": gen_ms,
        "discriminator_ms": disc_ms,
    });
    println!("{summary}");

    Ok(())
}
