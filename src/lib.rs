//! Tag2Pix colorization networks in pure Rust.
//!
//! A candle-based implementation of the Tag2Pix generative-adversarial
//! line-art colorization model: an encoder-decoder generator conditioned on
//! categorical color tags and an auxiliary feature tensor, and a multi-head
//! discriminator that jointly scores realism and tag consistency.
//!
//! ## Architecture
//!
//! ```text
//! sketch ⧺ skeleton ─→ encoder (5 stages) ──────────────┐ skip connections
//!                                     │                 │
//! color tags ─┬→ spatial hint map ────┤                 │
//!             └→ 64-dim cond vector ──┼──→ SE-Cat decoder (4 stages,
//! CIT features ─→ FeatureConv ────────┘     pixel-shuffle upsampling)
//!                                                │
//!                                     image + guide image  [B, 3, S, S]
//!
//! image ─→ discriminator (8 conv stages → pooled 512-dim vector)
//!            ─→ realism score, illustration-tag scores, color-tag scores
//! ```
//!
//! ## Modules
//!
//! - [`config`] — `NetOpt` sub-graph toggles, network construction parameters
//! - [`model`] — SE-Cat blocks, generator, discriminator
//!
//! All parameters are created through `candle_nn::VarBuilder`, so models can
//! start from the documented initializers (via a `VarMap`) or from converted
//! safetensors weights. Forward passes never mutate parameters; training
//! belongs to an external loop.

pub mod config;
pub mod model;

mod error;

pub use error::{Error, Result};
