//! Network components for Tag2Pix.
//!
//! ## Components
//!
//! - [`secat`] — SE-Cat residual blocks (category-conditioned channel attention)
//! - [`generator`] — encoder/decoder colorization network
//! - [`discriminator`] — multi-head realism + tag-consistency scorer
//! - [`layers`] — shared layer constructors (with initializers) and tensor helpers

pub mod discriminator;
pub mod generator;
pub mod layers;
pub mod secat;
