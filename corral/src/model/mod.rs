//! The string-attribute [`Model`], its change events and live attribute
//! transformers.
//!
//! Models are handed around as [`ModelRef`] (`Arc<Model>`). Reads live on
//! the struct; writes and identity live on the [`ModelOps`] extension
//! trait, transformer registration on [`ModelTaps`], both implemented for
//! `ModelRef`.

mod model;
mod transformer;

pub use model::*;
pub use transformer::*;
