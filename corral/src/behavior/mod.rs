//! Composable collection behaviors: size limiting, one-way mirroring
//! and source-to-target transformation.
//!
//! A behavior is a handle subscribed onto a collection's emitters; it
//! holds the collection weakly and detaches itself on drop.

mod limit;
mod sync;
mod transform;

pub use limit::*;
pub use sync::*;
pub use transform::*;
