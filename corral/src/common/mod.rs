//! Shared building blocks: the event emitter, admission gates, constants
//! and lock-guarded state helpers used across the crate.

mod admission;
mod constants;
mod emitter;
pub mod util;

pub use admission::*;
pub use constants::*;
pub use emitter::*;
pub use util::*;
