//! Collections of reference-counted entities.
//!
//! [`ObjectCollection`] is the reentrancy-safe structural core,
//! [`ModelCollection`] layers model-event wiring and id lookups on top,
//! and [`Collection`] is the everyday facade with behavior conveniences.
//! A [`Registry`] hands out collections by name.

mod cid;
mod collection;
mod model_collection;
mod object_collection;
mod registry;

pub use cid::*;
pub use collection::*;
pub use model_collection::*;
pub use object_collection::*;
pub use registry::*;
