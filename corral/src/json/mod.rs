//! JSON ingestion. The rest of the crate holds attributes as plain
//! strings; this module is the one place JSON is parsed, canonicalized
//! and diffed into collections.

mod loader;
mod registry_loader;
mod value;

pub use loader::*;
pub use registry_loader::*;
pub use value::*;
