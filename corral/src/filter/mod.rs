//! Membership predicates and the active filtering behavior.
//!
//! A [`Filter`] decides whether a model belongs; [`CollectionFilter`]
//! enforces one on a collection for its lifetime.

mod attribute_filters;
mod collection_filter;
mod filter;

pub use attribute_filters::*;
pub use collection_filter::*;
pub use filter::*;
