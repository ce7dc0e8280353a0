use std::fmt::Display;

use crate::filter::{Filter, FilterProvider};
use crate::model::ModelRef;

/// Matches models whose attribute equals a value. A missing attribute
/// reads as the empty string, same as [`Model::get`](crate::model::Model::get).
pub(crate) struct AttributeEqualsFilter {
    attr: String,
    value: String,
}

impl AttributeEqualsFilter {
    pub(crate) fn new(attr: String, value: String) -> Self {
        AttributeEqualsFilter { attr, value }
    }
}

impl Display for AttributeEqualsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} == {})", self.attr, self.value)
    }
}

impl FilterProvider for AttributeEqualsFilter {
    #[inline]
    fn apply(&self, model: &ModelRef) -> bool {
        model.get(&self.attr) == self.value
    }
}

/// Matches models accepted by an arbitrary predicate.
pub(crate) struct PredicateFilter {
    predicate: Box<dyn Fn(&ModelRef) -> bool + Send + Sync>,
}

impl PredicateFilter {
    pub(crate) fn new(predicate: Box<dyn Fn(&ModelRef) -> bool + Send + Sync>) -> Self {
        PredicateFilter { predicate }
    }
}

impl Display for PredicateFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(predicate)")
    }
}

impl FilterProvider for PredicateFilter {
    #[inline]
    fn apply(&self, model: &ModelRef) -> bool {
        (self.predicate)(model)
    }
}

/// Creates a filter matching models whose `attr` equals `value`.
pub fn attr_eq(attr: impl Into<String>, value: impl Into<String>) -> Filter {
    Filter::new(AttributeEqualsFilter::new(attr.into(), value.into()))
}

/// Creates a filter from an arbitrary predicate over models.
pub fn by(predicate: impl Fn(&ModelRef) -> bool + Send + Sync + 'static) -> Filter {
    Filter::new(PredicateFilter::new(Box::new(predicate)))
}
