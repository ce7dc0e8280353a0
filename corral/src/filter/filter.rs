use std::fmt::Display;
use std::ops::Deref;
use std::sync::Arc;

use itertools::Itertools;

use crate::model::ModelRef;

/// Trait for implementing custom filters.
///
/// A `FilterProvider` decides whether a model matches a condition. The
/// `Display` bound gives every filter a printable form for diagnostics.
pub trait FilterProvider: Send + Sync + Display {
    /// Applies the filter to a model and returns whether it matches.
    fn apply(&self, model: &ModelRef) -> bool;
}

/// A predicate over models, used to constrain collection membership.
///
/// `Filter` wraps a [`FilterProvider`] behind a cheap cloneable handle.
/// Filters compose with [`and`](Filter::and), [`or`](Filter::or) and
/// [`not`](Filter::not); see [`attr_eq`](crate::filter::attr_eq) and
/// [`by`](crate::filter::by) for the common constructors.
#[derive(Clone)]
pub struct Filter {
    inner: Arc<dyn FilterProvider>,
}

impl Filter {
    /// Creates a new filter from a filter provider implementation.
    pub fn new<T: FilterProvider + 'static>(inner: T) -> Self {
        Filter {
            inner: Arc::new(inner),
        }
    }

    /// Combines this filter with another using logical AND.
    pub fn and(&self, filter: Filter) -> Self {
        Filter::new(AndFilter::new(vec![self.clone(), filter]))
    }

    /// Combines this filter with another using logical OR.
    pub fn or(&self, filter: Filter) -> Self {
        Filter::new(OrFilter::new(vec![self.clone(), filter]))
    }

    /// Negates this filter using logical NOT.
    pub fn not(&self) -> Self {
        Filter::new(NotFilter::new(self.clone()))
    }
}

impl Display for Filter {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl Deref for Filter {
    type Target = Arc<dyn FilterProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Matches models satisfying all combined filters, first failure
/// short-circuits.
pub(crate) struct AndFilter {
    filters: Vec<Filter>,
}

impl AndFilter {
    pub(crate) fn new(filters: Vec<Filter>) -> Self {
        AndFilter { filters }
    }
}

impl Display for AndFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", self.filters.iter().join(" && "))
    }
}

impl FilterProvider for AndFilter {
    #[inline]
    fn apply(&self, model: &ModelRef) -> bool {
        self.filters.iter().all(|filter| filter.apply(model))
    }
}

/// Matches models satisfying at least one combined filter, first success
/// short-circuits.
pub(crate) struct OrFilter {
    filters: Vec<Filter>,
}

impl OrFilter {
    pub(crate) fn new(filters: Vec<Filter>) -> Self {
        OrFilter { filters }
    }
}

impl Display for OrFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", self.filters.iter().join(" || "))
    }
}

impl FilterProvider for OrFilter {
    #[inline]
    fn apply(&self, model: &ModelRef) -> bool {
        self.filters.iter().any(|filter| filter.apply(model))
    }
}

/// Matches models the wrapped filter rejects.
pub(crate) struct NotFilter {
    filter: Filter,
}

impl NotFilter {
    pub(crate) fn new(filter: Filter) -> Self {
        NotFilter { filter }
    }
}

impl Display for NotFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "!{}", self.filter)
    }
}

impl FilterProvider for NotFilter {
    #[inline]
    fn apply(&self, model: &ModelRef) -> bool {
        !self.filter.apply(model)
    }
}
