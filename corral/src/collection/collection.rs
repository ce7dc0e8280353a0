use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

use crate::behavior::{CollectionLimit, CollectionSync, CollectionTransformer};
use crate::collection::ModelCollection;
use crate::filter::{attr_eq, CollectionFilter, Filter};
use crate::model::{Model, ModelRef};
use crate::{atomic, Atomic, ReadExecutor, WriteExecutor};

#[derive(Default)]
struct BehaviorState {
    limit: Option<CollectionLimit<Model>>,
    fifo: bool,
    filters: Vec<CollectionFilter>,
    syncs: Vec<CollectionSync<Model>>,
}

struct CollectionInner {
    models: ModelCollection,
    behaviors: Atomic<BehaviorState>,
}

/// A [`ModelCollection`] bundled with behavior conveniences.
///
/// The structural and model surface comes through `Deref`; on top of it
/// the facade owns its size limit, its active filters and its syncs, so
/// callers can say [`limit`](Collection::limit),
/// [`filter`](Collection::filter) or [`sync_from`](Collection::sync_from)
/// without keeping the behavior handles around themselves.
pub struct Collection {
    inner: Arc<CollectionInner>,
}

impl Clone for Collection {
    fn clone(&self) -> Self {
        Collection {
            inner: self.inner.clone(),
        }
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Collection {
    type Target = ModelCollection;

    fn deref(&self) -> &Self::Target {
        &self.inner.models
    }
}

impl Collection {
    pub fn new() -> Self {
        Collection {
            inner: Arc::new(CollectionInner {
                models: ModelCollection::new(),
                behaviors: atomic(BehaviorState::default()),
            }),
        }
    }

    /// Caps the size, evicting per the current fifo flag. Replaces any
    /// earlier limit; [`NO_LIMIT`](crate::common::NO_LIMIT) lifts it.
    pub fn limit(&self, max: usize) {
        let fifo = self.inner.behaviors.read_with(|behaviors| behaviors.fifo);
        // built outside the behavior lock: initial eviction runs callbacks
        let limit = CollectionLimit::with_order(self.base(), max, fifo);
        let previous = self
            .inner
            .behaviors
            .write_with(|behaviors| behaviors.limit.replace(limit));
        drop(previous);
    }

    /// Chooses the eviction order for the current and any later limit.
    pub fn set_fifo(&self, fifo: bool) {
        self.inner.behaviors.write_with(|behaviors| {
            behaviors.fifo = fifo;
            if let Some(limit) = &behaviors.limit {
                limit.set_fifo(fifo);
            }
        });
    }

    /// Keeps only members whose `attr` equals `value`, now and onward.
    pub fn filter(&self, attr: &str, value: &str) {
        self.filter_by(attr_eq(attr, value));
    }

    /// Keeps only members whose `attr` differs from `value`, now and
    /// onward.
    pub fn reject(&self, attr: &str, value: &str) {
        self.filter_by(attr_eq(attr, value).not());
    }

    /// Installs `filter` as an active membership constraint; active
    /// filters accumulate and AND together.
    pub fn filter_by(&self, filter: Filter) {
        let active = CollectionFilter::new(&self.inner.models, filter);
        self.inner
            .behaviors
            .write_with(|behaviors| behaviors.filters.push(active));
    }

    /// One-shot [`filter`](Collection::filter): sweeps current members
    /// only.
    pub fn filter_once(&self, attr: &str, value: &str) {
        CollectionFilter::sweep(&self.inner.models, &attr_eq(attr, value));
    }

    /// One-shot [`reject`](Collection::reject).
    pub fn reject_once(&self, attr: &str, value: &str) {
        CollectionFilter::sweep(&self.inner.models, &attr_eq(attr, value).not());
    }

    /// One-shot [`filter_by`](Collection::filter_by).
    pub fn filter_by_once(&self, filter: &Filter) {
        CollectionFilter::sweep(&self.inner.models, filter);
    }

    /// Mirrors `source` into this collection, now and onward.
    pub fn sync_from(&self, source: &Collection) {
        let sync = CollectionSync::new(self.base(), source.base());
        self.inner
            .behaviors
            .write_with(|behaviors| behaviors.syncs.push(sync));
    }

    /// Copies the members of `source` this collection lacks, without
    /// following later changes.
    pub fn sync_once(&self, source: &Collection) {
        let _ = CollectionSync::new(self.base(), source.base());
    }

    /// Ends an active [`sync_from`](Collection::sync_from); mirrored
    /// members stay. Unknown sources are a warn.
    pub fn stop_sync(&self, source: &Collection) {
        let stopped = self.inner.behaviors.write_with(|behaviors| {
            let before = behaviors.syncs.len();
            behaviors
                .syncs
                .retain(|sync| !sync.is_from(source.base()));
            behaviors.syncs.len() != before
        });
        if !stopped {
            log::warn!("no active sync from collection '{}'", source.name());
        }
    }

    /// Derives `target` from this collection through `map`. The caller
    /// keeps the transformer; dropping it ends the following.
    pub fn transform_into(
        &self,
        target: &Collection,
        map: impl Fn(&ModelRef) -> ModelRef + Send + Sync + 'static,
    ) -> CollectionTransformer<Model, Model> {
        CollectionTransformer::new(self.base(), target.base(), map)
    }
}

impl Debug for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name())
            .field("size", &self.size())
            .finish()
    }
}
