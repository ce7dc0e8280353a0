use std::fmt::{Debug, Formatter};

use crate::collection::{EntityRef, ObjectCollection, WeakObjectCollection};
use crate::common::{Emitter, OwnerTag, NO_LIMIT};
use crate::{atomic, Atomic, ReadExecutor, WriteExecutor};

struct LimitState {
    max: usize,
    fifo: bool,
}

/// Caps a collection's size, evicting members when it grows past the
/// limit.
///
/// Eviction order defaults to LIFO: the newest insertion goes first, so
/// at capacity an incoming entity is admitted and immediately evicted
/// again. [`set_fifo(true)`](CollectionLimit::set_fifo) flips to FIFO,
/// evicting the oldest member instead so newcomers displace the front.
/// [`NO_LIMIT`] disables enforcement. Dropping the handle detaches it.
pub struct CollectionLimit<T> {
    collection: WeakObjectCollection<T>,
    tag: OwnerTag,
    added: Emitter<EntityRef<T>>,
    state: Atomic<LimitState>,
}

fn enforce<T>(collection: &ObjectCollection<T>, state: &Atomic<LimitState>) {
    let (max, fifo) = state.read_with(|limits| (limits.max, limits.fifo));
    if max == NO_LIMIT {
        return;
    }
    while collection.size() > max {
        let index = if fifo { 0 } else { collection.size() - 1 };
        log::debug!("over limit of {}, evicting member at index {}", max, index);
        if collection.remove_by_index(index).is_none() {
            break;
        }
    }
}

impl<T: Send + Sync + 'static> CollectionLimit<T> {
    pub fn new(collection: &ObjectCollection<T>, max: usize) -> Self {
        Self::with_order(collection, max, false)
    }

    /// Like [`new`](CollectionLimit::new) with the eviction order chosen
    /// up front, so the initial enforcement already follows it.
    pub fn with_order(collection: &ObjectCollection<T>, max: usize, fifo: bool) -> Self {
        let state = atomic(LimitState { max, fifo });

        let tag = OwnerTag::next();
        let weak = collection.downgrade();
        let watched = state.clone();
        collection.added().subscribe(tag, move |_entity: EntityRef<T>| {
            if let Some(collection) = weak.upgrade() {
                enforce(&collection, &watched);
            }
            Ok(())
        });

        let limit = CollectionLimit {
            collection: collection.downgrade(),
            tag,
            added: collection.added().clone(),
            state,
        };
        enforce(collection, &limit.state);
        limit
    }
}

impl<T> CollectionLimit<T> {
    pub fn limit(&self) -> usize {
        self.state.read_with(|limits| limits.max)
    }

    pub fn is_fifo(&self) -> bool {
        self.state.read_with(|limits| limits.fifo)
    }

    /// Changes the cap and enforces it right away.
    pub fn set_limit(&self, max: usize) {
        self.state.write_with(|limits| limits.max = max);
        if let Some(collection) = self.collection.upgrade() {
            enforce(&collection, &self.state);
        }
    }

    /// Changes the eviction order. Takes effect on the next enforcement;
    /// the current membership is left alone.
    pub fn set_fifo(&self, fifo: bool) {
        self.state.write_with(|limits| limits.fifo = fifo);
    }

    /// Strictly over the cap. `false` when the limit is disabled.
    pub fn limit_exceeded(&self) -> bool {
        let max = self.limit();
        if max == NO_LIMIT {
            return false;
        }
        self.collection
            .upgrade()
            .map_or(false, |collection| collection.size() > max)
    }
}

impl<T> Drop for CollectionLimit<T> {
    fn drop(&mut self) {
        self.added.detach(self.tag);
    }
}

impl<T> Debug for CollectionLimit<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionLimit")
            .field("max", &self.limit())
            .field("fifo", &self.is_fifo())
            .finish()
    }
}
