use std::fmt::{Debug, Formatter};

use crate::collection::{EntityRef, ObjectCollection, WeakObjectCollection};
use crate::common::{Emitter, OwnerTag};

/// One-way live mirror from a source collection into a target.
///
/// Construction copies every source member the target lacks, then keeps
/// following: source additions are offered to the target (its admission
/// gates still apply) and source removals remove the shared entity from
/// the target when present. Mirroring several sources into one target
/// yields their union.
///
/// [`stop`](CollectionSync::stop) or drop ends the mirroring; entities
/// already copied stay in the target. The target never writes back to
/// the source.
pub struct CollectionSync<T> {
    source: WeakObjectCollection<T>,
    tag: OwnerTag,
    source_added: Emitter<EntityRef<T>>,
    source_removed: Emitter<EntityRef<T>>,
}

impl<T: Send + Sync + 'static> CollectionSync<T> {
    pub fn new(target: &ObjectCollection<T>, source: &ObjectCollection<T>) -> Self {
        for member in source.members() {
            if !target.has(&member) {
                target.add(member.clone());
            }
        }

        let tag = OwnerTag::next();
        let weak_target = target.downgrade();
        source.added().subscribe(tag, move |entity: EntityRef<T>| {
            if let Some(target) = weak_target.upgrade() {
                if !target.has(&entity) {
                    target.add(entity);
                }
            }
            Ok(())
        });

        let weak_target = target.downgrade();
        source.removed().subscribe(tag, move |entity: EntityRef<T>| {
            if let Some(target) = weak_target.upgrade() {
                if target.has(&entity) {
                    target.remove(&entity);
                }
            }
            Ok(())
        });

        CollectionSync {
            source: source.downgrade(),
            tag,
            source_added: source.added().clone(),
            source_removed: source.removed().clone(),
        }
    }
}

impl<T> CollectionSync<T> {
    /// Stops mirroring. Idempotent; already-copied members stay.
    pub fn stop(&self) {
        self.source_added.detach(self.tag);
        self.source_removed.detach(self.tag);
    }

    /// Whether this sync mirrors from the given collection.
    pub fn is_from(&self, collection: &ObjectCollection<T>) -> bool {
        self.source.ptr_eq(&collection.downgrade())
    }
}

impl<T> Drop for CollectionSync<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<T> Debug for CollectionSync<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionSync")
            .field("source_alive", &self.source.upgrade().is_some())
            .finish()
    }
}
