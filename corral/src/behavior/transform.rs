use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::collection::{Cid, EntityRef, ObjectCollection, WeakObjectCollection};
use crate::common::{Emitter, OwnerTag};
use crate::{atomic, Atomic, ReadExecutor, WriteExecutor};

/// Derives a target collection from a source, one mapped entity per
/// source entity.
///
/// Every current and future source member is run through the map
/// function and the result offered to the target; a link table ties each
/// source [`Cid`] to its generated counterpart so source removals take
/// the counterpart out again. A link with no surviving target entity, or
/// a removal with no link, is ignored.
///
/// [`stop`](CollectionTransformer::stop) or drop ends the following;
/// generated entities stay in the target.
pub struct CollectionTransformer<S, T> {
    target: WeakObjectCollection<T>,
    links: Atomic<HashMap<Cid, Cid>>,
    tag: OwnerTag,
    source_added: Emitter<EntityRef<S>>,
    source_removed: Emitter<EntityRef<S>>,
}

fn transform_one<S, T>(
    target: &ObjectCollection<T>,
    links: &Atomic<HashMap<Cid, Cid>>,
    map: &(dyn Fn(&EntityRef<S>) -> EntityRef<T> + Send + Sync),
    entity: &EntityRef<S>,
) {
    let mapped = map(entity);
    links.write_with(|links| links.insert(Cid::of(entity), Cid::of(&mapped)));
    target.add(mapped);
}

impl<S: Send + Sync + 'static, T: Send + Sync + 'static> CollectionTransformer<S, T> {
    pub fn new(
        source: &ObjectCollection<S>,
        target: &ObjectCollection<T>,
        map: impl Fn(&EntityRef<S>) -> EntityRef<T> + Send + Sync + 'static,
    ) -> Self {
        let links: Atomic<HashMap<Cid, Cid>> = atomic(HashMap::new());
        let map = Arc::new(map);

        for member in source.members() {
            transform_one(target, &links, map.as_ref(), &member);
        }

        let tag = OwnerTag::next();
        let weak_target = target.downgrade();
        let link_table = links.clone();
        let mapper = map.clone();
        source.added().subscribe(tag, move |entity: EntityRef<S>| {
            if let Some(target) = weak_target.upgrade() {
                transform_one(&target, &link_table, mapper.as_ref(), &entity);
            }
            Ok(())
        });

        let weak_target = target.downgrade();
        let link_table = links.clone();
        source.removed().subscribe(tag, move |entity: EntityRef<S>| {
            let linked = link_table.write_with(|links| links.remove(&Cid::of(&entity)));
            let cid = match linked {
                Some(cid) => cid,
                None => {
                    log::debug!("no link for removed source entity, ignoring");
                    return Ok(());
                }
            };
            if let Some(target) = weak_target.upgrade() {
                if target.has_cid(cid) {
                    target.remove_by_cid(cid);
                } else {
                    log::debug!("linked entity {} already gone from target", cid);
                }
            }
            Ok(())
        });

        CollectionTransformer {
            target: target.downgrade(),
            links,
            tag,
            source_added: source.added().clone(),
            source_removed: source.removed().clone(),
        }
    }
}

impl<S, T> CollectionTransformer<S, T> {
    /// Stops following the source. Idempotent; generated entities stay.
    pub fn stop(&self) {
        self.source_added.detach(self.tag);
        self.source_removed.detach(self.tag);
    }

    pub fn link_count(&self) -> usize {
        self.links.read_with(|links| links.len())
    }
}

impl<S, T> Drop for CollectionTransformer<S, T> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<S, T> Debug for CollectionTransformer<S, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionTransformer")
            .field("links", &self.link_count())
            .field("target_alive", &self.target.upgrade().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(values: impl IntoIterator<Item = u32>) -> ObjectCollection<u32> {
        let col = ObjectCollection::new();
        for value in values {
            col.add(Arc::new(value));
        }
        col
    }

    fn doubled(entity: &Arc<u32>) -> Arc<String> {
        Arc::new(format!("#{}", **entity * 2))
    }

    #[test]
    fn test_existing_members_are_transformed() {
        let source = filled([1, 2, 3]);
        let target: ObjectCollection<String> = ObjectCollection::new();

        let transformer = CollectionTransformer::new(&source, &target, doubled);
        assert_eq!(target.size(), 3);
        assert_eq!(transformer.link_count(), 3);
        assert_eq!(*target.at(0).unwrap(), "#2");
    }

    #[test]
    fn test_future_members_are_transformed() {
        let source = ObjectCollection::new();
        let target: ObjectCollection<String> = ObjectCollection::new();
        let _transformer = CollectionTransformer::new(&source, &target, doubled);

        source.add(Arc::new(10));
        assert_eq!(target.size(), 1);
        assert_eq!(*target.at(0).unwrap(), "#20");
    }

    #[test]
    fn test_source_removal_removes_the_linked_entity() {
        let source = filled([1, 2]);
        let target: ObjectCollection<String> = ObjectCollection::new();
        let transformer = CollectionTransformer::new(&source, &target, doubled);

        let first = source.at(0).unwrap();
        source.remove(&first);
        assert_eq!(target.size(), 1);
        assert_eq!(*target.at(0).unwrap(), "#4");
        assert_eq!(transformer.link_count(), 1);
    }

    #[test]
    fn test_directly_removed_target_entity_is_tolerated() {
        let source = filled([1]);
        let target: ObjectCollection<String> = ObjectCollection::new();
        let _transformer = CollectionTransformer::new(&source, &target, doubled);

        let generated = target.at(0).unwrap();
        target.remove(&generated);

        // stale link, the mirrored removal finds nothing and moves on
        source.remove(&source.at(0).unwrap());
        assert_eq!(target.size(), 0);
        assert_eq!(source.size(), 0);
    }

    #[test]
    fn test_unlinked_source_removal_is_tolerated() {
        let source = filled([1]);
        let target: ObjectCollection<String> = ObjectCollection::new();
        let _transformer = CollectionTransformer::new(&source, &target, doubled);

        // a silent add never reached the transformer, so no link exists
        let unlinked = Arc::new(5u32);
        source.add_with(unlinked.clone(), false);
        source.remove(&unlinked);
        assert_eq!(target.size(), 1);
    }

    #[test]
    fn test_stop_keeps_generated_entities() {
        let source = filled([1, 2]);
        let target: ObjectCollection<String> = ObjectCollection::new();
        let transformer = CollectionTransformer::new(&source, &target, doubled);

        transformer.stop();
        source.add(Arc::new(3));
        source.remove(&source.at(0).unwrap());
        assert_eq!(target.size(), 2);
        assert_eq!(source.added().listener_count(), 0);
        assert_eq!(source.removed().listener_count(), 0);
    }
}
