use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

use crate::collection::ObjectCollection;
use crate::common::{Emitter, OwnerTag, ID_ATTRIBUTE};
use crate::errors::CorralResult;
use crate::model::{AttributeChange, AttributePairs, Model, ModelOps, ModelRef};

struct ModelCollectionInner {
    base: ObjectCollection<Model>,
    // tag under which this collection subscribes on its members
    tag: OwnerTag,
    model_changed: Emitter<ModelRef>,
    attribute_changed: Emitter<AttributeChange>,
    initialized: Emitter<usize>,
}

impl Drop for ModelCollectionInner {
    fn drop(&mut self) {
        // members outlive the collection; leave no listeners behind on them
        for member in self.base.members() {
            member.changed().detach(self.tag);
            member.attribute_changed().detach(self.tag);
        }
    }
}

/// An [`ObjectCollection`] of models that re-emits member changes with
/// collection scope and adds id-based lookups.
///
/// Joining members are wired: their `changed`/`attribute_changed` events
/// are forwarded as the collection's [`model_changed`](ModelCollection::model_changed)
/// and [`attribute_changed`](ModelCollection::attribute_changed). Leaving
/// members are unwired, including on silent removals and on drop of the
/// collection itself. Because wiring happens at join time, collection
/// listeners observe a change before any listener attached to the member
/// afterwards.
///
/// Derefs to the underlying `ObjectCollection<Model>` for the structural
/// surface (`add`, `remove`, `each`, ...).
pub struct ModelCollection {
    inner: Arc<ModelCollectionInner>,
}

impl Clone for ModelCollection {
    fn clone(&self) -> Self {
        ModelCollection {
            inner: self.inner.clone(),
        }
    }
}

impl Default for ModelCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for ModelCollection {
    type Target = ObjectCollection<Model>;

    fn deref(&self) -> &Self::Target {
        &self.inner.base
    }
}

impl ModelCollection {
    pub fn new() -> Self {
        let inner = Arc::new(ModelCollectionInner {
            base: ObjectCollection::new(),
            tag: OwnerTag::next(),
            model_changed: Emitter::new(),
            attribute_changed: Emitter::new(),
            initialized: Emitter::new(),
        });

        let weak = Arc::downgrade(&inner);
        inner.base.set_attach_hook(Arc::new(move |member: &ModelRef| {
            if let Some(inner) = weak.upgrade() {
                let forward = inner.model_changed.clone();
                member.changed().subscribe(inner.tag, move |model: ModelRef| {
                    forward.emit(model);
                    Ok(())
                });
                let forward = inner.attribute_changed.clone();
                member
                    .attribute_changed()
                    .subscribe(inner.tag, move |change: AttributeChange| {
                        forward.emit(change);
                        Ok(())
                    });
            }
        }));

        let weak = Arc::downgrade(&inner);
        inner.base.set_detach_hook(Arc::new(move |member: &ModelRef| {
            if let Some(inner) = weak.upgrade() {
                member.changed().detach(inner.tag);
                member.attribute_changed().detach(inner.tag);
            }
        }));

        ModelCollection { inner }
    }

    /// Forwarded `changed` of any member.
    pub fn model_changed(&self) -> &Emitter<ModelRef> {
        &self.inner.model_changed
    }

    /// Forwarded `attribute_changed` of any member.
    pub fn attribute_changed(&self) -> &Emitter<AttributeChange> {
        &self.inner.attribute_changed
    }

    /// Fired by [`initialize`](ModelCollection::initialize) with the new
    /// member count.
    pub fn initialized(&self) -> &Emitter<usize> {
        &self.inner.initialized
    }

    /// First member whose [`id`](ModelOps::id) equals `id`.
    pub fn find_by_id(&self, id: &str) -> Option<ModelRef> {
        self.inner
            .base
            .members()
            .iter()
            .find(|member| member.id() == id)
            .cloned()
    }

    /// [`find_by_id`](ModelCollection::find_by_id), creating a member with
    /// that `id` attribute on a miss.
    pub fn find_or_create(&self, id: &str) -> ModelRef {
        if let Some(found) = self.find_by_id(id) {
            return found;
        }
        let model = self.inner.base.create();
        model.set(ID_ATTRIBUTE, id);
        model
    }

    /// First member whose `attr` equals `value`.
    pub fn find_by_attr(&self, attr: &str, value: &str) -> Option<ModelRef> {
        self.inner
            .base
            .members()
            .iter()
            .find(|member| member.get(attr) == value)
            .cloned()
    }

    /// Members for the given ids, in id order; missing ids are skipped.
    pub fn find_by_ids(&self, ids: &[&str]) -> Vec<ModelRef> {
        ids.iter().filter_map(|id| self.find_by_id(id)).collect()
    }

    /// Replaces the membership with one model per row.
    ///
    /// Destroys the current members first (the locked-collection refusal
    /// propagates), applies each row silently before the model joins, and
    /// fires `initialized` with the new size.
    pub fn initialize(&self, rows: &[AttributePairs]) -> CorralResult<()> {
        self.inner.base.destroy()?;
        for row in rows {
            let model = Model::new_ref();
            model.set_many_with(row, false);
            self.inner.base.add(model);
        }
        let size = self.inner.base.size();
        log::debug!("initialized collection with {} model(s)", size);
        self.inner.initialized.emit(size);
        Ok(())
    }

    pub(crate) fn base(&self) -> &ObjectCollection<Model> {
        &self.inner.base
    }
}

impl Debug for ModelCollection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCollection")
            .field("name", &self.name())
            .field("size", &self.size())
            .finish()
    }
}
