use std::fmt::{Debug, Formatter};

use crate::collection::ModelCollection;
use crate::common::{AdmissionChain, Emitter, OwnerTag};
use crate::filter::{Filter, FilterProvider};
use crate::model::{Model, ModelOps, ModelRef};

/// Keeps a collection's membership inside a [`Filter`] for as long as it
/// lives.
///
/// On construction it sweeps out every current member the filter rejects,
/// then registers the filter as an admission gate and watches
/// `model_changed` so a member drifting outside the filter is removed.
/// Drifted-out members are never re-added on their own, even if a later
/// change would satisfy the filter again. Several active filters on one
/// collection AND together.
///
/// Dropping the handle detaches the gate and the watch; the surviving
/// members stay.
pub struct CollectionFilter {
    tag: OwnerTag,
    filter: Filter,
    before_add: AdmissionChain<Model>,
    model_changed: Emitter<ModelRef>,
}

impl CollectionFilter {
    pub fn new(collection: &ModelCollection, filter: Filter) -> Self {
        Self::sweep(collection, &filter);

        let tag = OwnerTag::next();
        let gate = filter.clone();
        collection
            .before_add()
            .add_gate(tag, move |candidate: &ModelRef| gate.apply(candidate));

        let watched = filter.clone();
        let weak = collection.downgrade();
        collection.model_changed().subscribe(tag, move |model: ModelRef| {
            if watched.apply(&model) {
                return Ok(());
            }
            if let Some(collection) = weak.upgrade() {
                if collection.has(&model) {
                    log::debug!("member {} drifted outside {}, removing", model.cid(), watched);
                    collection.remove(&model);
                }
            }
            Ok(())
        });

        CollectionFilter {
            tag,
            filter,
            before_add: collection.before_add().clone(),
            model_changed: collection.model_changed().clone(),
        }
    }

    /// One-shot form: removes current members rejected by `filter` and
    /// leaves no gate or watch behind.
    pub fn sweep(collection: &ModelCollection, filter: &Filter) {
        let rejected: Vec<ModelRef> = collection
            .members()
            .iter()
            .filter(|member| !filter.apply(member))
            .cloned()
            .collect();
        if !rejected.is_empty() {
            log::debug!("{} swept {} member(s)", filter, rejected.len());
        }
        for model in rejected {
            collection.remove(&model);
        }
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }
}

impl Drop for CollectionFilter {
    fn drop(&mut self) {
        self.before_add.detach(self.tag);
        self.model_changed.detach(self.tag);
    }
}

impl Debug for CollectionFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionFilter")
            .field("filter", &self.filter.to_string())
            .finish()
    }
}
