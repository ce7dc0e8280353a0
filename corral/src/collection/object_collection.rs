use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Weak};

use rand::Rng;
use smallvec::SmallVec;

use crate::collection::Cid;
use crate::common::{AdmissionChain, Emitter};
use crate::errors::{CorralError, CorralResult, ErrorKind};
use crate::{atomic, Atomic, ReadExecutor, WriteExecutor};

/// Shared handle to an entity held by collections and callers alike.
///
/// A collection never owns an entity exclusively: the entity lives as long
/// as its longest holder.
pub type EntityRef<T> = Arc<T>;

/// Hook invoked on every structural insert/remove, regardless of whether
/// the corresponding event is notified. The model layer uses it to wire and
/// unwire per-member listeners.
pub(crate) type MemberHook<T> = Arc<dyn Fn(&EntityRef<T>) + Send + Sync>;

// Structural mutation requested while the collection was locked, replayed
// verbatim when the outermost iteration unlocks.
enum PendingOp<T> {
    Add { entity: EntityRef<T>, notify: bool },
    Remove { cid: Cid, notify: bool },
    RemoveIndex { index: usize, notify: bool },
}

struct CollectionState<T> {
    entries: im::Vector<EntityRef<T>>,
    // > 0 while an iteration (possibly nested) is in flight
    lock_depth: usize,
    pending: SmallVec<[PendingOp<T>; 4]>,
    name: String,
}

enum AddDecision {
    Queued,
    Duplicate,
    Admissible,
}

enum CommitOutcome {
    Queued,
    Duplicate,
    Inserted,
}

enum TakeOutcome<T> {
    Queued,
    Missing,
    Taken(EntityRef<T>),
}

struct ObjectCollectionInner<T> {
    state: Atomic<CollectionState<T>>,
    added: Emitter<EntityRef<T>>,
    removed: Emitter<EntityRef<T>>,
    before_add: AdmissionChain<T>,
    attach_hook: Atomic<Option<MemberHook<T>>>,
    detach_hook: Atomic<Option<MemberHook<T>>>,
}

/// Insertion-ordered collection of shared entities with identity-based
/// membership and mutation-safe iteration.
///
/// The collection is a cheap handle (PIMPL); clones share state. Structural
/// mutation is only performed while the collection is unlocked: while an
/// [`each`](ObjectCollection::each) iteration is running, add/remove
/// requests are queued and replayed in request order, each exactly once,
/// when the outermost iteration completes. Internal guards are never held
/// while listener callbacks run, so callbacks are free to call back into
/// the collection.
///
/// # Examples
///
/// ```rust,ignore
/// use corral::collection::ObjectCollection;
///
/// let collection: ObjectCollection<MyEntity> = ObjectCollection::new();
/// let entity = collection.create();
/// collection.each(|member| {
///     // removing during iteration is queued, not applied mid-flight
///     collection.remove(member);
/// });
/// assert!(collection.is_empty());
/// ```
pub struct ObjectCollection<T> {
    inner: Arc<ObjectCollectionInner<T>>,
}

impl<T> Clone for ObjectCollection<T> {
    fn clone(&self) -> Self {
        ObjectCollection {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for ObjectCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-owning handle to an [`ObjectCollection`].
///
/// Behaviors subscribe closures onto the collection's own emitters; those
/// closures hold a `WeakObjectCollection` back to the collection so that the
/// subscription never keeps its collection alive.
pub struct WeakObjectCollection<T> {
    inner: Weak<ObjectCollectionInner<T>>,
}

impl<T> Clone for WeakObjectCollection<T> {
    fn clone(&self) -> Self {
        WeakObjectCollection {
            inner: self.inner.clone(),
        }
    }
}

impl<T> WeakObjectCollection<T> {
    pub fn upgrade(&self) -> Option<ObjectCollection<T>> {
        self.inner.upgrade().map(|inner| ObjectCollection { inner })
    }

    /// Whether both handles point at the same collection.
    pub fn ptr_eq(&self, other: &WeakObjectCollection<T>) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> ObjectCollection<T> {
    pub fn new() -> Self {
        ObjectCollection {
            inner: Arc::new(ObjectCollectionInner {
                state: atomic(CollectionState {
                    entries: im::Vector::new(),
                    lock_depth: 0,
                    pending: SmallVec::new(),
                    name: String::new(),
                }),
                added: Emitter::new(),
                removed: Emitter::new(),
                before_add: AdmissionChain::new(),
                attach_hook: atomic(None),
                detach_hook: atomic(None),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakObjectCollection<T> {
        WeakObjectCollection {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Fired after an entity joined, unless the add was performed silently.
    pub fn added(&self) -> &Emitter<EntityRef<T>> {
        &self.inner.added
    }

    /// Fired after an entity left, unless the removal was performed silently.
    pub fn removed(&self) -> &Emitter<EntityRef<T>> {
        &self.inner.removed
    }

    /// Admission gates consulted before an entity joins.
    pub fn before_add(&self) -> &AdmissionChain<T> {
        &self.inner.before_add
    }

    /// Diagnostic label; the registry names its collections on creation.
    pub fn name(&self) -> String {
        self.inner.state.read_with(|state| state.name.clone())
    }

    pub fn set_name(&self, name: &str) {
        self.inner
            .state
            .write_with(|state| state.name = name.to_string());
    }

    pub(crate) fn set_attach_hook(&self, hook: MemberHook<T>) {
        self.inner.attach_hook.write_with(|slot| *slot = Some(hook));
    }

    pub(crate) fn set_detach_hook(&self, hook: MemberHook<T>) {
        self.inner.detach_hook.write_with(|slot| *slot = Some(hook));
    }

    pub fn size(&self) -> usize {
        self.inner.state.read_with(|state| state.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// `true` while an iteration is in flight; structural mutations
    /// requested now will be queued.
    pub fn is_locked(&self) -> bool {
        self.inner.state.read_with(|state| state.lock_depth > 0)
    }

    /// Adds `entity`, firing `added` on success.
    ///
    /// Returns `false` when the entity is already a member or an admission
    /// gate vetoes it. While the collection is locked the request is queued
    /// (admission is re-checked when it drains) and `true` is returned.
    pub fn add(&self, entity: EntityRef<T>) -> bool {
        self.add_with(entity, true)
    }

    /// [`add`](ObjectCollection::add) with control over the `added` event.
    /// A silent add still runs admission and the member hooks.
    pub fn add_with(&self, entity: EntityRef<T>, notify: bool) -> bool {
        let cid = Cid::of(&entity);
        let decision = self.inner.state.write_with(|state| {
            if state.lock_depth > 0 {
                log::trace!("collection locked, queueing add of {}", cid);
                state.pending.push(PendingOp::Add {
                    entity: entity.clone(),
                    notify,
                });
                return AddDecision::Queued;
            }
            if contains(&state.entries, cid) {
                AddDecision::Duplicate
            } else {
                AddDecision::Admissible
            }
        });

        match decision {
            AddDecision::Queued => return true,
            AddDecision::Duplicate => {
                log::warn!("entity {} already a member, ignoring add", cid);
                return false;
            }
            AddDecision::Admissible => {}
        }

        // gates run unguarded and may themselves mutate the collection
        if !self.inner.before_add.admit(&entity) {
            return false;
        }

        let commit = self.inner.state.write_with(|state| {
            if state.lock_depth > 0 {
                state.pending.push(PendingOp::Add {
                    entity: entity.clone(),
                    notify,
                });
                CommitOutcome::Queued
            } else if contains(&state.entries, cid) {
                CommitOutcome::Duplicate
            } else {
                state.entries.push_back(entity.clone());
                CommitOutcome::Inserted
            }
        });

        match commit {
            CommitOutcome::Queued => true,
            CommitOutcome::Duplicate => {
                log::warn!("entity {} already a member, ignoring add", cid);
                false
            }
            CommitOutcome::Inserted => {
                self.run_attach_hook(&entity);
                if notify {
                    self.inner.added.emit(entity);
                }
                true
            }
        }
    }

    /// Removes the member identified by `entity`'s allocation.
    ///
    /// Unknown members are a warn + `None`. While locked the request is
    /// queued and `None` is returned (the removal happens at drain).
    pub fn remove(&self, entity: &EntityRef<T>) -> Option<EntityRef<T>> {
        self.remove_by_cid(Cid::of(entity))
    }

    pub fn remove_with(&self, entity: &EntityRef<T>, notify: bool) -> Option<EntityRef<T>> {
        self.remove_by_cid_with(Cid::of(entity), notify)
    }

    pub fn remove_by_cid(&self, cid: Cid) -> Option<EntityRef<T>> {
        self.remove_by_cid_with(cid, true)
    }

    pub fn remove_by_cid_with(&self, cid: Cid, notify: bool) -> Option<EntityRef<T>> {
        let outcome = self.inner.state.write_with(|state| {
            if state.lock_depth > 0 {
                log::trace!("collection locked, queueing removal of {}", cid);
                state.pending.push(PendingOp::Remove { cid, notify });
                return TakeOutcome::Queued;
            }
            match state.entries.iter().position(|member| Cid::of(member) == cid) {
                Some(index) => TakeOutcome::Taken(state.entries.remove(index)),
                None => TakeOutcome::Missing,
            }
        });
        self.finish_removal(outcome, notify)
    }

    pub fn remove_by_index(&self, index: usize) -> Option<EntityRef<T>> {
        self.remove_by_index_with(index, true)
    }

    pub fn remove_by_index_with(&self, index: usize, notify: bool) -> Option<EntityRef<T>> {
        let outcome = self.inner.state.write_with(|state| {
            if state.lock_depth > 0 {
                log::trace!("collection locked, queueing removal of index {}", index);
                state.pending.push(PendingOp::RemoveIndex { index, notify });
                return TakeOutcome::Queued;
            }
            if index < state.entries.len() {
                TakeOutcome::Taken(state.entries.remove(index))
            } else {
                TakeOutcome::Missing
            }
        });
        self.finish_removal(outcome, notify)
    }

    fn finish_removal(&self, outcome: TakeOutcome<T>, notify: bool) -> Option<EntityRef<T>> {
        match outcome {
            TakeOutcome::Queued => None,
            TakeOutcome::Missing => {
                log::warn!("could not find entity to remove");
                None
            }
            TakeOutcome::Taken(entity) => {
                self.run_detach_hook(&entity);
                if notify {
                    self.inner.removed.emit(entity.clone());
                }
                Some(entity)
            }
        }
    }

    /// Invokes `f` for every current member.
    ///
    /// The iteration runs over a snapshot: members added or removed by `f`
    /// (or by listeners it triggers) do not appear mid-iteration; those
    /// requests are queued and applied, in order, when the outermost
    /// iteration completes.
    pub fn each(&self, mut f: impl FnMut(&EntityRef<T>)) {
        let snapshot = self.inner.state.write_with(|state| {
            state.lock_depth += 1;
            state.entries.clone()
        });
        for entity in &snapshot {
            f(entity);
        }
        self.unlock();
    }

    fn unlock(&self) {
        let drained = self.inner.state.write_with(|state| {
            state.lock_depth -= 1;
            if state.lock_depth == 0 && !state.pending.is_empty() {
                Some(std::mem::take(&mut state.pending))
            } else {
                None
            }
        });
        if let Some(ops) = drained {
            log::debug!("draining {} queued structural op(s)", ops.len());
            for op in ops {
                match op {
                    PendingOp::Add { entity, notify } => {
                        self.add_with(entity, notify);
                    }
                    PendingOp::Remove { cid, notify } => {
                        self.remove_by_cid_with(cid, notify);
                    }
                    PendingOp::RemoveIndex { index, notify } => {
                        self.remove_by_index_with(index, notify);
                    }
                }
            }
        }
    }

    /// Removes every member, notifying per entity from the tail backward.
    ///
    /// Refused while locked: the members a running iteration sees must stay
    /// valid.
    pub fn destroy(&self) -> CorralResult<()> {
        if self.is_locked() {
            log::error!("cannot destroy a collection while it is being iterated");
            return Err(CorralError::new(
                "cannot destroy a locked collection",
                ErrorKind::InvalidState,
            ));
        }
        loop {
            let size = self.size();
            if size == 0 {
                break;
            }
            if self.remove_by_index_with(size - 1, true).is_none() {
                break;
            }
        }
        Ok(())
    }

    pub fn at(&self, index: usize) -> Option<EntityRef<T>> {
        let found = self
            .inner
            .state
            .read_with(|state| state.entries.get(index).cloned());
        if found.is_none() {
            log::warn!("index {} out of range (size {})", index, self.size());
        }
        found
    }

    pub fn find_by_cid(&self, cid: Cid) -> Option<EntityRef<T>> {
        self.inner.state.read_with(|state| {
            state
                .entries
                .iter()
                .find(|member| Cid::of(member) == cid)
                .cloned()
        })
    }

    pub fn index_of(&self, entity: &EntityRef<T>) -> Option<usize> {
        self.index_of_cid(Cid::of(entity))
    }

    pub fn index_of_cid(&self, cid: Cid) -> Option<usize> {
        self.inner.state.read_with(|state| {
            state
                .entries
                .iter()
                .position(|member| Cid::of(member) == cid)
        })
    }

    pub fn has(&self, entity: &EntityRef<T>) -> bool {
        self.has_cid(Cid::of(entity))
    }

    pub fn has_cid(&self, cid: Cid) -> bool {
        self.index_of_cid(cid).is_some()
    }

    /// Snapshot of the current members in insertion order.
    pub fn members(&self) -> im::Vector<EntityRef<T>> {
        self.inner.state.read_with(|state| state.entries.clone())
    }

    pub fn first(&self) -> Option<EntityRef<T>> {
        self.inner
            .state
            .read_with(|state| state.entries.front().cloned())
    }

    pub fn last(&self) -> Option<EntityRef<T>> {
        self.inner
            .state
            .read_with(|state| state.entries.back().cloned())
    }

    pub fn random_index(&self) -> Option<usize> {
        let size = self.size();
        if size == 0 {
            None
        } else {
            Some(rand::thread_rng().gen_range(0..size))
        }
    }

    pub fn random(&self) -> Option<EntityRef<T>> {
        let members = self.members();
        if members.is_empty() {
            None
        } else {
            let index = rand::thread_rng().gen_range(0..members.len());
            members.get(index).cloned()
        }
    }

    /// Member before `entity` in insertion order. At the front, `wrap`
    /// cycles to the last member; otherwise the boundary yields `None`.
    /// Unknown entities yield `None`.
    pub fn previous(&self, entity: &EntityRef<T>, wrap: bool) -> Option<EntityRef<T>> {
        let members = self.members();
        let index = members
            .iter()
            .position(|member| Cid::of(member) == Cid::of(entity))?;
        if index == 0 {
            if wrap {
                members.back().cloned()
            } else {
                None
            }
        } else {
            members.get(index - 1).cloned()
        }
    }

    /// Member after `entity` in insertion order. At the back, `wrap` cycles
    /// to the first member; otherwise the boundary yields `None`.
    pub fn next(&self, entity: &EntityRef<T>, wrap: bool) -> Option<EntityRef<T>> {
        let members = self.members();
        let index = members
            .iter()
            .position(|member| Cid::of(member) == Cid::of(entity))?;
        if index + 1 < members.len() {
            members.get(index + 1).cloned()
        } else if wrap {
            members.front().cloned()
        } else {
            None
        }
    }

    fn run_attach_hook(&self, entity: &EntityRef<T>) {
        let hook = self.inner.attach_hook.read_with(|slot| slot.clone());
        if let Some(hook) = hook {
            hook(entity);
        }
    }

    fn run_detach_hook(&self, entity: &EntityRef<T>) {
        let hook = self.inner.detach_hook.read_with(|slot| slot.clone());
        if let Some(hook) = hook {
            hook(entity);
        }
    }
}

impl<T: Default> ObjectCollection<T> {
    /// Instantiates a new entity, adds it and returns the shared reference.
    ///
    /// The reference is returned even when an admission gate (or a size
    /// limit) keeps the entity out of the collection.
    pub fn create(&self) -> EntityRef<T> {
        let entity = Arc::new(T::default());
        self.add(entity.clone());
        entity
    }
}

fn contains<T>(entries: &im::Vector<EntityRef<T>>, cid: Cid) -> bool {
    entries.iter().any(|member| Cid::of(member) == cid)
}

impl<T> Debug for ObjectCollection<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectCollection")
            .field("name", &self.name())
            .field("size", &self.size())
            .field("locked", &self.is_locked())
            .finish()
    }
}
