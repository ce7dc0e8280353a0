//! Synchronous event emitter with owner-tagged subscriptions.
//!
//! Every corral event (entity added, attribute changed, collection
//! initialized) travels through an [`Emitter`]. Dispatch is synchronous
//! and in registration order; a failing listener is logged and skipped,
//! it never stops the round.

use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use smallvec::SmallVec;

use crate::errors::CorralResult;
use crate::{atomic, Atomic, ReadExecutor, WriteExecutor};

static NEXT_OWNER_TAG: AtomicU64 = AtomicU64::new(1);
static ANONYMOUS_OWNER: Lazy<OwnerTag> = Lazy::new(OwnerTag::next);

/// Identity under which listeners are registered, so they can later be
/// detached as a group without holding on to the closures themselves.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct OwnerTag(u64);

impl OwnerTag {
    /// Returns a fresh, process-unique tag.
    pub fn next() -> Self {
        OwnerTag(NEXT_OWNER_TAG.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the shared tag used for subscriptions nobody intends to
    /// detach individually. All anonymous subscriptions on an emitter are
    /// detached together.
    pub fn anonymous() -> Self {
        *ANONYMOUS_OWNER
    }
}

/// Callback invoked with a clone of the emitted payload.
pub trait EmitterCallback<T>: Send + Sync + Fn(T) -> CorralResult<()> {}

impl<T, F> EmitterCallback<T> for F where F: Send + Sync + Fn(T) -> CorralResult<()> {}

struct Listener<T> {
    owner: OwnerTag,
    on_event: Arc<dyn EmitterCallback<T>>,
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Listener {
            owner: self.owner,
            on_event: self.on_event.clone(),
        }
    }
}

enum ListenerOp<T> {
    Subscribe(Listener<T>),
    Unsubscribe(OwnerTag),
}

struct EmitterState<T> {
    listeners: Vec<Listener<T>>,
    // > 0 while a dispatch round (possibly nested) is in flight
    round_depth: usize,
    pending: SmallVec<[ListenerOp<T>; 2]>,
}

impl<T> EmitterState<T> {
    fn apply(&mut self, op: ListenerOp<T>) {
        match op {
            ListenerOp::Subscribe(listener) => self.listeners.push(listener),
            ListenerOp::Unsubscribe(owner) => {
                self.listeners.retain(|listener| listener.owner != owner)
            }
        }
    }
}

/// Synchronous multi-listener event channel.
///
/// Cloning an `Emitter` yields another handle onto the same listener list.
/// Listener registrations and detachments performed from inside a dispatch
/// round are deferred until the outermost round completes, so a listener
/// subscribed during an event never observes that same event.
pub struct Emitter<T> {
    state: Atomic<EmitterState<T>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Emitter {
            state: self.state.clone(),
        }
    }
}

impl<T> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Emitter<T> {
    pub fn new() -> Self {
        Emitter {
            state: atomic(EmitterState {
                listeners: Vec::new(),
                round_depth: 0,
                pending: SmallVec::new(),
            }),
        }
    }

    /// Registers `callback` under `owner`. Takes effect immediately, or at
    /// the end of the outermost round when called from inside a dispatch.
    pub fn subscribe(&self, owner: OwnerTag, callback: impl EmitterCallback<T> + 'static) {
        let listener = Listener {
            owner,
            on_event: Arc::new(callback),
        };
        self.state.write_with(|state| {
            if state.round_depth > 0 {
                log::trace!("emitter busy, deferring subscribe for {:?}", owner);
                state.pending.push(ListenerOp::Subscribe(listener));
            } else {
                state.listeners.push(listener);
            }
        });
    }

    /// Removes every listener registered under `owner`. Unknown owners are
    /// a no-op, so detach is safe to call more than once.
    pub fn detach(&self, owner: OwnerTag) {
        self.state.write_with(|state| {
            if state.round_depth > 0 {
                log::trace!("emitter busy, deferring detach for {:?}", owner);
                state.pending.push(ListenerOp::Unsubscribe(owner));
            } else {
                state.listeners.retain(|listener| listener.owner != owner);
            }
        });
    }

    pub fn listener_count(&self) -> usize {
        self.state.read_with(|state| state.listeners.len())
    }

    pub fn has_listeners(&self) -> bool {
        self.listener_count() > 0
    }
}

impl<T: Clone> Emitter<T> {
    /// Dispatches `payload` to every listener registered at the start of
    /// the round, in registration order. Listener errors are logged and
    /// the round continues.
    pub fn emit(&self, payload: T) {
        let snapshot = self.state.write_with(|state| {
            state.round_depth += 1;
            state.listeners.clone()
        });

        // No guard is held while listeners run; they are free to use the
        // emitter (or anything that reaches back into it) reentrantly.
        for listener in &snapshot {
            if let Err(err) = (listener.on_event)(payload.clone()) {
                log::warn!("emitter listener failed: {}", err);
            }
        }

        self.state.write_with(|state| {
            state.round_depth -= 1;
            if state.round_depth == 0 && !state.pending.is_empty() {
                let pending = std::mem::take(&mut state.pending);
                log::debug!("applying {} deferred listener op(s)", pending.len());
                for op in pending {
                    state.apply(op);
                }
            }
        });
    }
}

impl<T> Debug for Emitter<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
