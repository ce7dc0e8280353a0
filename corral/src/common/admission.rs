//! Admission gates: ordered boolean vetoes consulted before an entity
//! joins a collection.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::common::emitter::OwnerTag;
use crate::{atomic, Atomic, ReadExecutor, WriteExecutor};

/// Gate consulted with a candidate entity; returning `false` vetoes it.
pub trait AdmissionGate<T>: Send + Sync + Fn(&Arc<T>) -> bool {}

impl<T, F> AdmissionGate<T> for F where F: Send + Sync + Fn(&Arc<T>) -> bool {}

struct Gate<T> {
    owner: OwnerTag,
    check: Arc<dyn AdmissionGate<T>>,
}

impl<T> Clone for Gate<T> {
    fn clone(&self) -> Self {
        Gate {
            owner: self.owner,
            check: self.check.clone(),
        }
    }
}

enum GateOp<T> {
    Add(Gate<T>),
    Remove(OwnerTag),
}

struct ChainState<T> {
    gates: Vec<Gate<T>>,
    round_depth: usize,
    pending: SmallVec<[GateOp<T>; 2]>,
}

impl<T> ChainState<T> {
    fn apply(&mut self, op: GateOp<T>) {
        match op {
            GateOp::Add(gate) => self.gates.push(gate),
            GateOp::Remove(owner) => self.gates.retain(|gate| gate.owner != owner),
        }
    }
}

/// Ordered chain of admission gates.
///
/// Gates are consulted in registration order and the first veto
/// short-circuits the rest. An empty chain admits everything. Like
/// [`Emitter`](crate::common::Emitter), gate registration from inside an
/// evaluation is deferred until the outermost evaluation completes.
pub struct AdmissionChain<T> {
    state: Atomic<ChainState<T>>,
}

impl<T> Clone for AdmissionChain<T> {
    fn clone(&self) -> Self {
        AdmissionChain {
            state: self.state.clone(),
        }
    }
}

impl<T> Default for AdmissionChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AdmissionChain<T> {
    pub fn new() -> Self {
        AdmissionChain {
            state: atomic(ChainState {
                gates: Vec::new(),
                round_depth: 0,
                pending: SmallVec::new(),
            }),
        }
    }

    /// Appends a gate under `owner`.
    pub fn add_gate(&self, owner: OwnerTag, gate: impl AdmissionGate<T> + 'static) {
        let gate = Gate {
            owner,
            check: Arc::new(gate),
        };
        self.state.write_with(|state| {
            if state.round_depth > 0 {
                log::trace!("admission chain busy, deferring gate for {:?}", owner);
                state.pending.push(GateOp::Add(gate));
            } else {
                state.gates.push(gate);
            }
        });
    }

    /// Removes every gate registered under `owner`; unknown owners are a
    /// no-op.
    pub fn detach(&self, owner: OwnerTag) {
        self.state.write_with(|state| {
            if state.round_depth > 0 {
                log::trace!("admission chain busy, deferring gate removal for {:?}", owner);
                state.pending.push(GateOp::Remove(owner));
            } else {
                state.gates.retain(|gate| gate.owner != owner);
            }
        });
    }

    /// Runs `candidate` through the chain. The first gate returning
    /// `false` vetoes it and later gates are not consulted.
    pub fn admit(&self, candidate: &Arc<T>) -> bool {
        let snapshot = self.state.write_with(|state| {
            state.round_depth += 1;
            state.gates.clone()
        });

        let mut admitted = true;
        for gate in &snapshot {
            if !(gate.check)(candidate) {
                log::debug!("admission gate of {:?} vetoed candidate", gate.owner);
                admitted = false;
                break;
            }
        }

        self.state.write_with(|state| {
            state.round_depth -= 1;
            if state.round_depth == 0 && !state.pending.is_empty() {
                let pending = std::mem::take(&mut state.pending);
                for op in pending {
                    state.apply(op);
                }
            }
        });

        admitted
    }

    pub fn gate_count(&self) -> usize {
        self.state.read_with(|state| state.gates.len())
    }
}

impl<T> Debug for AdmissionChain<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionChain")
            .field("gates", &self.gate_count())
            .finish()
    }
}
