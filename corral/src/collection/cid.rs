use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Identity token of a shared entity.
///
/// Derived from the entity's allocation, so it is unique among live
/// entities, stable for the entity's lifetime, and identical across every
/// collection holding a clone of the same `Arc`. Works for any entity type
/// with no required interface.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cid(usize);

impl Cid {
    /// Returns the identity of the allocation behind `entity`.
    pub fn of<T>(entity: &Arc<T>) -> Self {
        Cid(Arc::as_ptr(entity) as usize)
    }
}

impl Display for Cid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl Debug for Cid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cid({:#x})", self.0)
    }
}
