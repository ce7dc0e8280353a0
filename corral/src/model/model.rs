use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::collection::Cid;
use crate::common::{Emitter, ALT_ID_ATTRIBUTE, ID_ATTRIBUTES, ID_ATTRIBUTE};
use crate::model::transformer::TapRegistry;
use crate::{atomic, Atomic, ReadExecutor, WriteExecutor};

/// Shared handle to a [`Model`]; the form models take everywhere in corral.
pub type ModelRef = Arc<Model>;

/// Snapshot form of a model's attributes (cheap persistent-map clone).
pub type Attributes = im::OrdMap<String, String>;

/// Ordered attribute input, applied first-to-last by bulk operations.
pub type AttributePairs = IndexMap<String, String>;

struct AttributeChangeInner {
    model: ModelRef,
    attr: String,
    value: String,
}

/// Payload of an attribute change: the model it happened on, the attribute
/// name and the newly written value.
#[derive(Clone)]
pub struct AttributeChange {
    inner: Arc<AttributeChangeInner>,
}

impl AttributeChange {
    pub fn new(model: ModelRef, attr: &str, value: &str) -> Self {
        AttributeChange {
            inner: Arc::new(AttributeChangeInner {
                model,
                attr: attr.to_string(),
                value: value.to_string(),
            }),
        }
    }

    pub fn model(&self) -> ModelRef {
        self.inner.model.clone()
    }

    pub fn attr(&self) -> &str {
        &self.inner.attr
    }

    pub fn value(&self) -> &str {
        &self.inner.value
    }
}

impl Debug for AttributeChange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeChange")
            .field("model", &Cid::of(&self.inner.model))
            .field("attr", &self.inner.attr)
            .field("value", &self.inner.value)
            .finish()
    }
}

// Attribute write requested while the model was locked mid-iteration.
struct PendingSet {
    attr: String,
    value: String,
    notify: bool,
}

#[derive(Default)]
struct ModelState {
    attrs: Attributes,
    lock_depth: usize,
    pending: SmallVec<[PendingSet; 4]>,
}

enum SetOutcome {
    Queued,
    Unchanged,
    Written,
}

/// String-attribute record with change notifications.
///
/// A `Model` is interior-mutable and handed around as [`ModelRef`]; two
/// models are the same model iff they share an allocation ([`Cid`]), never
/// by content. Reads live on `Model` itself; every operation that emits a
/// self-referencing event (`set` and friends) lives on [`ModelOps`], which
/// is implemented for `ModelRef`, since emitting requires the shared handle.
///
/// Writing an attribute's current value back is suppressed: no event fires.
/// While [`ModelOps::each`] iterates the attributes, writes are queued and
/// applied when the outermost iteration ends, so an iterating callback
/// never observes its own writes mid-flight.
pub struct Model {
    state: Atomic<ModelState>,
    changed: Emitter<ModelRef>,
    attribute_changed: Emitter<AttributeChange>,
    taps: TapRegistry,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    pub fn new() -> Self {
        Model {
            state: atomic(ModelState::default()),
            changed: Emitter::new(),
            attribute_changed: Emitter::new(),
            taps: TapRegistry::new(),
        }
    }

    pub fn new_ref() -> ModelRef {
        Arc::new(Model::new())
    }

    /// Fired once per effective write, before `attribute_changed`.
    pub fn changed(&self) -> &Emitter<ModelRef> {
        &self.changed
    }

    /// Fired once per effective write with the attribute and new value.
    pub fn attribute_changed(&self) -> &Emitter<AttributeChange> {
        &self.attribute_changed
    }

    pub(crate) fn taps(&self) -> &TapRegistry {
        &self.taps
    }

    /// Value of `attr`, empty string if absent.
    pub fn get(&self, attr: &str) -> String {
        self.state
            .read_with(|state| state.attrs.get(attr).cloned())
            .unwrap_or_default()
    }

    pub fn get_or(&self, attr: &str, default: &str) -> String {
        self.state
            .read_with(|state| state.attrs.get(attr).cloned())
            .unwrap_or_else(|| default.to_string())
    }

    pub fn has(&self, attr: &str) -> bool {
        self.state.read_with(|state| state.attrs.contains_key(attr))
    }

    pub fn size(&self) -> usize {
        self.state.read_with(|state| state.attrs.len())
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Snapshot of all attributes.
    pub fn attributes(&self) -> Attributes {
        self.state.read_with(|state| state.attrs.clone())
    }

    #[cfg(feature = "serde")]
    fn load_raw(&self, pairs: impl IntoIterator<Item = (String, String)>) {
        self.state.write_with(|state| {
            for (attr, value) in pairs {
                state.attrs.insert(attr, value);
            }
        });
    }
}

impl Debug for Model {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("attrs", &self.attributes())
            .finish()
    }
}

/// Operations that require the shared handle: attribute writes (their
/// events carry the model), identity and copying.
pub trait ModelOps {
    /// Writes `attr`, firing `changed` then `attribute_changed` if the
    /// value actually changed.
    fn set(&self, attr: &str, value: &str);

    /// [`set`](ModelOps::set) with control over notification. A queued
    /// write keeps the flag it was requested with.
    fn set_with(&self, attr: &str, value: &str, notify: bool);

    /// Applies `pairs` first-to-last through `set`.
    fn set_many(&self, pairs: &AttributePairs);

    fn set_many_with(&self, pairs: &AttributePairs, notify: bool);

    /// Iterates a snapshot of the attributes; writes requested by `f` (or
    /// by listeners it triggers) are queued until the outermost iteration
    /// ends.
    fn each(&self, f: impl FnMut(&str, &str));

    /// Application-level identifier: `"id"`, else `"_id"`, else the
    /// [`Cid`] token.
    fn id(&self) -> String;

    fn cid(&self) -> Cid;

    /// Copies every attribute of `other` onto this model, skipping
    /// `id`/`_id` unless `include_ids`.
    fn copy_from(&self, other: &ModelRef, include_ids: bool);
}

impl ModelOps for ModelRef {
    fn set(&self, attr: &str, value: &str) {
        self.set_with(attr, value, true);
    }

    fn set_with(&self, attr: &str, value: &str, notify: bool) {
        if attr.is_empty() {
            log::warn!("ignoring write with empty attribute name");
            return;
        }
        let outcome = self.state.write_with(|state| {
            if state.lock_depth > 0 {
                log::trace!("model locked, queueing write of '{}'", attr);
                state.pending.push(PendingSet {
                    attr: attr.to_string(),
                    value: value.to_string(),
                    notify,
                });
                return SetOutcome::Queued;
            }
            let old_value = state.attrs.get(attr).cloned().unwrap_or_default();
            state.attrs.insert(attr.to_string(), value.to_string());
            if old_value == value {
                SetOutcome::Unchanged
            } else {
                SetOutcome::Written
            }
        });

        if let SetOutcome::Written = outcome {
            if notify {
                self.changed.emit(self.clone());
                self.attribute_changed
                    .emit(AttributeChange::new(self.clone(), attr, value));
            }
        }
    }

    fn set_many(&self, pairs: &AttributePairs) {
        self.set_many_with(pairs, true);
    }

    fn set_many_with(&self, pairs: &AttributePairs, notify: bool) {
        for (attr, value) in pairs {
            self.set_with(attr, value, notify);
        }
    }

    fn each(&self, mut f: impl FnMut(&str, &str)) {
        let snapshot = self.state.write_with(|state| {
            state.lock_depth += 1;
            state.attrs.clone()
        });
        for (attr, value) in &snapshot {
            f(attr, value);
        }

        let drained = self.state.write_with(|state| {
            state.lock_depth -= 1;
            if state.lock_depth == 0 && !state.pending.is_empty() {
                Some(std::mem::take(&mut state.pending))
            } else {
                None
            }
        });
        if let Some(writes) = drained {
            log::debug!("draining {} queued attribute write(s)", writes.len());
            for write in writes {
                // suppression applies at perform time, not request time
                self.set_with(&write.attr, &write.value, write.notify);
            }
        }
    }

    fn id(&self) -> String {
        let id = self.get(ID_ATTRIBUTE);
        if !id.is_empty() {
            return id;
        }
        let alt = self.get(ALT_ID_ATTRIBUTE);
        if !alt.is_empty() {
            return alt;
        }
        self.cid().to_string()
    }

    fn cid(&self) -> Cid {
        Cid::of(self)
    }

    fn copy_from(&self, other: &ModelRef, include_ids: bool) {
        for (attr, value) in &other.attributes() {
            if !include_ids && ID_ATTRIBUTES.contains(&attr.as_str()) {
                continue;
            }
            self.set(attr, value);
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Model {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let attrs = self.attributes();
        let mut map = serializer.serialize_map(Some(attrs.len()))?;
        for (attr, value) in &attrs {
            map.serialize_entry(attr, value)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Model {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pairs = std::collections::BTreeMap::<String, String>::deserialize(deserializer)?;
        let model = Model::new();
        model.load_raw(pairs);
        Ok(model)
    }
}

/// Strips the quotes `stringify!` leaves around string-literal keys.
pub fn normalize_attr(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Builds an [`AttributePairs`] map from `key: value` entries.
///
/// Keys may be identifiers or string literals; values are anything with
/// `to_string`.
///
/// ```rust,ignore
/// let pairs = attrs! { name: "John", "age": 32 };
/// ```
#[macro_export]
macro_rules! attrs {
    () => {
        $crate::model::AttributePairs::new()
    };
    ($($key:tt : $value:expr),* $(,)?) => {{
        let mut pairs = $crate::model::AttributePairs::new();
        $(
            pairs.insert($crate::model::normalize_attr(stringify!($key)), ($value).to_string());
        )*
        pairs
    }};
}

/// Builds a ready-made [`ModelRef`] from `key: value` entries.
///
/// ```rust,ignore
/// let model = model! { name: "John", age: 32 };
/// assert_eq!(model.get("age"), "32");
/// ```
#[macro_export]
macro_rules! model {
    ($($key:tt : $value:expr),* $(,)?) => {{
        let model_ref = $crate::model::Model::new_ref();
        let pairs = $crate::attrs!($($key : $value),*);
        $crate::model::ModelOps::set_many(&model_ref, &pairs);
        model_ref
    }};
}
