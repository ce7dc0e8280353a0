//! Live taps on a model's attributes.
//!
//! A transformer invokes a callback with an attribute's current value
//! right away, then again on every effective change while enabled. The
//! model retains active transformers per owner so they live exactly as
//! long as the model unless stopped explicitly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::common::OwnerTag;
use crate::errors::CorralResult;
use crate::model::{AttributeChange, Model, ModelRef};
use crate::{atomic, Atomic, WriteExecutor};

/// Callback receiving the new value of a watched attribute.
pub trait ValueCallback: Send + Sync + Fn(String) -> CorralResult<()> {}

impl<F> ValueCallback for F where F: Send + Sync + Fn(String) -> CorralResult<()> {}

/// Callback receiving the whole model on any change.
pub trait ModelCallback: Send + Sync + Fn(ModelRef) -> CorralResult<()> {}

impl<F> ModelCallback for F where F: Send + Sync + Fn(ModelRef) -> CorralResult<()> {}

/// Tap on one or more named attributes of a model.
///
/// While enabled, every effective write of a watched attribute invokes the
/// callback with the new value. `Drop` detaches the underlying listener.
pub struct ValueTransformer {
    model: Weak<Model>,
    tag: OwnerTag,
    enabled: Arc<AtomicBool>,
}

impl ValueTransformer {
    pub(crate) fn tap(
        model: &ModelRef,
        attrs: &[&str],
        callback: Arc<dyn ValueCallback>,
        active: bool,
    ) -> Arc<ValueTransformer> {
        let tag = OwnerTag::next();
        let enabled = Arc::new(AtomicBool::new(active));
        let watched: Arc<Vec<String>> = Arc::new(attrs.iter().map(|a| a.to_string()).collect());

        // the listener captures no model handle, so it never keeps the
        // model alive through its own emitter
        let gate = enabled.clone();
        let watched_by_listener = watched.clone();
        let on_change = callback.clone();
        model
            .attribute_changed()
            .subscribe(tag, move |change: AttributeChange| {
                if !gate.load(Ordering::Relaxed) {
                    return Ok(());
                }
                if !watched_by_listener.iter().any(|attr| attr == change.attr()) {
                    return Ok(());
                }
                (on_change)(change.value().to_string())
            });

        // deliver the current values right away
        for attr in watched.iter() {
            if let Err(err) = (callback)(model.get(attr)) {
                log::warn!("value transformer callback failed: {}", err);
            }
        }

        Arc::new(ValueTransformer {
            model: Arc::downgrade(model),
            tag,
            enabled,
        })
    }

    pub fn start(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

impl Drop for ValueTransformer {
    fn drop(&mut self) {
        if let Some(model) = self.model.upgrade() {
            model.attribute_changed().detach(self.tag);
        }
    }
}

/// Tap on a model as a whole: the callback receives the model on any
/// effective change.
pub struct ModelTransformer {
    model: Weak<Model>,
    tag: OwnerTag,
    enabled: Arc<AtomicBool>,
}

impl ModelTransformer {
    pub(crate) fn tap(
        model: &ModelRef,
        callback: Arc<dyn ModelCallback>,
        active: bool,
    ) -> Arc<ModelTransformer> {
        let tag = OwnerTag::next();
        let enabled = Arc::new(AtomicBool::new(active));

        let gate = enabled.clone();
        let on_change = callback.clone();
        model.changed().subscribe(tag, move |changed: ModelRef| {
            if !gate.load(Ordering::Relaxed) {
                return Ok(());
            }
            (on_change)(changed)
        });

        if let Err(err) = (callback)(model.clone()) {
            log::warn!("model transformer callback failed: {}", err);
        }

        Arc::new(ModelTransformer {
            model: Arc::downgrade(model),
            tag,
            enabled,
        })
    }

    pub fn start(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

impl Drop for ModelTransformer {
    fn drop(&mut self) {
        if let Some(model) = self.model.upgrade() {
            model.changed().detach(self.tag);
        }
    }
}

// Per-owner retention of active transformers, held by the model itself.
pub(crate) struct TapRegistry {
    value_taps: Atomic<HashMap<OwnerTag, Vec<Arc<ValueTransformer>>>>,
    model_taps: Atomic<HashMap<OwnerTag, Vec<Arc<ModelTransformer>>>>,
}

impl TapRegistry {
    pub(crate) fn new() -> Self {
        TapRegistry {
            value_taps: atomic(HashMap::new()),
            model_taps: atomic(HashMap::new()),
        }
    }

    fn retain_value(&self, owner: OwnerTag, transformer: Arc<ValueTransformer>) {
        self.value_taps
            .write_with(|taps| taps.entry(owner).or_default().push(transformer));
    }

    fn retain_model(&self, owner: OwnerTag, transformer: Arc<ModelTransformer>) {
        self.model_taps
            .write_with(|taps| taps.entry(owner).or_default().push(transformer));
    }

    fn release_value(&self, owner: OwnerTag) -> Vec<Arc<ValueTransformer>> {
        self.value_taps
            .write_with(|taps| taps.remove(&owner).unwrap_or_default())
    }

    fn release_model(&self, owner: OwnerTag) -> Vec<Arc<ModelTransformer>> {
        self.model_taps
            .write_with(|taps| taps.remove(&owner).unwrap_or_default())
    }
}

/// Transformer registration, implemented for [`ModelRef`].
pub trait ModelTaps {
    /// Taps `attr`: invokes `callback` with the current value immediately,
    /// then on every change. The transformer is retained by the model
    /// under the anonymous owner.
    fn transform(&self, attr: &str, callback: impl ValueCallback + 'static)
        -> Arc<ValueTransformer>;

    /// [`transform`](ModelTaps::transform) with explicit owner and
    /// activity. `active = false` returns a stopped transformer that the
    /// model does not retain; the caller may `start()` it.
    fn transform_with_owner(
        &self,
        attr: &str,
        callback: impl ValueCallback + 'static,
        active: bool,
        owner: OwnerTag,
    ) -> Arc<ValueTransformer>;

    /// Taps several attributes with one callback.
    fn transform_attrs(
        &self,
        attrs: &[&str],
        callback: impl ValueCallback + 'static,
    ) -> Arc<ValueTransformer>;

    fn transform_attrs_with_owner(
        &self,
        attrs: &[&str],
        callback: impl ValueCallback + 'static,
        active: bool,
        owner: OwnerTag,
    ) -> Arc<ValueTransformer>;

    /// Taps the model as a whole: `callback` runs with the model
    /// immediately and on any change.
    fn transform_model(&self, callback: impl ModelCallback + 'static) -> Arc<ModelTransformer>;

    fn transform_model_with_owner(
        &self,
        callback: impl ModelCallback + 'static,
        active: bool,
        owner: OwnerTag,
    ) -> Arc<ModelTransformer>;

    /// Stops and releases every attribute transformer retained under
    /// `owner`, returning them.
    fn stop_transforms(&self, owner: OwnerTag) -> Vec<Arc<ValueTransformer>>;

    /// Stops and releases every whole-model transformer retained under
    /// `owner`, returning them.
    fn stop_model_transforms(&self, owner: OwnerTag) -> Vec<Arc<ModelTransformer>>;
}

impl ModelTaps for ModelRef {
    fn transform(
        &self,
        attr: &str,
        callback: impl ValueCallback + 'static,
    ) -> Arc<ValueTransformer> {
        self.transform_with_owner(attr, callback, true, OwnerTag::anonymous())
    }

    fn transform_with_owner(
        &self,
        attr: &str,
        callback: impl ValueCallback + 'static,
        active: bool,
        owner: OwnerTag,
    ) -> Arc<ValueTransformer> {
        self.transform_attrs_with_owner(&[attr], callback, active, owner)
    }

    fn transform_attrs(
        &self,
        attrs: &[&str],
        callback: impl ValueCallback + 'static,
    ) -> Arc<ValueTransformer> {
        self.transform_attrs_with_owner(attrs, callback, true, OwnerTag::anonymous())
    }

    fn transform_attrs_with_owner(
        &self,
        attrs: &[&str],
        callback: impl ValueCallback + 'static,
        active: bool,
        owner: OwnerTag,
    ) -> Arc<ValueTransformer> {
        let transformer = ValueTransformer::tap(self, attrs, Arc::new(callback), active);
        if active {
            self.taps().retain_value(owner, transformer.clone());
        }
        transformer
    }

    fn transform_model(&self, callback: impl ModelCallback + 'static) -> Arc<ModelTransformer> {
        self.transform_model_with_owner(callback, true, OwnerTag::anonymous())
    }

    fn transform_model_with_owner(
        &self,
        callback: impl ModelCallback + 'static,
        active: bool,
        owner: OwnerTag,
    ) -> Arc<ModelTransformer> {
        let transformer = ModelTransformer::tap(self, Arc::new(callback), active);
        if active {
            self.taps().retain_model(owner, transformer.clone());
        }
        transformer
    }

    fn stop_transforms(&self, owner: OwnerTag) -> Vec<Arc<ValueTransformer>> {
        let released = self.taps().release_value(owner);
        for transformer in &released {
            transformer.stop();
        }
        released
    }

    fn stop_model_transforms(&self, owner: OwnerTag) -> Vec<Arc<ModelTransformer>> {
        let released = self.taps().release_model(owner);
        for transformer in &released {
            transformer.stop();
        }
        released
    }
}
