use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use dashmap::DashMap;

use crate::collection::Collection;
use crate::errors::CorralResult;

struct RegistryInner {
    collections: DashMap<String, Collection>,
}

/// Named-collection registry.
///
/// A registry is constructed explicitly and passed to whoever needs it;
/// there is no process-wide instance. Collections are created on first
/// use and shared by name afterwards. [`remove`](Registry::remove)
/// merely unregisters, [`destroy_collection`](Registry::destroy_collection)
/// also empties the members.
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Clone for Registry {
    fn clone(&self) -> Self {
        Registry {
            inner: self.inner.clone(),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            inner: Arc::new(RegistryInner {
                collections: DashMap::new(),
            }),
        }
    }

    /// Returns the collection registered under `name`, creating it on
    /// first use.
    pub fn collection(&self, name: &str) -> Collection {
        if let Some(existing) = self.inner.collections.get(name) {
            return existing.clone();
        }
        log::debug!("creating collection '{}'", name);
        let collection = Collection::new();
        collection.set_name(name);
        self.inner
            .collections
            .entry(name.to_string())
            .or_insert(collection)
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Collection> {
        self.inner
            .collections
            .get(name)
            .map(|entry| entry.clone())
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.inner.collections.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.inner
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn size(&self) -> usize {
        self.inner.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.collections.is_empty()
    }

    /// Visits every registered collection. The callback sees a snapshot,
    /// so it may call back into the registry freely.
    pub fn each(&self, mut f: impl FnMut(&str, &Collection)) {
        let snapshot: Vec<(String, Collection)> = self
            .inner
            .collections
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        for (name, collection) in &snapshot {
            f(name, collection);
        }
    }

    /// Unregisters `name` without touching its members.
    pub fn remove(&self, name: &str) -> Option<Collection> {
        self.inner
            .collections
            .remove(name)
            .map(|(_, collection)| collection)
    }

    /// Unregisters `name` and destroys its members. An absent name is a
    /// no-op; a locked collection refuses and stays unregistered.
    pub fn destroy_collection(&self, name: &str) -> CorralResult<()> {
        if let Some((_, collection)) = self.inner.collections.remove(name) {
            collection.destroy()?;
        }
        Ok(())
    }

    /// [`destroy_collection`](Registry::destroy_collection) for every
    /// registered name.
    pub fn clear(&self) -> CorralResult<()> {
        for name in self.names() {
            self.destroy_collection(&name)?;
        }
        Ok(())
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("collections", &self.size())
            .finish()
    }
}
