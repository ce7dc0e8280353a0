use std::path::Path;

use serde_json::Value;

use crate::collection::Registry;
use crate::errors::{CorralError, CorralResult, ErrorKind};
use crate::json::JsonLoader;

/// Registry-level JSON ingestion: each top-level key names a collection,
/// its value loads through a [`JsonLoader`].
///
/// Unknown names create collections through the registry. A collection
/// with no data in the input is left alone unless
/// [`with_remove_missing(true)`](RegistryLoader::with_remove_missing),
/// which unregisters it (members survive in whoever still holds the
/// collection). A top-level array is rejected; collections are named.
pub struct RegistryLoader {
    registry: Registry,
    create: bool,
    update: bool,
    remove_missing: bool,
}

impl RegistryLoader {
    pub fn new(registry: &Registry) -> Self {
        RegistryLoader {
            registry: registry.clone(),
            create: true,
            update: true,
            remove_missing: false,
        }
    }

    /// Whether unknown names create collections. Default `true`.
    pub fn with_create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Whether known collections load their data. Default `true`.
    pub fn with_update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    /// Whether collections absent from the input are unregistered.
    /// Default `false`.
    pub fn with_remove_missing(mut self, remove_missing: bool) -> Self {
        self.remove_missing = remove_missing;
        self
    }

    pub fn load_str(&self, text: &str) -> CorralResult<()> {
        let json: Value = match serde_json::from_str(text) {
            Ok(json) => json,
            Err(err) => {
                log::warn!("could not parse JSON: {}", err);
                return Err(err.into());
            }
        };
        self.load_value(&json)
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> CorralResult<()> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            log::warn!("could not read {}: {}", path.display(), err);
            CorralError::from(err)
        })?;
        self.load_str(&text)
    }

    pub fn load_value(&self, json: &Value) -> CorralResult<()> {
        let keyed = match json {
            Value::Object(keyed) => keyed,
            _ => {
                log::warn!("top-level JSON for a registry must be an object");
                return Err(CorralError::new(
                    "top-level JSON for a registry must be an object",
                    ErrorKind::ParseError,
                ));
            }
        };

        if self.remove_missing {
            for name in self.registry.names() {
                if !keyed.contains_key(&name) {
                    log::debug!("no data for collection '{}', unregistering", name);
                    self.registry.remove(&name);
                }
            }
        }

        for (name, data) in keyed {
            let existing = if name.is_empty() {
                None
            } else {
                self.registry.get(name)
            };
            let collection = match existing {
                Some(collection) => {
                    if !self.update {
                        continue;
                    }
                    collection
                }
                None => {
                    if !self.create {
                        continue;
                    }
                    self.registry.collection(name)
                }
            };
            if let Err(err) = JsonLoader::new(&collection).load_value(data) {
                log::warn!("failed to load collection '{}': {}", name, err);
            }
        }
        Ok(())
    }
}
