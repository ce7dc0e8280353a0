use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;

use crate::collection::Collection;
use crate::common::ID_ATTRIBUTE;
use crate::errors::{CorralError, CorralResult, ErrorKind};
use crate::json::{canonical_string, record_id};
use crate::model::{Model, ModelOps, ModelRef};

/// Applies a JSON object's fields to a model, one attribute per member,
/// canonicalized per [`canonical_string`]. Change events fire as usual.
pub fn apply_record(model: &ModelRef, record: &Value) {
    match record.as_object() {
        Some(fields) => {
            for (attr, value) in fields {
                model.set(attr, &canonical_string(value));
            }
        }
        None => log::debug!("record is not an object, no fields to apply"),
    }
}

/// Diff-and-upsert JSON ingestion for one collection.
///
/// Input is either an array of records or a keyed object whose keys are
/// record ids. Records matching an existing member by id update it in
/// place; unmatched records become new members (through the collection's
/// admission gates); members with no record in the input are removed.
/// Each of the three steps can be toggled off:
///
/// ```rust,ignore
/// JsonLoader::new(&collection)
///     .with_remove_missing(false)
///     .load_str(payload)?;
/// ```
pub struct JsonLoader {
    collection: Collection,
    create: bool,
    update: bool,
    remove_missing: bool,
}

impl JsonLoader {
    pub fn new(collection: &Collection) -> Self {
        JsonLoader {
            collection: collection.clone(),
            create: true,
            update: true,
            remove_missing: true,
        }
    }

    /// Whether unmatched records create new members. Default `true`.
    pub fn with_create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Whether matched records update members in place. Default `true`.
    pub fn with_update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    /// Whether members absent from the input are removed. Default `true`.
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
        match json {
            Value::Array(records) => {
                self.load_records(records);
                Ok(())
            }
            Value::Object(keyed) => {
                self.load_keyed(keyed);
                Ok(())
            }
            _ => {
                log::warn!("top-level JSON must be an array or object");
                Err(CorralError::new(
                    "top-level JSON must be an array or object",
                    ErrorKind::ParseError,
                ))
            }
        }
    }

    fn load_records(&self, records: &[Value]) {
        if self.remove_missing {
            let known: HashSet<String> = records.iter().filter_map(record_id).collect();
            self.remove_unknown(|member| known.contains(&member.id()));
        }

        for record in records {
            let existing = record_id(record).and_then(|id| self.collection.find_by_id(&id));
            match existing {
                Some(model) => {
                    if self.update {
                        apply_record(&model, record);
                    }
                }
                None => {
                    if self.create {
                        let model = Model::new_ref();
                        apply_record(&model, record);
                        self.collection.add(model);
                    }
                }
            }
        }
    }

    fn load_keyed(&self, keyed: &serde_json::Map<String, Value>) {
        if self.remove_missing {
            self.remove_unknown(|member| keyed.contains_key(&member.id()));
        }

        for (key, record) in keyed {
            let existing = if key.is_empty() {
                None
            } else {
                self.collection.find_by_id(key)
            };
            match existing {
                Some(model) => {
                    if self.update {
                        apply_record(&model, record);
                    }
                }
                None => {
                    if self.create {
                        let model = Model::new_ref();
                        apply_record(&model, record);
                        // the key is the id; if the record claimed that
                        // attribute, step to _id, __id, ...
                        let mut attr = ID_ATTRIBUTE.to_string();
                        while model.has(&attr) {
                            attr = format!("_{}", attr);
                        }
                        model.set(&attr, key);
                        self.collection.add(model);
                    }
                }
            }
        }
    }

    fn remove_unknown(&self, keep: impl Fn(&ModelRef) -> bool) {
        let stale: Vec<ModelRef> = self
            .collection
            .members()
            .iter()
            .filter(|member| !keep(member))
            .cloned()
            .collect();
        for member in stale {
            log::debug!("no record for member {}, removing", member.cid());
            self.collection.remove(&member);
        }
    }
}
