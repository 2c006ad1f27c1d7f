//! Local cache of template records
//!
//! All records live in one JSON object under [`TEMPLATES_KEY`], keyed by
//! template name. Every operation reads the mapping, applies the change and
//! writes it back, so callers must serialize read-modify-write sequences.

use std::collections::BTreeMap;

use crate::error::LocalStoreError;
use crate::storage::KeyValueStore;
use crate::template::{TemplateName, TemplateRecord};

/// Storage key of the serialized template mapping
pub const TEMPLATES_KEY: &str = "emailTemplates";

type TemplateMap = BTreeMap<String, TemplateRecord>;

/// Name-keyed template records persisted in a [`KeyValueStore`]
#[derive(Debug)]
pub struct LocalCache<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> LocalCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Insert or overwrite the record stored under `name`
    pub fn put(&self, name: &TemplateName, record: &TemplateRecord) -> Result<(), LocalStoreError> {
        let mut templates = self.read()?;
        templates.insert(name.as_str().to_string(), record.clone());
        self.write(&templates)
    }

    pub fn get(&self, name: &TemplateName) -> Result<Option<TemplateRecord>, LocalStoreError> {
        Ok(self.read()?.remove(name.as_str()))
    }

    /// All records, ordered by name
    pub fn get_all(&self) -> Result<Vec<TemplateRecord>, LocalStoreError> {
        Ok(self.read()?.into_values().collect())
    }

    /// Remove the record under `name`; no-op if absent
    pub fn remove(&self, name: &TemplateName) -> Result<(), LocalStoreError> {
        let mut templates = self.read()?;
        if templates.remove(name.as_str()).is_some() {
            self.write(&templates)?;
        }
        Ok(())
    }

    fn read(&self) -> Result<TemplateMap, LocalStoreError> {
        match self.store.get(TEMPLATES_KEY)? {
            Some(payload) => serde_json::from_str(&payload)
                .map_err(|e| LocalStoreError::corrupt(TEMPLATES_KEY, e)),
            None => Ok(TemplateMap::new()),
        }
    }

    fn write(&self, templates: &TemplateMap) -> Result<(), LocalStoreError> {
        let payload = serde_json::to_string(templates)
            .map_err(|e| LocalStoreError::serialization(TEMPLATES_KEY, e))?;
        self.store.set(TEMPLATES_KEY, &payload)
    }
}
