use crate::core::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Shared key-value settings collaborator handed to upgrade handlers.
///
/// Settings are free-form JSON values. Handlers use the registry to
/// import configuration defaults; imports only fill missing keys unless
/// asked to overwrite, which keeps re-running an import step harmless.
#[derive(Debug, Clone, Default)]
pub struct SettingsRegistry {
    values: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl SettingsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) -> Result<()> {
        self.values.write()?.insert(key.into(), value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.read()?.get(key).cloned())
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.values.write()?.remove(key).is_some())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.values.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.values.read()?.is_empty())
    }

    /// Import defaults. Returns how many keys were written.
    pub fn import<I, S>(&self, defaults: I, overwrite: bool) -> Result<usize>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let mut values = self.values.write()?;
        let mut written = 0;
        for (key, value) in defaults {
            let key = key.into();
            if overwrite || !values.contains_key(&key) {
                values.insert(key, value);
                written += 1;
            }
        }
        debug!(written, overwrite, "settings imported");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn import_fills_gaps_without_overwrite() {
        let registry = SettingsRegistry::new();
        registry.set("batch_size", json!(500)).unwrap();

        let written = registry
            .import([("batch_size", json!(250)), ("workers", json!(4))], false)
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(registry.get("batch_size").unwrap(), Some(json!(500)));
        assert_eq!(registry.get("workers").unwrap(), Some(json!(4)));
    }

    #[test]
    fn overwrite_import_replaces_values() {
        let registry = SettingsRegistry::new();
        registry.set("batch_size", json!(500)).unwrap();
        registry.import([("batch_size", json!(250))], true).unwrap();
        assert_eq!(registry.get("batch_size").unwrap(), Some(json!(250)));
    }
}
