use crate::core::{CatalogError, Result, Value};
use crate::objects::SourceObject;
use std::collections::HashMap;
use std::sync::Arc;

/// Computes the indexable value of one field for one object.
pub type IndexerFn = Arc<dyn Fn(&SourceObject) -> Result<Value> + Send + Sync>;

/// Maps field names to the closures that compute their values.
///
/// A field with no registered indexer falls back to reading the object's
/// stored field of the same name, absent fields index as `Null`. That
/// keeps plain attribute fields registration-free while computed fields
/// opt in explicitly.
#[derive(Clone, Default)]
pub struct IndexerRegistry {
    indexers: HashMap<String, IndexerFn>,
}

impl IndexerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, field: impl Into<String>, indexer: F)
    where
        F: Fn(&SourceObject) -> Result<Value> + Send + Sync + 'static,
    {
        self.indexers.insert(field.into(), Arc::new(indexer));
    }

    /// Register an already shared indexer closure.
    pub fn register_fn(&mut self, field: impl Into<String>, indexer: IndexerFn) {
        self.indexers.insert(field.into(), indexer);
    }

    pub fn is_registered(&self, field: &str) -> bool {
        self.indexers.contains_key(field)
    }

    /// Compute the value of `field` for `object`. Indexer failures come
    /// back as extraction errors naming the field.
    pub fn extract(&self, field: &str, object: &SourceObject) -> Result<Value> {
        match self.indexers.get(field) {
            Some(indexer) => indexer(object).map_err(|e| CatalogError::Extraction {
                field: field.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(object.field(field).cloned().unwrap_or(Value::Null)),
        }
    }
}

impl std::fmt::Debug for IndexerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.indexers.keys().collect();
        names.sort();
        f.debug_struct("IndexerRegistry")
            .field("fields", &names)
            .finish()
    }
}

/// Indexer that concatenates the display form of the given fields, in
/// order, for feeding a full-text index.
pub fn searchable_text<I, S>(fields: I) -> impl Fn(&SourceObject) -> Result<Value>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
    move |object: &SourceObject| {
        let parts: Vec<String> = fields
            .iter()
            .filter_map(|name| object.field(name))
            .filter(|value| !value.is_null())
            .map(Value::to_string)
            .collect();
        Ok(Value::text(parts.join(" ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_reads_object_field() {
        let registry = IndexerRegistry::new();
        let object = SourceObject::new("sample").with_field("state", Value::text("active"));
        assert_eq!(
            registry.extract("state", &object).unwrap(),
            Value::text("active")
        );
        assert_eq!(registry.extract("missing", &object).unwrap(), Value::Null);
    }

    #[test]
    fn registered_indexer_wins_over_field() {
        let mut registry = IndexerRegistry::new();
        registry.register("state", |_| Ok(Value::text("computed")));
        let object = SourceObject::new("sample").with_field("state", Value::text("stored"));
        assert_eq!(
            registry.extract("state", &object).unwrap(),
            Value::text("computed")
        );
    }

    #[test]
    fn indexer_failure_names_the_field() {
        let mut registry = IndexerRegistry::new();
        registry.register("derived", |_| {
            Err(CatalogError::Execution("lookup failed".into()))
        });
        let object = SourceObject::new("sample");
        let err = registry.extract("derived", &object).unwrap_err();
        match err {
            CatalogError::Extraction { field, reason } => {
                assert_eq!(field, "derived");
                assert!(reason.contains("lookup failed"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn searchable_text_joins_present_fields() {
        let object = SourceObject::new("sample")
            .with_field("title", Value::text("Water"))
            .with_field("client", Value::text("Acme"))
            .with_field("notes", Value::Null);
        let indexer = searchable_text(["title", "client", "notes", "missing"]);
        assert_eq!(indexer(&object).unwrap(), Value::text("Water Acme"));
    }
}
