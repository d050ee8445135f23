use super::catalog::{Catalog, Record};
use super::query::Query;
use crate::core::{CatalogError, ObjectRef, Result, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// A query hit: the matched reference plus its stored metadata columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub object_ref: ObjectRef,
    pub metadata: BTreeMap<String, Value>,
}

/// Shared handle over the set of named catalogs.
///
/// Cheap to clone; all clones see the same data. Writers take the lock per
/// call, so every operation is atomic with respect to concurrent readers.
#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    catalogs: Arc<RwLock<BTreeMap<String, Catalog>>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_catalog(&self, name: &str) -> Result<()> {
        let mut catalogs = self.catalogs.write()?;
        if catalogs.contains_key(name) {
            return Err(CatalogError::CatalogExists(name.to_string()));
        }
        debug!(catalog = name, "creating catalog");
        catalogs.insert(name.to_string(), Catalog::new(name));
        Ok(())
    }

    /// Create the catalog if missing. Returns whether it was created.
    pub fn ensure_catalog(&self, name: &str) -> Result<bool> {
        let mut catalogs = self.catalogs.write()?;
        if catalogs.contains_key(name) {
            return Ok(false);
        }
        catalogs.insert(name.to_string(), Catalog::new(name));
        Ok(true)
    }

    pub fn drop_catalog(&self, name: &str) -> Result<()> {
        let mut catalogs = self.catalogs.write()?;
        catalogs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CatalogError::CatalogNotFound(name.to_string()))
    }

    pub fn contains_catalog(&self, name: &str) -> bool {
        self.catalogs
            .read()
            .map(|catalogs| catalogs.contains_key(name))
            .unwrap_or(false)
    }

    pub fn catalog_names(&self) -> Result<Vec<String>> {
        Ok(self.catalogs.read()?.keys().cloned().collect())
    }

    /// Run a closure against one catalog under the read lock.
    pub fn with_catalog<T>(&self, name: &str, f: impl FnOnce(&Catalog) -> T) -> Result<T> {
        let catalogs = self.catalogs.read()?;
        let catalog = catalogs
            .get(name)
            .ok_or_else(|| CatalogError::CatalogNotFound(name.to_string()))?;
        Ok(f(catalog))
    }

    /// Run a closure against one catalog under the write lock.
    pub fn with_catalog_mut<T>(&self, name: &str, f: impl FnOnce(&mut Catalog) -> T) -> Result<T> {
        let mut catalogs = self.catalogs.write()?;
        let catalog = catalogs
            .get_mut(name)
            .ok_or_else(|| CatalogError::CatalogNotFound(name.to_string()))?;
        Ok(f(catalog))
    }

    pub fn upsert(&self, catalog: &str, object_ref: ObjectRef, record: Record) -> Result<()> {
        self.with_catalog_mut(catalog, |cat| cat.upsert(object_ref, record))
    }

    /// Merge recomputed values into a record, creating it when absent.
    pub fn apply_values(
        &self,
        catalog: &str,
        object_ref: ObjectRef,
        index_values: BTreeMap<String, Value>,
        metadata: BTreeMap<String, Value>,
    ) -> Result<()> {
        self.with_catalog_mut(catalog, |cat| {
            cat.apply_values(object_ref, index_values, metadata)
        })
    }

    pub fn record(&self, catalog: &str, object_ref: &ObjectRef) -> Result<Option<Record>> {
        self.with_catalog(catalog, |cat| cat.record(object_ref).cloned())
    }

    pub fn remove(&self, catalog: &str, object_ref: &ObjectRef) -> Result<bool> {
        self.with_catalog_mut(catalog, |cat| cat.remove(object_ref))
    }

    pub fn clear(&self, catalog: &str) -> Result<()> {
        self.with_catalog_mut(catalog, Catalog::clear)
    }

    pub fn len(&self, catalog: &str) -> Result<usize> {
        self.with_catalog(catalog, Catalog::len)
    }

    pub fn object_refs(&self, catalog: &str) -> Result<Vec<ObjectRef>> {
        self.with_catalog(catalog, Catalog::object_refs)
    }

    /// Matching references only, ascending.
    pub fn query_refs(&self, catalog: &str, query: &Query) -> Result<Vec<ObjectRef>> {
        self.with_catalog(catalog, |cat| cat.search(query))?
    }

    /// Matching references with their metadata columns, ascending.
    pub fn query(&self, catalog: &str, query: &Query) -> Result<Vec<SearchResult>> {
        self.with_catalog(catalog, |cat| {
            let refs = cat.search(query)?;
            Ok(refs
                .into_iter()
                .map(|object_ref| SearchResult {
                    object_ref,
                    metadata: cat
                        .record(&object_ref)
                        .map(|record| record.metadata.clone())
                        .unwrap_or_default(),
                })
                .collect())
        })?
    }

    /// Remove every record matching `query`. Returns how many went away.
    pub fn uncatalog_matching(&self, catalog: &str, query: &Query) -> Result<usize> {
        self.with_catalog_mut(catalog, |cat| {
            let refs = cat.search(query)?;
            let count = refs.len();
            for object_ref in refs {
                cat.remove(&object_ref);
            }
            debug!(catalog, removed = count, "uncataloged matching records");
            Ok(count)
        })?
    }

    /// A restartable cursor over `query` results in reference order.
    pub fn cursor(&self, catalog: &str, query: Query, page_size: usize) -> QueryCursor {
        QueryCursor {
            store: self.clone(),
            catalog: catalog.to_string(),
            query,
            page_size: page_size.max(1),
            after: None,
        }
    }

    /// Clone out every catalog, for snapshotting.
    pub fn dump(&self) -> Result<BTreeMap<String, Catalog>> {
        Ok(self.catalogs.read()?.clone())
    }

    /// Replace the catalog set, rebuilding derived search state.
    pub fn restore(&self, mut catalogs: BTreeMap<String, Catalog>) -> Result<()> {
        for catalog in catalogs.values_mut() {
            catalog.rehydrate();
        }
        *self.catalogs.write()? = catalogs;
        Ok(())
    }
}

/// Pages through query results by reference order, re-running the query
/// per page so the cursor survives store mutations between pages. Calling
/// [`QueryCursor::restart`] rewinds to the beginning.
#[derive(Debug, Clone)]
pub struct QueryCursor {
    store: CatalogStore,
    catalog: String,
    query: Query,
    page_size: usize,
    after: Option<ObjectRef>,
}

impl QueryCursor {
    pub fn next_page(&mut self) -> Result<Vec<SearchResult>> {
        let results = self.store.query(&self.catalog, &self.query)?;
        let page: Vec<SearchResult> = results
            .into_iter()
            .filter(|result| match &self.after {
                Some(last) => result.object_ref > *last,
                None => true,
            })
            .take(self.page_size)
            .collect();
        if let Some(last) = page.last() {
            self.after = Some(last.object_ref);
        }
        Ok(page)
    }

    pub fn restart(&mut self) {
        self.after = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::IndexKind;

    fn store_with_catalog() -> CatalogStore {
        let store = CatalogStore::new();
        store.create_catalog("samples").unwrap();
        store
            .with_catalog_mut("samples", |cat| {
                cat.schema.add_index("state", IndexKind::Field).unwrap();
                cat.schema.add_column("title").unwrap();
            })
            .unwrap();
        store
    }

    fn active_record(title: &str) -> Record {
        let mut record = Record::default();
        record
            .index_values
            .insert("state".into(), Value::text("active"));
        record.metadata.insert("title".into(), Value::text(title));
        record
    }

    #[test]
    fn create_is_exclusive_ensure_is_not() {
        let store = CatalogStore::new();
        store.create_catalog("samples").unwrap();
        assert!(matches!(
            store.create_catalog("samples"),
            Err(CatalogError::CatalogExists(_))
        ));
        assert!(!store.ensure_catalog("samples").unwrap());
        assert!(store.ensure_catalog("worksheets").unwrap());
    }

    #[test]
    fn drop_missing_catalog_errors() {
        let store = CatalogStore::new();
        assert!(matches!(
            store.drop_catalog("ghost"),
            Err(CatalogError::CatalogNotFound(_))
        ));
    }

    #[test]
    fn query_returns_metadata() {
        let store = store_with_catalog();
        let object_ref = ObjectRef::new();
        store
            .upsert("samples", object_ref, active_record("Water"))
            .unwrap();

        let results = store
            .query("samples", &Query::new().eq("state", Value::text("active")))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].object_ref, object_ref);
        assert_eq!(results[0].metadata.get("title"), Some(&Value::text("Water")));
    }

    #[test]
    fn uncatalog_matching_removes_only_hits() {
        let store = store_with_catalog();
        let keep = ObjectRef::new();
        let mut retired = Record::default();
        retired
            .index_values
            .insert("state".into(), Value::text("retired"));
        store.upsert("samples", keep, retired).unwrap();
        for _ in 0..3 {
            store
                .upsert("samples", ObjectRef::new(), active_record("x"))
                .unwrap();
        }

        let removed = store
            .uncatalog_matching("samples", &Query::new().eq("state", Value::text("active")))
            .unwrap();
        assert_eq!(removed, 3);
        assert_eq!(store.len("samples").unwrap(), 1);
        assert!(store.record("samples", &keep).unwrap().is_some());
    }

    #[test]
    fn cursor_pages_in_order_and_restarts() {
        let store = store_with_catalog();
        for _ in 0..5 {
            store
                .upsert("samples", ObjectRef::new(), active_record("x"))
                .unwrap();
        }

        let mut cursor = store.cursor(
            "samples",
            Query::new().eq("state", Value::text("active")),
            2,
        );
        let mut seen = Vec::new();
        loop {
            let page = cursor.next_page().unwrap();
            if page.is_empty() {
                break;
            }
            assert!(page.len() <= 2);
            seen.extend(page.into_iter().map(|r| r.object_ref));
        }
        assert_eq!(seen.len(), 5);
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted);

        cursor.restart();
        assert_eq!(cursor.next_page().unwrap().len(), 2);
    }

    #[test]
    fn cursor_skips_records_removed_between_pages() {
        let store = store_with_catalog();
        for _ in 0..4 {
            store
                .upsert("samples", ObjectRef::new(), active_record("x"))
                .unwrap();
        }
        let mut cursor = store.cursor(
            "samples",
            Query::new().eq("state", Value::text("active")),
            2,
        );
        let first = cursor.next_page().unwrap();
        assert_eq!(first.len(), 2);

        let remaining = store.object_refs("samples").unwrap();
        store.remove("samples", &remaining[2]).unwrap();

        let second = cursor.next_page().unwrap();
        assert_eq!(second.len(), 1);
        assert!(second[0].object_ref > first[1].object_ref);
    }
}
