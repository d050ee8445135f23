use super::schema::IndexKind;
use super::store::CatalogStore;
use crate::core::Result;
use tracing::info;

/// Declarative shape for one catalog: its indexes and metadata columns.
///
/// Applying a spec is reentrant, anything already present is left alone,
/// so setup can run at every startup and after partial failures.
#[derive(Debug, Clone)]
pub struct CatalogSpec {
    pub catalog: String,
    pub indexes: Vec<(String, IndexKind)>,
    pub columns: Vec<String>,
}

impl CatalogSpec {
    pub fn new(catalog: impl Into<String>) -> Self {
        Self {
            catalog: catalog.into(),
            indexes: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn index(mut self, name: impl Into<String>, kind: IndexKind) -> Self {
        self.indexes.push((name.into(), kind));
        self
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(name.into());
        self
    }
}

/// What a setup pass actually changed. Entries name `catalog.field`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupReport {
    pub created_catalogs: Vec<String>,
    pub added_indexes: Vec<String>,
    pub added_columns: Vec<String>,
}

impl SetupReport {
    pub fn is_noop(&self) -> bool {
        self.created_catalogs.is_empty()
            && self.added_indexes.is_empty()
            && self.added_columns.is_empty()
    }

    /// Index names that were newly added and therefore hold no postings
    /// yet. Callers feed these to a reindex run.
    pub fn indexes_needing_reindex(&self) -> &[String] {
        &self.added_indexes
    }
}

/// Applies schema changes to catalogs in an idempotent way.
#[derive(Debug, Clone)]
pub struct SchemaManager {
    store: CatalogStore,
}

impl SchemaManager {
    pub fn new(store: CatalogStore) -> Self {
        Self { store }
    }

    /// Add an index, reporting whether the schema changed. Re-adding with
    /// the same kind changes nothing; a kind change is refused.
    pub fn add_index(&self, catalog: &str, name: &str, kind: IndexKind) -> Result<bool> {
        let added = self
            .store
            .with_catalog_mut(catalog, |cat| cat.schema.add_index(name, kind))??;
        if added {
            info!(catalog, index = name, kind = %kind, "index added");
        }
        Ok(added)
    }

    /// Remove an index and all its derived state. Absence is not an error.
    pub fn remove_index(&self, catalog: &str, name: &str) -> Result<bool> {
        let removed = self.store.with_catalog_mut(catalog, |cat| {
            let removed = cat.schema.remove_index(name);
            if removed {
                cat.drop_index_state(name);
            }
            removed
        })?;
        if removed {
            info!(catalog, index = name, "index removed");
        }
        Ok(removed)
    }

    pub fn add_column(&self, catalog: &str, name: &str) -> Result<bool> {
        self.store
            .with_catalog_mut(catalog, |cat| cat.schema.add_column(name))?
    }

    /// Remove a metadata column and the stored values under it.
    pub fn remove_column(&self, catalog: &str, name: &str) -> Result<bool> {
        self.store.with_catalog_mut(catalog, |cat| {
            let removed = cat.schema.remove_column(name);
            if removed {
                cat.drop_column_state(name);
            }
            removed
        })
    }

    /// Bring every catalog in `specs` up to its declared shape.
    pub fn setup_catalogs(&self, specs: &[CatalogSpec]) -> Result<SetupReport> {
        let mut report = SetupReport::default();
        for spec in specs {
            if self.store.ensure_catalog(&spec.catalog)? {
                report.created_catalogs.push(spec.catalog.clone());
            }
            for (name, kind) in &spec.indexes {
                if self.add_index(&spec.catalog, name, *kind)? {
                    report
                        .added_indexes
                        .push(format!("{}.{}", spec.catalog, name));
                }
            }
            for name in &spec.columns {
                if self.add_column(&spec.catalog, name)? {
                    report
                        .added_columns
                        .push(format!("{}.{}", spec.catalog, name));
                }
            }
        }
        if !report.is_noop() {
            info!(
                catalogs = report.created_catalogs.len(),
                indexes = report.added_indexes.len(),
                columns = report.added_columns.len(),
                "catalog setup applied changes"
            );
        }
        Ok(report)
    }
}
