use crate::core::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an index interprets the values extracted for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    /// Exact match on a single value.
    Field,
    /// Exact match against any member of a multi-valued set.
    Keyword,
    /// Ordered values answering bounded range queries.
    Range,
    /// Tokenized text routed through the catalog lexicon.
    FullText,
    /// Two-sided membership on true/false.
    Boolean,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Field => "FIELD",
            Self::Keyword => "KEYWORD",
            Self::Range => "RANGE",
            Self::FullText => "FULLTEXT",
            Self::Boolean => "BOOLEAN",
        };
        write!(f, "{}", name)
    }
}

/// A named index column in a catalog schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub kind: IndexKind,
}

impl IndexDefinition {
    pub fn new(name: impl Into<String>, kind: IndexKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A stored metadata column returned verbatim from query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataColumn {
    pub name: String,
}

impl MetadataColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// The index and metadata layout of one catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSchema {
    indexes: Vec<IndexDefinition>,
    columns: Vec<MetadataColumn>,
}

impl CatalogSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an index. Re-adding with the same kind is a no-op;
    /// a kind change is refused so existing postings stay coherent.
    pub fn add_index(&mut self, name: &str, kind: IndexKind) -> Result<bool> {
        if name.is_empty() {
            return Err(CatalogError::Schema("index name must not be empty".into()));
        }
        if let Some(existing) = self.index(name) {
            if existing.kind == kind {
                return Ok(false);
            }
            return Err(CatalogError::Conflict {
                name: name.to_string(),
                existing: existing.kind.to_string(),
                requested: kind.to_string(),
            });
        }
        self.indexes.push(IndexDefinition::new(name, kind));
        Ok(true)
    }

    /// Remove an index if present. Absence is not an error.
    pub fn remove_index(&mut self, name: &str) -> bool {
        let before = self.indexes.len();
        self.indexes.retain(|idx| idx.name != name);
        self.indexes.len() != before
    }

    pub fn add_column(&mut self, name: &str) -> Result<bool> {
        if name.is_empty() {
            return Err(CatalogError::Schema("column name must not be empty".into()));
        }
        if self.has_column(name) {
            return Ok(false);
        }
        self.columns.push(MetadataColumn::new(name));
        Ok(true)
    }

    pub fn remove_column(&mut self, name: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|col| col.name != name);
        self.columns.len() != before
    }

    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.iter().find(|idx| idx.name == name)
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.index(name).is_some()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|col| col.name == name)
    }

    pub fn indexes(&self) -> &[IndexDefinition] {
        &self.indexes
    }

    pub fn columns(&self) -> &[MetadataColumn] {
        &self.columns
    }

    /// Names of every index plus every column, deduplicated. This is the
    /// field set an unrestricted reindex recomputes.
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .indexes
            .iter()
            .map(|idx| idx.name.clone())
            .chain(self.columns.iter().map(|col| col.name.clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_index_is_idempotent_per_kind() {
        let mut schema = CatalogSchema::new();
        assert!(schema.add_index("state", IndexKind::Field).unwrap());
        assert!(!schema.add_index("state", IndexKind::Field).unwrap());
        assert_eq!(schema.indexes().len(), 1);
    }

    #[test]
    fn kind_change_is_a_conflict() {
        let mut schema = CatalogSchema::new();
        schema.add_index("state", IndexKind::Field).unwrap();
        let err = schema.add_index("state", IndexKind::Range).unwrap_err();
        assert!(matches!(err, CatalogError::Conflict { .. }));
        assert_eq!(schema.index("state").unwrap().kind, IndexKind::Field);
    }

    #[test]
    fn remove_missing_index_is_quiet() {
        let mut schema = CatalogSchema::new();
        assert!(!schema.remove_index("ghost"));
        schema.add_index("title", IndexKind::Field).unwrap();
        assert!(schema.remove_index("title"));
        assert!(!schema.has_index("title"));
    }

    #[test]
    fn field_names_merge_indexes_and_columns() {
        let mut schema = CatalogSchema::new();
        schema.add_index("title", IndexKind::Field).unwrap();
        schema.add_index("created", IndexKind::Range).unwrap();
        schema.add_column("title").unwrap();
        schema.add_column("uid").unwrap();
        assert_eq!(schema.field_names(), vec!["created", "title", "uid"]);
    }
}
