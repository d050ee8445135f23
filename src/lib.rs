//! In-memory catalog engine with durable versioned upgrades.
//!
//! [`CatalogEngine`] is the recommended way to embed the engine in
//! applications: it wires the catalog store, the schema manager, the
//! reindexer and the security propagator together, and runs declarative
//! upgrade chains against a durable version file.
//!
//! # Examples
//!
//! ```
//! use catalogdb::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> catalogdb::Result<()> {
//! let temp_dir = tempfile::tempdir()?;
//! let tree = Arc::new(MemoryTree::new());
//! tree.insert(SourceObject::new("sample").with_field("state", Value::text("active")));
//!
//! let engine = CatalogEngine::open(
//!     EngineConfig::new(temp_dir.path()),
//!     tree,
//!     IndexerRegistry::new(),
//!     PermissionPolicy::default(),
//! )?;
//!
//! engine.schema().setup_catalogs(&[
//!     CatalogSpec::new("samples").index("state", IndexKind::Field),
//! ])?;
//!
//! let hits = engine
//!     .store()
//!     .query_refs("samples", &Query::new().eq("state", Value::text("active")))?;
//! assert!(hits.is_empty()); // nothing catalogued until a reindex runs
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod facade;
pub mod indexer;
pub mod objects;
pub mod prelude;
pub mod registry;
pub mod reindex;
pub mod security;
pub mod storage;
pub mod upgrade;

// Re-export main types for convenience
pub use config::EngineConfig;
pub use core::{CatalogError, Result, Value, Version};
pub use facade::CatalogEngine;
pub use storage::{CatalogStore, Query};
