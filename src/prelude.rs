//! One-stop imports for embedding the engine.
//!
//! Pulls in the engine facade, the storage surface and the upgrade
//! machinery so application code can `use catalogdb::prelude::*;` and
//! get going.

pub use crate::config::EngineConfig;
pub use crate::core::{
    CancelToken, CatalogError, FieldSelection, ObjectRef, Result, Value, Version,
};
pub use crate::facade::CatalogEngine;
pub use crate::indexer::{IndexerFn, IndexerRegistry, searchable_text};
pub use crate::objects::{MemoryTree, ObjectSource, RoleAssignment, SourceObject};
pub use crate::registry::SettingsRegistry;
pub use crate::reindex::{ReindexReport, Reindexer};
pub use crate::security::{PermissionPolicy, SecurityPropagator, SecurityReport};
pub use crate::storage::{
    CatalogSpec, CatalogStore, IndexKind, Predicate, Query, QueryCursor, SchemaManager,
    SearchResult, SetupReport,
};
pub use crate::upgrade::{
    ChainReport, ChainResolver, HandlerRegistry, StepDeclaration, StepRunner, UpgradeContext,
    UpgradeHandler, UpgradeState,
};
