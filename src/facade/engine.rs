use crate::config::EngineConfig;
use crate::core::{CancelToken, Result, Version};
use crate::indexer::IndexerRegistry;
use crate::objects::ObjectSource;
use crate::registry::SettingsRegistry;
use crate::reindex::{CheckpointStore, Reindexer};
use crate::security::{PermissionPolicy, SecurityPropagator};
use crate::storage::{CatalogStore, SchemaManager, SnapshotManager, StoreSnapshot};
use crate::upgrade::{
    ChainReport, ChainResolver, HandlerRegistry, StepDeclaration, StepRunner, UpgradeContext,
    UpgradeState,
};
use std::sync::Arc;
use tracing::info;

/// The assembled engine: catalogs, schema management, reindexing,
/// security propagation and the upgrade machinery behind one handle.
pub struct CatalogEngine {
    config: EngineConfig,
    store: CatalogStore,
    schema: SchemaManager,
    reindexer: Reindexer,
    security: SecurityPropagator,
    settings: SettingsRegistry,
    state: Arc<UpgradeState>,
    snapshots: SnapshotManager,
}

impl CatalogEngine {
    /// Open the engine against a data directory, restoring the catalog
    /// snapshot and version file left by a previous process if present.
    ///
    /// The security index gets an extraction rule automatically unless
    /// the caller registered their own under the same name.
    pub fn open(
        config: EngineConfig,
        source: Arc<dyn ObjectSource>,
        mut indexers: IndexerRegistry,
        policy: PermissionPolicy,
    ) -> Result<Self> {
        let store = CatalogStore::new();
        let snapshots = SnapshotManager::new(config.snapshot_path());
        if let Some(snapshot) = snapshots.load()? {
            info!(
                catalogs = snapshot.metadata.catalog_count,
                records = snapshot.metadata.record_count,
                "restoring catalog snapshot"
            );
            store.restore(snapshot.catalogs)?;
        }

        let security = SecurityPropagator::new(
            Arc::clone(&source),
            policy,
            config.security_index.clone(),
        );
        if !indexers.is_registered(&config.security_index) {
            indexers.register_fn(&config.security_index, security.indexer());
        }

        let reindexer = Reindexer::new(
            store.clone(),
            source,
            indexers,
            CheckpointStore::new(config.checkpoint_dir()),
        )
        .with_batch_size(config.batch_size)
        .with_workers(config.workers);

        let state = Arc::new(UpgradeState::open(
            config.version_path(),
            config.initial_version,
        )?);

        Ok(Self {
            schema: SchemaManager::new(store.clone()),
            store,
            reindexer,
            security,
            settings: SettingsRegistry::new(),
            state,
            snapshots,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    pub fn schema(&self) -> &SchemaManager {
        &self.schema
    }

    pub fn reindexer(&self) -> &Reindexer {
        &self.reindexer
    }

    pub fn security(&self) -> &SecurityPropagator {
        &self.security
    }

    pub fn settings(&self) -> &SettingsRegistry {
        &self.settings
    }

    pub fn current_version(&self) -> Result<Version> {
        self.state.current()
    }

    /// A fresh execution context with its own cancellation token.
    pub fn context(&self) -> UpgradeContext {
        UpgradeContext {
            store: self.store.clone(),
            schema: self.schema.clone(),
            reindexer: self.reindexer.clone(),
            security: self.security.clone(),
            settings: self.settings.clone(),
            cancel: CancelToken::new(),
        }
    }

    /// Resolve and run the upgrade chain from the current version, then
    /// snapshot the catalogs so committed work survives a restart.
    pub async fn run_upgrade(
        &self,
        steps: Vec<StepDeclaration>,
        handlers: HandlerRegistry,
        target: Option<Version>,
    ) -> Result<ChainReport> {
        let resolver = ChainResolver::new(steps, handlers);
        let chain = resolver.resolve(self.state.current()?, target)?;
        info!(steps = chain.len(), "upgrade chain resolved");

        let runner = StepRunner::new(Arc::clone(&self.state));
        let ctx = self.context();
        let report = runner.run_chain(&chain, &ctx).await?;
        self.save()?;
        Ok(report)
    }

    /// Write the catalog snapshot.
    pub fn save(&self) -> Result<()> {
        self.snapshots.save(&StoreSnapshot::new(self.store.dump()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::objects::{MemoryTree, SourceObject};
    use crate::storage::{CatalogSpec, IndexKind, Query};
    use tempfile::TempDir;

    fn sample_tree() -> Arc<MemoryTree> {
        let tree = Arc::new(MemoryTree::new());
        for state in ["active", "active", "retired"] {
            tree.insert(SourceObject::new("sample").with_field("state", Value::text(state)));
        }
        tree
    }

    fn open_engine(temp_dir: &TempDir, tree: Arc<MemoryTree>) -> CatalogEngine {
        CatalogEngine::open(
            EngineConfig::new(temp_dir.path()).initial_version(2500),
            tree,
            IndexerRegistry::new(),
            PermissionPolicy::default(),
        )
        .unwrap()
    }

    fn upgrade_inputs() -> (Vec<StepDeclaration>, HandlerRegistry) {
        let mut handlers = HandlerRegistry::new();
        handlers.register_fn("setup_catalogs", |ctx: &UpgradeContext| {
            ctx.schema.setup_catalogs(&[CatalogSpec::new("samples")
                .index("state", IndexKind::Field)
                .index("allowed_principals", IndexKind::Keyword)])?;
            Ok(())
        });
        let steps = vec![
            StepDeclaration::new("install catalogs", 2500, 2501, "setup_catalogs")
                .with_description("create the sample catalog and its indexes"),
        ];
        (steps, handlers)
    }

    #[tokio::test]
    async fn upgrade_then_reindex_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let tree = sample_tree();
        let engine = open_engine(&temp_dir, tree);

        let (steps, handlers) = upgrade_inputs();
        let report = engine
            .run_upgrade(steps, handlers, Some(2501))
            .await
            .unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(engine.current_version().unwrap(), 2501);

        let ctx = engine.context();
        ctx.reindexer
            .clear_find_and_rebuild("samples", &ctx.cancel)
            .await
            .unwrap();
        let hits = engine
            .store()
            .query_refs("samples", &Query::new().eq("state", Value::text("active")))
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn reopened_engine_sees_saved_catalogs_and_version() {
        let temp_dir = TempDir::new().unwrap();
        let tree = sample_tree();

        {
            let engine = open_engine(&temp_dir, tree.clone());
            let (steps, handlers) = upgrade_inputs();
            engine
                .run_upgrade(steps, handlers, Some(2501))
                .await
                .unwrap();
            let ctx = engine.context();
            ctx.reindexer
                .clear_find_and_rebuild("samples", &ctx.cancel)
                .await
                .unwrap();
            engine.save().unwrap();
        }

        let engine = open_engine(&temp_dir, tree);
        assert_eq!(engine.current_version().unwrap(), 2501);
        let hits = engine
            .store()
            .query_refs("samples", &Query::new().eq("state", Value::text("active")))
            .unwrap();
        assert_eq!(hits.len(), 2);

        // Re-running the same chain after reopen changes nothing.
        let (steps, handlers) = upgrade_inputs();
        let report = engine
            .run_upgrade(steps, handlers, Some(2501))
            .await
            .unwrap();
        assert_eq!((report.applied, report.skipped), (0, 0));
    }

    #[tokio::test]
    async fn security_index_is_wired_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let tree = Arc::new(MemoryTree::new());
        tree.insert(
            SourceObject::new("folder")
                .with_role("alice", "Manager")
                .with_security_override(),
        );
        let engine = open_engine(&temp_dir, tree);

        let (steps, handlers) = upgrade_inputs();
        engine
            .run_upgrade(steps, handlers, Some(2501))
            .await
            .unwrap();
        let ctx = engine.context();
        ctx.reindexer
            .clear_find_and_rebuild("samples", &ctx.cancel)
            .await
            .unwrap();

        let hits = engine
            .store()
            .query_refs(
                "samples",
                &Query::new().eq("allowed_principals", Value::text("user:alice")),
            )
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
