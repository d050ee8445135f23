pub mod checkpoint;

pub use checkpoint::{CheckpointStore, ReindexCheckpoint};

use crate::core::{CancelToken, CatalogError, FieldSelection, ObjectRef, Result};
use crate::indexer::IndexerRegistry;
use crate::objects::ObjectSource;
use crate::storage::{CatalogStore, IndexKind};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One object whose extraction failed during a run. The object's previous
/// record stays in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionFailure {
    pub object_ref: ObjectRef,
    pub field: String,
    pub reason: String,
}

/// What a reindex run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReindexReport {
    pub succeeded: usize,
    pub failed: Vec<ExtractionFailure>,
    /// Cataloged references whose source object has vanished.
    pub skipped: usize,
    pub batches_committed: usize,
    /// How many references a prior checkpoint let this run skip.
    pub resumed_from: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
struct FieldTarget {
    name: String,
    is_index: bool,
    is_column: bool,
}

enum Outcome {
    Updated {
        object_ref: ObjectRef,
        index_values: BTreeMap<String, crate::core::Value>,
        metadata: BTreeMap<String, crate::core::Value>,
    },
    Missing(ObjectRef),
    Failed(ExtractionFailure),
}

/// Recomputes catalog records from source objects in committed batches.
///
/// References are processed in ascending order, so a checkpoint written
/// after each batch lets an interrupted run resume where it stopped.
/// Batches re-run on resume are harmless, applying a record twice lands
/// on the same state. Cancellation is honored between batches only.
#[derive(Clone)]
pub struct Reindexer {
    store: CatalogStore,
    source: Arc<dyn ObjectSource>,
    indexers: IndexerRegistry,
    checkpoints: CheckpointStore,
    batch_size: usize,
    workers: usize,
}

impl Reindexer {
    pub fn new(
        store: CatalogStore,
        source: Arc<dyn ObjectSource>,
        indexers: IndexerRegistry,
        checkpoints: CheckpointStore,
    ) -> Self {
        Self {
            store,
            source,
            indexers,
            checkpoints,
            batch_size: 250,
            workers: 4,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Recompute the selected fields for every cataloged object.
    pub async fn reindex(
        &self,
        catalog: &str,
        selection: &FieldSelection,
        cancel: &CancelToken,
    ) -> Result<ReindexReport> {
        let plan = Arc::new(self.field_plan(catalog, selection)?);
        let refs = self.store.object_refs(catalog)?;
        info!(catalog, objects = refs.len(), "reindex starting");
        let report = self.run_batches(catalog, refs, plan, cancel).await?;
        info!(
            catalog,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            skipped = report.skipped,
            cancelled = report.cancelled,
            "reindex finished"
        );
        Ok(report)
    }

    /// Drop every record, then walk the whole object tree and catalog it
    /// from scratch. Lexicon vocabularies are reset too, so this is the
    /// operation that sheds stale terms.
    pub async fn clear_find_and_rebuild(
        &self,
        catalog: &str,
        cancel: &CancelToken,
    ) -> Result<ReindexReport> {
        let plan = Arc::new(self.field_plan(catalog, &FieldSelection::All)?);
        // A rebuild starts from nothing; a checkpoint left by an earlier
        // run must not skip freshly cleared references.
        self.checkpoints.clear(catalog)?;
        self.store.clear(catalog)?;
        let refs = self.source.all_refs();
        info!(catalog, objects = refs.len(), "clear and rebuild starting");
        self.run_batches(catalog, refs, plan, cancel).await
    }

    /// Reset one full-text index's lexicon and re-feed it from every
    /// cataloged object. Restarts from scratch rather than resuming.
    pub async fn rebuild_text_index(
        &self,
        catalog: &str,
        index: &str,
        cancel: &CancelToken,
    ) -> Result<ReindexReport> {
        let kind = self
            .store
            .with_catalog(catalog, |cat| cat.schema.index(index).map(|idx| idx.kind))?;
        match kind {
            Some(IndexKind::FullText) => {}
            Some(other) => {
                return Err(CatalogError::Schema(format!(
                    "index '{}' has kind {}, wholesale rebuild needs FULLTEXT",
                    index, other
                )));
            }
            None => {
                return Err(CatalogError::Schema(format!(
                    "catalog '{}' has no index '{}'",
                    catalog, index
                )));
            }
        }
        self.checkpoints.clear(catalog)?;
        self.store
            .with_catalog_mut(catalog, |cat| cat.reset_lexicon(index))?;
        let plan = Arc::new(self.field_plan(catalog, &FieldSelection::fields([index]))?);
        let refs = self.store.object_refs(catalog)?;
        info!(catalog, index, objects = refs.len(), "text index rebuild starting");
        self.run_batches(catalog, refs, plan, cancel).await
    }

    /// Catalog a single object synchronously, computing every field.
    pub fn index_object(&self, catalog: &str, object_ref: &ObjectRef) -> Result<()> {
        let plan = self.field_plan(catalog, &FieldSelection::All)?;
        match extract_object(self.source.as_ref(), &self.indexers, &plan, *object_ref) {
            Outcome::Updated {
                object_ref,
                index_values,
                metadata,
            } => self
                .store
                .apply_values(catalog, object_ref, index_values, metadata),
            Outcome::Missing(object_ref) => {
                Err(CatalogError::ObjectNotFound(object_ref.to_string()))
            }
            Outcome::Failed(failure) => Err(CatalogError::Extraction {
                field: failure.field,
                reason: failure.reason,
            }),
        }
    }

    fn field_plan(&self, catalog: &str, selection: &FieldSelection) -> Result<Vec<FieldTarget>> {
        let schema = self.store.with_catalog(catalog, |cat| cat.schema.clone())?;
        if let FieldSelection::Fields(names) = selection {
            for name in names {
                if !schema.has_index(name) && !schema.has_column(name) {
                    return Err(CatalogError::Schema(format!(
                        "catalog '{}' has no index or column '{}'",
                        catalog, name
                    )));
                }
            }
        }
        Ok(schema
            .field_names()
            .into_iter()
            .filter(|name| selection.includes(name))
            .map(|name| FieldTarget {
                is_index: schema.has_index(&name),
                is_column: schema.has_column(&name),
                name,
            })
            .collect())
    }

    async fn run_batches(
        &self,
        catalog: &str,
        refs: Vec<ObjectRef>,
        plan: Arc<Vec<FieldTarget>>,
        cancel: &CancelToken,
    ) -> Result<ReindexReport> {
        let total = refs.len();
        let resumed_from = match self.checkpoints.load(catalog)? {
            Some(cp) if cp.total == total && cp.committed <= total => {
                debug!(catalog, committed = cp.committed, "resuming from checkpoint");
                cp.committed
            }
            Some(_) => {
                self.checkpoints.clear(catalog)?;
                0
            }
            None => 0,
        };

        let mut report = ReindexReport {
            resumed_from,
            ..Default::default()
        };
        let mut committed = resumed_from;

        for batch in refs[resumed_from..].chunks(self.batch_size) {
            if cancel.is_cancelled() {
                report.cancelled = true;
                info!(catalog, committed, "run cancelled at batch boundary");
                return Ok(report);
            }
            let outcomes = self.extract_batch(batch, &plan).await?;
            for outcome in outcomes {
                match outcome {
                    Outcome::Updated {
                        object_ref,
                        index_values,
                        metadata,
                    } => {
                        self.store
                            .apply_values(catalog, object_ref, index_values, metadata)?;
                        report.succeeded += 1;
                    }
                    Outcome::Missing(object_ref) => {
                        debug!(catalog, object = %object_ref, "source object gone, skipping");
                        report.skipped += 1;
                    }
                    Outcome::Failed(failure) => {
                        warn!(
                            catalog,
                            object = %failure.object_ref,
                            field = %failure.field,
                            reason = %failure.reason,
                            "extraction failed, keeping previous record"
                        );
                        report.failed.push(failure);
                    }
                }
            }
            committed += batch.len();
            self.checkpoints.save(&ReindexCheckpoint {
                catalog: catalog.to_string(),
                committed,
                total,
            })?;
            report.batches_committed += 1;
            info!(
                catalog,
                processed = committed,
                failed = report.failed.len(),
                remaining = total - committed,
                "batch committed"
            );
        }

        self.checkpoints.clear(catalog)?;
        Ok(report)
    }

    async fn extract_batch(
        &self,
        batch: &[ObjectRef],
        plan: &Arc<Vec<FieldTarget>>,
    ) -> Result<Vec<Outcome>> {
        let workers = self.workers.min(batch.len()).max(1);
        let chunk_size = batch.len().div_ceil(workers);
        let mut tasks = Vec::with_capacity(workers);
        for chunk in batch.chunks(chunk_size) {
            let source = Arc::clone(&self.source);
            let indexers = self.indexers.clone();
            let plan = Arc::clone(plan);
            let refs: Vec<ObjectRef> = chunk.to_vec();
            tasks.push(tokio::spawn(async move {
                refs.into_iter()
                    .map(|object_ref| {
                        extract_object(source.as_ref(), &indexers, &plan, object_ref)
                    })
                    .collect::<Vec<Outcome>>()
            }));
        }
        let mut outcomes = Vec::with_capacity(batch.len());
        for joined in join_all(tasks).await {
            let chunk_outcomes = joined
                .map_err(|e| CatalogError::Execution(format!("extraction worker failed: {e}")))?;
            outcomes.extend(chunk_outcomes);
        }
        Ok(outcomes)
    }
}

fn extract_object(
    source: &dyn ObjectSource,
    indexers: &IndexerRegistry,
    plan: &[FieldTarget],
    object_ref: ObjectRef,
) -> Outcome {
    let Some(object) = source.get(&object_ref) else {
        return Outcome::Missing(object_ref);
    };
    let mut index_values = BTreeMap::new();
    let mut metadata = BTreeMap::new();
    for target in plan {
        match indexers.extract(&target.name, &object) {
            Ok(value) => {
                if target.is_index {
                    index_values.insert(target.name.clone(), value.clone());
                }
                if target.is_column {
                    metadata.insert(target.name.clone(), value);
                }
            }
            Err(CatalogError::Extraction { field, reason }) => {
                return Outcome::Failed(ExtractionFailure {
                    object_ref,
                    field,
                    reason,
                });
            }
            Err(other) => {
                return Outcome::Failed(ExtractionFailure {
                    object_ref,
                    field: target.name.clone(),
                    reason: other.to_string(),
                });
            }
        }
    }
    Outcome::Updated {
        object_ref,
        index_values,
        metadata,
    }
}
