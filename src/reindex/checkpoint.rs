use crate::core::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Progress marker for a reindex run over one catalog.
///
/// `committed` counts the prefix of the sorted reference list whose
/// batches have been committed. A resumed run re-derives the same sorted
/// list and skips that prefix; `total` guards against resuming against a
/// reference list of a different shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexCheckpoint {
    pub catalog: String,
    pub committed: usize,
    pub total: usize,
}

/// One checkpoint file per catalog under a spool directory, written with
/// the same temp-then-rename discipline as snapshots.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, catalog: &str) -> PathBuf {
        self.dir.join(format!("{}.reindex", catalog))
    }

    pub fn save(&self, checkpoint: &ReindexCheckpoint) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&checkpoint.catalog);
        let temp_path = path.with_extension("reindex.tmp");
        let serialized = rmp_serde::to_vec(checkpoint)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;
        let mut file = File::create(&temp_path)?;
        file.write_all(&serialized)?;
        file.sync_all()?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    pub fn load(&self, catalog: &str) -> Result<Option<ReindexCheckpoint>> {
        let path = self.path_for(catalog);
        if !path.exists() {
            return Ok(None);
        }
        let mut data = Vec::new();
        File::open(&path)?.read_to_end(&mut data)?;
        let checkpoint = rmp_serde::from_slice(&data)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;
        Ok(Some(checkpoint))
    }

    pub fn clear(&self, catalog: &str) -> Result<()> {
        let path = self.path_for(catalog);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_load_clear_cycle() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path());
        let checkpoint = ReindexCheckpoint {
            catalog: "samples".into(),
            committed: 250,
            total: 900,
        };

        store.save(&checkpoint).unwrap();
        assert_eq!(store.load("samples").unwrap().unwrap(), checkpoint);

        store.clear("samples").unwrap();
        assert!(store.load("samples").unwrap().is_none());
        store.clear("samples").unwrap();
    }

    #[test]
    fn checkpoints_are_per_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path());
        store
            .save(&ReindexCheckpoint {
                catalog: "samples".into(),
                committed: 10,
                total: 20,
            })
            .unwrap();
        assert!(store.load("worksheets").unwrap().is_none());
    }
}
