//! Durable MessagePack snapshots of the catalog set.

use super::catalog::Catalog;
use crate::core::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// On-disk image of every catalog plus a little bookkeeping.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub format_version: u32,
    pub catalogs: BTreeMap<String, Catalog>,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: u64,
    pub record_count: usize,
    pub catalog_count: usize,
}

impl StoreSnapshot {
    pub fn new(catalogs: BTreeMap<String, Catalog>) -> Self {
        let record_count = catalogs.values().map(Catalog::len).sum();
        let catalog_count = catalogs.len();
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            format_version: 1,
            catalogs,
            metadata: SnapshotMetadata {
                created_at,
                record_count,
                catalog_count,
            },
        }
    }
}

/// Writes snapshots atomically: serialize to a sibling temp file, sync,
/// then rename over the live file so a crash never leaves a torn image.
pub struct SnapshotManager {
    snapshot_path: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    pub fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        if let Some(parent) = self.snapshot_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = self.snapshot_path.with_extension("tmp");
        let temp_file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(temp_file);
        let serialized = rmp_serde::to_vec(snapshot)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;
        writer.write_all(&serialized)?;
        writer.flush()?;
        writer.get_mut().sync_all()?;
        fs::rename(&temp_path, &self.snapshot_path)?;
        info!(
            path = %self.snapshot_path.display(),
            catalogs = snapshot.metadata.catalog_count,
            records = snapshot.metadata.record_count,
            "snapshot written"
        );
        Ok(())
    }

    pub fn load(&self) -> Result<Option<StoreSnapshot>> {
        if !self.snapshot_path.exists() {
            return Ok(None);
        }
        let mut file = File::open(&self.snapshot_path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        let snapshot: StoreSnapshot = rmp_serde::from_slice(&data)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;
        Ok(Some(snapshot))
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path.exists()
    }

    pub fn delete(&self) -> Result<()> {
        if self.snapshot_path.exists() {
            fs::remove_file(&self.snapshot_path)?;
        }
        Ok(())
    }
}
