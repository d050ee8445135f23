use std::path::{Path, PathBuf};

/// Engine configuration
///
/// Controls where durable state lives and how reindex runs are sized.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding the snapshot, checkpoints and the version file
    pub data_dir: PathBuf,

    /// Objects per committed reindex batch
    pub batch_size: usize,

    /// Bounded worker pool size for extraction
    pub workers: usize,

    /// Name of the keyword index holding security tokens
    pub security_index: String,

    /// Version adopted when no version file exists yet
    pub initial_version: u32,
}

impl EngineConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            batch_size: 250,
            workers: 4,
            security_index: "allowed_principals".to_string(),
            initial_version: 0,
        }
    }

    /// Set the reindex batch size
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the extraction worker count
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the security index name
    pub fn security_index(mut self, name: &str) -> Self {
        self.security_index = name.to_string();
        self
    }

    /// Set the version used before any step has run
    pub fn initial_version(mut self, version: u32) -> Self {
        self.initial_version = version;
        self
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("catalogs.snapshot")
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.data_dir.join("checkpoints")
    }

    pub fn version_path(&self) -> PathBuf {
        self.data_dir.join("profile.version")
    }
}
