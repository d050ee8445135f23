use crate::core::{CatalogError, Result, Version};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
struct VersionRecord {
    version: Version,
}

/// The durable currently-applied profile version.
///
/// Advances exactly once per committed step and is never rolled back;
/// recovery after a crash is re-running the chain, whose steps skip
/// themselves once the version has passed them.
#[derive(Debug)]
pub struct UpgradeState {
    path: PathBuf,
    current: RwLock<Version>,
}

impl UpgradeState {
    /// Open the version file, falling back to `initial` when none exists.
    pub fn open<P: AsRef<Path>>(path: P, initial: Version) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let current = if path.exists() {
            let mut data = Vec::new();
            File::open(&path)?.read_to_end(&mut data)?;
            let record: VersionRecord = rmp_serde::from_slice(&data)
                .map_err(|e| CatalogError::Serialization(e.to_string()))?;
            record.version
        } else {
            initial
        };
        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    pub fn current(&self) -> Result<Version> {
        Ok(*self.current.read()?)
    }

    /// Persist then adopt a strictly higher version.
    pub fn advance_to(&self, version: Version) -> Result<()> {
        let mut current = self.current.write()?;
        if version <= *current {
            return Err(CatalogError::Execution(format!(
                "cannot advance version {} to {}",
                *current, version
            )));
        }
        self.persist(version)?;
        let previous = *current;
        *current = version;
        info!(from = previous, to = version, "version advanced");
        Ok(())
    }

    fn persist(&self, version: Version) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = self.path.with_extension("version.tmp");
        let serialized = rmp_serde::to_vec(&VersionRecord { version })
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;
        let mut file = File::create(&temp_path)?;
        file.write_all(&serialized)?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("profile.version");

        let state = UpgradeState::open(&path, 2500).unwrap();
        assert_eq!(state.current().unwrap(), 2500);
        state.advance_to(2501).unwrap();
        drop(state);

        let reopened = UpgradeState::open(&path, 2500).unwrap();
        assert_eq!(reopened.current().unwrap(), 2501);
    }

    #[test]
    fn never_moves_backwards() {
        let temp_dir = TempDir::new().unwrap();
        let state = UpgradeState::open(temp_dir.path().join("profile.version"), 2500).unwrap();
        state.advance_to(2502).unwrap();
        assert!(state.advance_to(2502).is_err());
        assert!(state.advance_to(2501).is_err());
        assert_eq!(state.current().unwrap(), 2502);
    }
}
