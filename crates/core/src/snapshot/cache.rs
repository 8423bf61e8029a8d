use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::models::Envelope;

/// File name of the persisted snapshot inside the cache root.
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// Last-known-good envelope persisted between runs.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    path: PathBuf,
}

impl SnapshotCache {
    /// Cache stored at `cache_root/snapshot.json`.
    pub fn new(cache_root: impl AsRef<Path>) -> Self {
        Self {
            path: cache_root.as_ref().join(SNAPSHOT_FILE),
        }
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached envelope, returning `None` if nothing was persisted yet.
    pub fn load(&self) -> Result<Option<Envelope>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read snapshot {}", self.path.display()))?;
        let envelope: Envelope = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse snapshot {}", self.path.display()))?;
        envelope
            .validate()
            .with_context(|| format!("cached snapshot {} is invalid", self.path.display()))?;
        Ok(Some(envelope))
    }

    /// Persist `envelope`, replacing the previous file in one rename.
    pub fn persist(&self, envelope: &Envelope) -> Result<()> {
        let parent = self
            .path
            .parent()
            .context("snapshot path has no parent directory")?;
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create cache directory {}", parent.display()))?;

        let serialized =
            serde_json::to_vec_pretty(envelope).context("failed to serialize snapshot")?;
        let mut file = NamedTempFile::new_in(parent)
            .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
        file.write_all(&serialized)
            .context("failed to write snapshot contents")?;
        file.persist(&self.path)
            .with_context(|| format!("failed to write snapshot {}", self.path.display()))?;
        Ok(())
    }
}
