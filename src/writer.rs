//! Physical artifact writer.
//!
//! The render dispatcher and removal cleanup only ever talk to the
//! [`ArtifactWriter`] trait; the filesystem implementation lives here so
//! tests can substitute an in-memory recorder.

use anyhow::{Context, Result};
use std::{fs, io::ErrorKind, path::Path};

/// Persists finished artifacts. `write` creates parent directories as
/// needed; `delete` is best-effort and an absent target is not an error.
pub trait ArtifactWriter {
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;
    fn delete(&self, path: &Path) -> Result<()>;
}

/// Writes artifacts to the local filesystem.
pub struct FsWriter;

impl ArtifactWriter for FsWriter {
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            // Cleanup races with events; the artifact may never have been written
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(anyhow::Error::new(e).context(format!("Failed to delete {}", path.display())))
            }
        }
    }
}
