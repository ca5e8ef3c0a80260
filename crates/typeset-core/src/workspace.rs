//! Per-request scratch directory.
//!
//! Every request gets its own directory holding compiler inputs and
//! rendered pages:
//!
//! ```text
//! typeset-<uuid>XXXXXX/
//! ├── in0.typ         # prelude + snippet 0
//! ├── in1.typ
//! ├── out0-1.png      # snippet 0, page 1
//! └── out1-1.png
//! ```
//!
//! The directory is removed when the [`Workspace`] is dropped, whether the
//! request succeeded or not.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Exclusively owned, disposable storage for one request.
#[derive(Debug)]
pub struct Workspace {
    /// Identifier used to correlate log lines for the request.
    id: Uuid,
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace under the system temporary directory.
    pub fn acquire() -> Result<Self> {
        Self::acquire_in(std::env::temp_dir())
    }

    /// Create a fresh workspace under `parent`.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn acquire_in(parent: impl AsRef<Path>) -> Result<Self> {
        let parent = parent.as_ref();
        let id = Uuid::new_v4();
        let dir = tempfile::Builder::new()
            .prefix(&format!("typeset-{}", id.simple()))
            .tempdir_in(parent)
            .map_err(|e| {
                Error::Workspace(format!(
                    "failed to create workspace under {}: {}",
                    parent.display(),
                    e
                ))
            })?;

        tracing::debug!(workspace = %id, path = %dir.path().display(), "Acquired workspace");
        Ok(Self { id, dir })
    }

    /// Root directory of the workspace.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Request identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Compiler input file for a snippet.
    pub fn input_path(&self, index: usize) -> PathBuf {
        self.path().join(format!("in{index}.typ"))
    }

    /// Compiler output pattern for a snippet; `{p}` is the page number.
    pub fn output_pattern(&self, index: usize, extension: &str) -> PathBuf {
        self.path().join(format!("out{index}-{{p}}.{extension}"))
    }

    /// Remove the workspace now, reporting failures instead of ignoring them.
    pub fn release(self) -> Result<()> {
        let id = self.id;
        self.dir.close().map_err(|e| {
            Error::Workspace(format!("failed to remove workspace {}: {}", id, e))
        })?;
        tracing::debug!(workspace = %id, "Released workspace");
        Ok(())
    }
}
