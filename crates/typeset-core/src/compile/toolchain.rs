//! Locating the external tools the pipeline shells out to.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{Error, Result};

use super::types::CompilerConfig;

/// The resolved typst compiler.
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// Path to the compiler binary
    typst_path: PathBuf,
}

impl Toolchain {
    /// Resolve the compiler named in `config`.
    ///
    /// # Errors
    /// Returns [`Error::Toolchain`] if the binary cannot be found.
    pub fn detect(config: &CompilerConfig) -> Result<Self> {
        let typst_path = resolve_program(&config.typst_path)?;
        tracing::debug!(path = %typst_path.display(), "Resolved typst compiler");
        Ok(Self { typst_path })
    }

    /// Use `path` as the compiler without checking that it exists.
    ///
    /// Launch failures then surface per job as
    /// [`JobStatus::LaunchFailed`](super::JobStatus::LaunchFailed).
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            typst_path: path.into(),
        }
    }

    /// Get the compiler path.
    pub fn typst_path(&self) -> &Path {
        &self.typst_path
    }

    /// Ask the compiler for its version string.
    pub async fn query_version(&self) -> Result<String> {
        program_version(&self.typst_path).await
    }
}

/// Resolve a program name or path to an existing executable.
///
/// Names without a path separator are looked up on PATH; anything else is
/// taken relative to the working directory.
pub(crate) fn resolve_program(program: &Path) -> Result<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        if program.is_file() {
            return Ok(program.to_path_buf());
        }
        return Err(Error::Toolchain(format!(
            "{} does not exist",
            program.display()
        )));
    }

    which::which(program).map_err(|_| {
        Error::Toolchain(format!("{} not found in PATH", program.display()))
    })
}

/// Run `<program> --version` and return its first output line.
pub(crate) async fn program_version(program: &Path) -> Result<String> {
    let output = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| {
            Error::Toolchain(format!("failed to run {}: {}", program.display(), e))
        })?;

    if !output.status.success() {
        return Err(Error::Toolchain(format!(
            "{} --version exited with {}",
            program.display(),
            output.status
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::write_script;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_detect_explicit_path() {
        let dir = TempDir::new().unwrap();
        let script = write_script(dir.path(), "typst", "echo 'typst 0.13.1 (8ace67d9)'\n");

        let config = CompilerConfig {
            typst_path: script.clone(),
            ..Default::default()
        };
        let toolchain = Toolchain::detect(&config).unwrap();
        assert_eq!(toolchain.typst_path(), script.as_path());
        assert_eq!(toolchain.query_version().await.unwrap(), "typst 0.13.1 (8ace67d9)");
    }

    #[test]
    fn test_detect_missing_path() {
        let dir = TempDir::new().unwrap();
        let config = CompilerConfig {
            typst_path: dir.path().join("no-such-typst"),
            ..Default::default()
        };
        let err = Toolchain::detect(&config).unwrap_err();
        assert!(matches!(err, Error::Toolchain(_)));
    }

    #[test]
    fn test_detect_missing_on_path() {
        let config = CompilerConfig {
            typst_path: PathBuf::from("typst-definitely-not-installed-here"),
            ..Default::default()
        };
        let err = Toolchain::detect(&config).unwrap_err();
        assert!(err.to_string().contains("not found in PATH"));
    }

    #[tokio::test]
    async fn test_version_of_failing_program() {
        let dir = TempDir::new().unwrap();
        let script = write_script(dir.path(), "broken", "exit 2\n");
        assert!(program_version(&script).await.is_err());
    }
}
