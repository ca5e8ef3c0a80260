//! Gathering rendered pages from a finished request.
//!
//! After every compile job succeeded, the workspace is scanned for files
//! with the output extension. Each one is trimmed to its content plus a
//! small uniform border (in place, through ImageMagick's `mogrify`, one
//! page after another) and returned as an [`Artifact`].
//!
//! Artifacts are ordered by the job index and page number encoded in their
//! file names (`out{index}-{page}.png`), not by directory enumeration order,
//! so `artifacts` line up with the snippets that produced them.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::compile::{program_version, resolve_program};
use crate::error::{Error, Result};
use crate::workspace::Workspace;

/// Settings for the trimming post-processor.
#[derive(Debug, Clone)]
pub struct TrimConfig {
    /// `mogrify` binary, looked up on PATH unless it contains a separator
    pub program: PathBuf,

    /// Colour of the added border
    pub border_color: String,

    /// Border width in pixels
    pub border: u32,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("mogrify"),
            border_color: "white".to_string(),
            border: 3,
        }
    }
}

/// Trims uniform margins off an image and adds a border, in place.
#[derive(Debug, Clone)]
pub struct Trimmer {
    program: PathBuf,
    border_color: String,
    border: u32,
}

impl Trimmer {
    /// Resolve the trimming program named in `config`.
    ///
    /// # Errors
    /// Returns [`Error::Toolchain`] if the program cannot be found.
    pub fn new(config: &TrimConfig) -> Result<Self> {
        let program = resolve_program(&config.program)?;
        tracing::debug!(path = %program.display(), "Resolved trimming program");
        Ok(Self {
            program,
            border_color: config.border_color.clone(),
            border: config.border,
        })
    }

    /// Get the program path.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Ask the program for its version string.
    pub async fn query_version(&self) -> Result<String> {
        program_version(&self.program).await
    }

    /// Trim `path` and add the border.
    ///
    /// Applying it again to its own output changes nothing: the border is
    /// uniform, so it is trimmed away and added back.
    pub async fn apply(&self, path: &Path) -> Result<()> {
        let output = Command::new(&self.program)
            .arg("-trim")
            .arg("-bordercolor")
            .arg(&self.border_color)
            .arg("-border")
            .arg(self.border.to_string())
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::PostProcess {
                path: path.to_path_buf(),
                message: format!("failed to run {}: {}", self.program.display(), e),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::PostProcess {
                path: path.to_path_buf(),
                message: format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }
}

/// A rendered page found in the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Snippet the page belongs to; `None` if the file name is foreign
    pub index: Option<usize>,

    /// 1-based page number within the snippet's output
    pub page: Option<usize>,

    /// Location inside the workspace
    pub path: PathBuf,
}

impl Artifact {
    fn from_path(path: PathBuf) -> Self {
        let parsed = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(parse_output_stem);

        Self {
            index: parsed.map(|(index, _)| index),
            page: parsed.map(|(_, page)| page),
            path,
        }
    }

    /// File name of the artifact.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Read the image bytes.
    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path)?)
    }
}

/// Parse `out{index}-{page}` into its two numbers.
fn parse_output_stem(stem: &str) -> Option<(usize, usize)> {
    let rest = stem.strip_prefix("out")?;
    let (index, page) = rest.split_once('-')?;
    Some((index.parse().ok()?, page.parse().ok()?))
}

/// Scans a workspace for rendered pages and post-processes them.
#[derive(Debug, Clone)]
pub struct ResultCollector {
    /// Extension of rendered pages, without the dot
    extension: String,

    /// Post-processor; `None` delivers pages untouched
    trimmer: Option<Trimmer>,
}

impl ResultCollector {
    /// Create a collector for pages with `extension`.
    pub fn new(extension: impl Into<String>, trimmer: Option<Trimmer>) -> Self {
        Self {
            extension: extension.into(),
            trimmer,
        }
    }

    /// Collect every rendered page in `workspace`, ordered by snippet and page.
    ///
    /// Pages are trimmed one after another. A page the trimmer fails on is
    /// logged and delivered untrimmed.
    pub async fn collect(&self, workspace: &Workspace) -> Result<Vec<Artifact>> {
        let mut artifacts = Vec::new();

        for entry in fs::read_dir(workspace.path())? {
            let path = entry?.path();
            let matches = path
                .extension()
                .is_some_and(|ext| ext == self.extension.as_str());
            if matches && path.is_file() {
                artifacts.push(Artifact::from_path(path));
            }
        }

        artifacts.sort_by_key(|a| (a.index.is_none(), a.index, a.page, a.file_name()));

        if let Some(ref trimmer) = self.trimmer {
            for artifact in &artifacts {
                if let Err(e) = trimmer.apply(&artifact.path).await {
                    tracing::warn!(
                        workspace = %workspace.id(),
                        error = %e,
                        "Delivering page untrimmed"
                    );
                }
            }
        }

        tracing::info!(
            workspace = %workspace.id(),
            artifacts = artifacts.len(),
            "Collected images"
        );

        Ok(artifacts)
    }
}
