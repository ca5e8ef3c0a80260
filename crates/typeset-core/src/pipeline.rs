//! End-to-end request handling: text in, images or a failure report out.
//!
//! ```text
//! text ──► extract ──► [Snippet] ──► CompileOrchestrator ──► [JobReport]
//!                                        (workspace)             │
//!                          all exited 0 ◄────────────────────────┤
//!                               │                                └─► Outcome::Failure
//!                               └─► ResultCollector ──► Outcome::Success([RenderedImage])
//! ```
//!
//! The workspace only lives for the duration of one call; images are read
//! into memory before it is removed.

use std::path::PathBuf;

use crate::collect::{Artifact, ResultCollector, TrimConfig, Trimmer};
use crate::compile::{CompileOrchestrator, CompilerConfig, JobReport, JobStatus, Prelude, Toolchain};
use crate::error::{Error, Result};
use crate::execute::{AbortHandle, CompileCallback};
use crate::extract::{Snippet, extract};
use crate::workspace::Workspace;

/// A rendered page, detached from the workspace it was produced in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    /// Snippet the page belongs to, if known
    pub index: Option<usize>,

    /// 1-based page number, if known
    pub page: Option<usize>,

    /// File name the page had in the workspace
    pub file_name: String,

    /// Encoded image
    pub data: Vec<u8>,
}

impl RenderedImage {
    fn load(artifact: &Artifact) -> Result<Self> {
        Ok(Self {
            index: artifact.index,
            page: artifact.page,
            file_name: artifact.file_name(),
            data: artifact.read()?,
        })
    }
}

/// Result of a request that got as far as compiling.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Every job exited 0; the rendered pages in snippet/page order.
    Success(Vec<RenderedImage>),

    /// At least one job did not exit 0; one report per snippet, in order.
    Failure(Vec<JobReport>),
}

impl Outcome {
    /// Returns true for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Job statuses of a failed request; empty on success.
    pub fn statuses(&self) -> Vec<&JobStatus> {
        match self {
            Self::Success(_) => Vec::new(),
            Self::Failure(reports) => reports.iter().map(|r| &r.status).collect(),
        }
    }
}

/// Drives extraction, compilation and collection for one request at a time.
pub struct Typesetter {
    orchestrator: CompileOrchestrator,
    collector: ResultCollector,
    /// Parent directory for workspaces; system temp dir if unset
    workspace_root: Option<PathBuf>,
}

impl Typesetter {
    /// Create a typesetter, resolving the compiler and (optionally) the trimmer.
    ///
    /// # Errors
    /// Returns [`Error::Toolchain`] if an external tool cannot be found.
    pub fn new(config: CompilerConfig, trim: Option<TrimConfig>) -> Result<Self> {
        let toolchain = Toolchain::detect(&config)?;
        let trimmer = trim.as_ref().map(Trimmer::new).transpose()?;
        let collector = ResultCollector::new(config.format.clone(), trimmer);
        Ok(Self::from_parts(
            CompileOrchestrator::new(config, toolchain),
            collector,
        ))
    }

    /// Assemble a typesetter from already configured components.
    pub fn from_parts(orchestrator: CompileOrchestrator, collector: ResultCollector) -> Self {
        Self {
            orchestrator,
            collector,
            workspace_root: None,
        }
    }

    /// Create workspaces under `root` instead of the system temp dir.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// Set the progress callback for compile jobs.
    pub fn set_callback(&mut self, callback: impl CompileCallback + 'static) {
        self.orchestrator.set_callback(callback);
    }

    /// The prelude prepended to every snippet.
    pub fn prelude(&self) -> &Prelude {
        &self.orchestrator.config().prelude
    }

    /// Render every snippet found in `text`.
    ///
    /// Returns `None` when the text contains no snippet; nothing is
    /// compiled in that case.
    pub async fn render(&self, text: &str, abort: &AbortHandle) -> Result<Option<Outcome>> {
        tracing::debug!(message = %text, "Got a message");

        let snippets = extract(text);
        if snippets.is_empty() {
            return Ok(None);
        }

        self.render_snippets(&snippets, abort).await.map(Some)
    }

    /// Compile `snippets` and collect their pages.
    ///
    /// # Errors
    /// Returns [`Error::Aborted`] if `abort` fired before compilation
    /// started, and IO errors from the workspace. Compiler failures are an
    /// [`Outcome::Failure`], not an error.
    pub async fn render_snippets(
        &self,
        snippets: &[Snippet],
        abort: &AbortHandle,
    ) -> Result<Outcome> {
        if abort.is_aborted() {
            return Err(Error::Aborted);
        }

        let workspace = match self.workspace_root {
            Some(ref root) => Workspace::acquire_in(root)?,
            None => Workspace::acquire()?,
        };

        tracing::info!(
            workspace = %workspace.id(),
            snippets = snippets.len(),
            "Writing sources"
        );
        let reports = self.orchestrator.run_jobs(&workspace, snippets, abort).await?;

        let outcome = if reports.iter().all(|r| r.status.is_success()) {
            let images = self
                .collector
                .collect(&workspace)
                .await?
                .iter()
                .map(RenderedImage::load)
                .collect::<Result<Vec<_>>>()?;
            Outcome::Success(images)
        } else {
            Outcome::Failure(reports)
        };

        let id = workspace.id();
        if let Err(e) = workspace.release() {
            tracing::warn!(workspace = %id, error = %e, "Failed to release workspace");
        }
        tracing::info!(workspace = %id, success = outcome.is_success(), "Done");

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_statuses() {
        let failure = Outcome::Failure(vec![
            JobReport {
                index: 0,
                status: JobStatus::Exited(0),
                stderr: String::new(),
                elapsed: std::time::Duration::ZERO,
            },
            JobReport {
                index: 1,
                status: JobStatus::Exited(1),
                stderr: "error: unknown variable".to_string(),
                elapsed: std::time::Duration::ZERO,
            },
        ]);
        assert!(!failure.is_success());
        assert_eq!(
            failure.statuses(),
            vec![&JobStatus::Exited(0), &JobStatus::Exited(1)]
        );

        let success = Outcome::Success(Vec::new());
        assert!(success.is_success());
        assert!(success.statuses().is_empty());
    }

    #[test]
    fn test_new_fails_without_compiler() {
        let config = CompilerConfig {
            typst_path: PathBuf::from("typst-definitely-not-installed-here"),
            ..Default::default()
        };
        let err = Typesetter::new(config, None).err().unwrap();
        assert!(matches!(err, Error::Toolchain(_)));
    }
}
