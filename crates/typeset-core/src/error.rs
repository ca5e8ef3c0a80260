//! Error types for typeset-core.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for typeset-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in typeset-core.
///
/// Malformed delimiters and failing compile jobs are deliberately absent:
/// the former degrade to an empty extraction, the latter are reported
/// through [`crate::pipeline::Outcome::Failure`].
#[derive(Debug, Error)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An external tool could not be located or queried.
    #[error("toolchain error: {0}")]
    Toolchain(String),

    /// The request workspace could not be created or released.
    #[error("workspace error: {0}")]
    Workspace(String),

    /// Post-processing of a rendered image failed.
    #[error("post-processing failed for {}: {message}", path.display())]
    PostProcess { path: PathBuf, message: String },

    /// Two snippets of one request carry the same index.
    #[error("duplicate snippet index {0}")]
    DuplicateSnippet(usize),

    /// The request was aborted before it could complete.
    #[error("request aborted")]
    Aborted,
}

impl Error {
    /// Render the error together with a hint on how to recover from it.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Self::Toolchain(_) => {
                Some("install typst (and ImageMagick for trimming) and make sure both are on PATH")
            }
            Self::Workspace(_) => Some("check that the temporary directory is writable"),
            Self::PostProcess { .. } => Some("pass --no-trim to skip image trimming"),
            Self::Io(_) | Self::DuplicateSnippet(_) | Self::Aborted => None,
        };

        match hint {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }
}
