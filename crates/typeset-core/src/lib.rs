//! Core engine for rendering typst snippets embedded in chat text.
//!
//! This crate provides:
//! - Snippet extraction from fenced blocks and inline math spans
//! - Disposable per-request workspaces
//! - Concurrent compilation through the external `typst` compiler
//! - Collection and trimming of the rendered pages

pub mod collect;
pub mod compile;
pub mod error;
pub mod execute;
pub mod extract;
pub mod pipeline;
pub mod workspace;

#[cfg(all(test, unix))]
pub(crate) mod test_support;

pub use collect::{Artifact, ResultCollector, TrimConfig, Trimmer};
pub use compile::{CompileOrchestrator, CompilerConfig, JobReport, JobStatus, Prelude, Toolchain};
pub use error::{Error, Result};
pub use execute::{AbortHandle, CompileCallback};
pub use extract::{Origin, Snippet, extract};
pub use pipeline::{Outcome, RenderedImage, Typesetter};
pub use workspace::Workspace;
