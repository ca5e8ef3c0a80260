//! Compilation pipeline for extracted snippets.
//!
//! This module provides:
//! - Configuration (compiler, prelude, concurrency and time limits)
//! - Toolchain detection (locating the `typst` binary)
//! - The orchestrator running one compiler process per snippet
//!
//! # Architecture
//!
//! ```text
//! [Snippet]
//!     │
//!     └── CompileOrchestrator ──► in{i}.typ (prelude + source)
//!               │
//!               ├── typst compile (one process per snippet, bounded)
//!               │
//!               └── join all ──► [JobReport] ──► [JobStatus]
//! ```

mod orchestrator;
mod toolchain;
mod types;

pub use orchestrator::CompileOrchestrator;
pub use toolchain::Toolchain;
pub(crate) use toolchain::{program_version, resolve_program};
pub use types::{CompileJob, CompilerConfig, JobReport, JobStatus, Prelude, format_statuses};
