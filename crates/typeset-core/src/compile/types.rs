//! Common types for the compilation pipeline.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::error::Result;

/// Macros available to every snippet.
const DEFAULT_PRELUDE: &str = r#"
#let tr(body) = $"Tr"(#body)$
#let det(body) = $"Det"(#body)$

#let bra(body) = $chevron.l #body|$
#let ket(body) = $|#body chevron.r$
#let braket(part1, part2) = $chevron.l #part1|#part2 chevron.r$
"#;

/// Source block prepended to every compiled input.
///
/// Cheap to clone; all jobs of a request share the same buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prelude(Arc<str>);

impl Prelude {
    /// Use `source` as the prelude.
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self(source.into())
    }

    /// A prelude that adds nothing.
    pub fn empty() -> Self {
        Self::new("")
    }

    /// Read the prelude from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(fs::read_to_string(path)?))
    }

    /// The prelude source.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Prelude {
    fn default() -> Self {
        Self::new(DEFAULT_PRELUDE)
    }
}

impl fmt::Display for Prelude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration for the compile orchestrator.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Compiler binary, looked up on PATH unless it contains a separator
    pub typst_path: PathBuf,

    /// Output format passed to `--format`; also the artifact extension
    pub format: String,

    /// Prepended to every snippet
    pub prelude: Prelude,

    /// Raster resolution in pixels per inch
    pub ppi: Option<u32>,

    /// Additional compiler flags, placed before the input path
    pub extra_args: Vec<String>,

    /// Upper bound on concurrently running compiler processes
    pub max_concurrency: usize,

    /// Per-job limit, measured from process launch
    pub job_timeout: Option<Duration>,

    /// Limit for the whole compile stage of a request
    pub request_deadline: Option<Duration>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            typst_path: PathBuf::from("typst"),
            format: "png".to_string(),
            prelude: Prelude::default(),
            ppi: None,
            extra_args: Vec::new(),
            max_concurrency: Self::default_concurrency(),
            job_timeout: Some(Duration::from_secs(30)),
            request_deadline: Some(Duration::from_secs(60)),
        }
    }
}

impl CompilerConfig {
    /// One compiler process per available core.
    pub fn default_concurrency() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// Config without concurrency bound, timeout or deadline.
    pub fn unbounded() -> Self {
        Self {
            max_concurrency: usize::MAX,
            job_timeout: None,
            request_deadline: None,
            ..Default::default()
        }
    }
}

/// One compiler invocation, created per snippet when a request starts.
#[derive(Debug, Clone)]
pub struct CompileJob {
    /// Position of the snippet in the request
    pub index: usize,

    /// Prelude + snippet source
    pub input_path: PathBuf,

    /// Output path with the `{p}` page placeholder
    pub output_pattern: PathBuf,
}

/// Final status of a compile job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// The compiler exited with this code.
    Exited(i32),

    /// The compiler was terminated without an exit code.
    Signaled,

    /// The job hit its timeout or the request deadline and was killed.
    TimedOut,

    /// The request was aborted and the job was killed or never launched.
    Cancelled,

    /// The compiler could not be launched or awaited.
    LaunchFailed(String),
}

impl JobStatus {
    /// Returns true if the compiler exited with status 0.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "{code}"),
            Self::Signaled => f.write_str("signal"),
            Self::TimedOut => f.write_str("timeout"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::LaunchFailed(_) => f.write_str("launch-failed"),
        }
    }
}

/// Render statuses as a bracketed list, e.g. `[0, 1, timeout]`.
pub fn format_statuses<'a>(statuses: impl IntoIterator<Item = &'a JobStatus>) -> String {
    let items: Vec<String> = statuses.into_iter().map(ToString::to_string).collect();
    format!("[{}]", items.join(", "))
}

/// Result of running one compile job.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    /// Position of the snippet in the request
    pub index: usize,

    /// How the job ended
    pub status: JobStatus,

    /// Everything the compiler wrote to stderr
    pub stderr: String,

    /// Time from job start (including waiting for a slot) to completion
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}
