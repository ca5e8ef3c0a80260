//! Concurrent compilation of a request's snippets.
//!
//! Every snippet becomes one `typst compile` process. Launches happen in
//! snippet order without waiting on each other (up to `max_concurrency` at
//! a time) and the request then waits for all of them:
//!
//! ```text
//! snippets ──► in{i}.typ ──► typst compile ... in{i}.typ out{i}-{p}.png ─┐
//!                                                                       ├──► join all ──► [JobStatus]
//!                        ──► typst compile ... in{j}.typ out{j}-{p}.png ─┘
//! ```
//!
//! A failing job never stops the others. Jobs that outlive their timeout
//! or the request deadline, or are still running when the request is
//! aborted, are killed.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, Command};
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::execute::{AbortHandle, CompileCallback};
use crate::extract::Snippet;
use crate::error::{Error, Result};
use crate::workspace::Workspace;

use super::toolchain::Toolchain;
use super::types::{CompileJob, CompilerConfig, JobReport, JobStatus};

/// Launches and awaits one compiler process per snippet.
pub struct CompileOrchestrator {
    /// Compiler configuration
    config: CompilerConfig,

    /// Resolved compiler
    toolchain: Toolchain,

    /// Progress observer
    callback: Option<Arc<dyn CompileCallback>>,
}

/// How long stderr is still drained after the compiler exited.
///
/// A process the compiler left behind may keep the pipe open indefinitely.
const STDERR_GRACE: Duration = Duration::from_millis(500);

/// How waiting on a launched process ended.
enum Waited {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

impl CompileOrchestrator {
    /// Create a new orchestrator.
    pub fn new(config: CompilerConfig, toolchain: Toolchain) -> Self {
        Self {
            config,
            toolchain,
            callback: None,
        }
    }

    /// Set the progress callback.
    pub fn set_callback(&mut self, callback: impl CompileCallback + 'static) {
        self.callback = Some(Arc::new(callback));
    }

    /// Get the configuration.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile every snippet and return one status per snippet, in order.
    pub async fn compile(
        &self,
        workspace: &Workspace,
        snippets: &[Snippet],
        abort: &AbortHandle,
    ) -> Result<Vec<JobStatus>> {
        let reports = self.run_jobs(workspace, snippets, abort).await?;
        Ok(reports.into_iter().map(|report| report.status).collect())
    }

    /// Compile every snippet and return one full report per snippet, in order.
    ///
    /// # Errors
    /// Fails if two snippets share an index or an input file cannot be
    /// written; compiler failures are reported through [`JobStatus`].
    pub async fn run_jobs(
        &self,
        workspace: &Workspace,
        snippets: &[Snippet],
        abort: &AbortHandle,
    ) -> Result<Vec<JobReport>> {
        let started = Instant::now();
        let deadline = self.config.request_deadline.map(|limit| started + limit);

        let jobs = self.write_inputs(workspace, snippets)?;
        let permits = Semaphore::new(self.config.max_concurrency.clamp(1, Semaphore::MAX_PERMITS));

        tracing::info!(
            workspace = %workspace.id(),
            jobs = jobs.len(),
            "Typesetting"
        );

        let reports = join_all(
            jobs.into_iter()
                .map(|job| self.run_job(job, workspace.path(), &permits, deadline, abort)),
        )
        .await;

        let failed = reports.iter().filter(|r| !r.status.is_success()).count();
        tracing::info!(
            workspace = %workspace.id(),
            jobs = reports.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Typesetting finished"
        );

        Ok(reports)
    }

    /// Write prelude + source for every snippet into the workspace.
    ///
    /// Files are named by the snippet's own index, which must be unique
    /// within the request.
    fn write_inputs(&self, workspace: &Workspace, snippets: &[Snippet]) -> Result<Vec<CompileJob>> {
        let prelude = self.config.prelude.as_str();

        let mut seen = HashSet::with_capacity(snippets.len());
        if let Some(snippet) = snippets.iter().find(|s| !seen.insert(s.index)) {
            return Err(Error::DuplicateSnippet(snippet.index));
        }

        snippets
            .iter()
            .map(|snippet| {
                let job = CompileJob {
                    index: snippet.index,
                    input_path: workspace.input_path(snippet.index),
                    output_pattern: workspace.output_pattern(snippet.index, &self.config.format),
                };

                let mut source = String::with_capacity(prelude.len() + snippet.text.len());
                source.push_str(prelude);
                source.push_str(&snippet.text);
                fs::write(&job.input_path, source)?;

                Ok(job)
            })
            .collect()
    }

    /// Run one job to a final status.
    async fn run_job(
        &self,
        job: CompileJob,
        root: &Path,
        permits: &Semaphore,
        deadline: Option<Instant>,
        abort: &AbortHandle,
    ) -> JobReport {
        let started = Instant::now();
        let report = |status: JobStatus, stderr: String| JobReport {
            index: job.index,
            status,
            stderr,
            elapsed: started.elapsed(),
        };

        let _permit = tokio::select! {
            biased;
            _ = abort.aborted() => return self.finish(report(JobStatus::Cancelled, String::new())),
            _ = expire(deadline) => return self.finish(report(JobStatus::TimedOut, String::new())),
            permit = permits.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => return self.finish(report(JobStatus::Cancelled, String::new())),
            },
        };

        let mut child = match self.command(&job, root).spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(
                    job = job.index,
                    compiler = %self.toolchain.typst_path().display(),
                    error = %e,
                    "Failed to launch compiler"
                );
                return self.finish(report(JobStatus::LaunchFailed(e.to_string()), String::new()));
            }
        };

        tracing::debug!(job = job.index, input = %job.input_path.display(), "Compiler launched");
        if let Some(ref callback) = self.callback {
            callback.on_job_started(job.index);
        }

        let limit = earliest(
            self.config.job_timeout.map(|timeout| Instant::now() + timeout),
            deadline,
        );
        let mut pipe = child.stderr.take();
        let mut captured = Vec::new();
        let mut chunk = [0u8; 4096];
        let mut exited = None;
        let mut drain_until = None;

        // The exit status is final as soon as the compiler exits; stderr is
        // only drained for a short grace period after that.
        let waited = loop {
            tokio::select! {
                status = child.wait(), if exited.is_none() => {
                    exited = Some(status);
                    drain_until = Some(Instant::now() + STDERR_GRACE);
                }
                read = read_chunk(&mut pipe, &mut chunk), if pipe.is_some() => match read {
                    Ok(n) if n > 0 => captured.extend_from_slice(&chunk[..n]),
                    Ok(_) => pipe = None,
                    Err(e) => {
                        tracing::debug!(job = job.index, error = %e, "Failed to read compiler stderr");
                        pipe = None;
                    }
                },
                _ = expire(drain_until) => {
                    tracing::debug!(job = job.index, "Compiler exited but stderr is still open");
                    pipe = None;
                }
                _ = expire(limit), if exited.is_none() => break Waited::TimedOut,
                _ = abort.aborted(), if exited.is_none() => break Waited::Cancelled,
            }

            if pipe.is_none() {
                if let Some(status) = exited.take() {
                    break Waited::Exited(status);
                }
            }
        };
        let stderr = String::from_utf8_lossy(&captured).into_owned();

        let status = match waited {
            Waited::Exited(Ok(status)) => match status.code() {
                Some(code) => JobStatus::Exited(code),
                None => JobStatus::Signaled,
            },
            Waited::Exited(Err(e)) => JobStatus::LaunchFailed(e.to_string()),
            Waited::TimedOut => {
                tracing::warn!(job = job.index, "Compiler exceeded its time limit, killing it");
                if let Err(e) = child.kill().await {
                    tracing::warn!(job = job.index, error = %e, "Failed to kill compiler");
                }
                JobStatus::TimedOut
            }
            Waited::Cancelled => {
                tracing::warn!(job = job.index, "Request aborted, killing compiler");
                if let Err(e) = child.kill().await {
                    tracing::warn!(job = job.index, error = %e, "Failed to kill compiler");
                }
                JobStatus::Cancelled
            }
        };

        if !stderr.is_empty() {
            tracing::debug!(job = job.index, stderr = %stderr.trim_end(), "Compiler diagnostics");
        }

        self.finish(report(status, stderr))
    }

    /// Log and announce a finished job.
    fn finish(&self, report: JobReport) -> JobReport {
        tracing::debug!(
            job = report.index,
            status = %report.status,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Compile job finished"
        );
        if let Some(ref callback) = self.callback {
            callback.on_job_finished(&report);
        }
        report
    }

    /// Build the compiler command for a job.
    fn command(&self, job: &CompileJob, root: &Path) -> Command {
        let mut cmd = Command::new(self.toolchain.typst_path());

        cmd.arg("compile")
            .arg("--format")
            .arg(&self.config.format)
            .arg("--root")
            .arg(root);

        if let Some(ppi) = self.config.ppi {
            cmd.arg("--ppi").arg(ppi.to_string());
        }

        cmd.args(&self.config.extra_args)
            .arg(&job.input_path)
            .arg(&job.output_pattern)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }
}

/// Resolve at `at`, or never.
async fn expire(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// The earlier of two optional instants.
fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Read the next chunk of a compiler's stderr; pending once it is closed.
async fn read_chunk(pipe: &mut Option<ChildStderr>, buf: &mut [u8]) -> std::io::Result<usize> {
    match pipe {
        Some(pipe) => pipe.read(buf).await,
        None => std::future::pending().await,
    }
}
