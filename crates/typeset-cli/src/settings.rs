//! Command line flags shared by every subcommand.
//!
//! The flags are mapped onto the core's [`CompilerConfig`] and
//! [`TrimConfig`]; anything not given keeps the core default.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use typeset_core::{CompilerConfig, Prelude, TrimConfig};

#[derive(Args, Debug, Clone, Default)]
pub struct Settings {
    /// typst compiler to run (name on PATH or a path)
    #[arg(long, global = true, value_name = "PATH")]
    pub typst: Option<PathBuf>,

    /// mogrify binary used to trim rendered pages
    #[arg(long, global = true, value_name = "PATH")]
    pub mogrify: Option<PathBuf>,

    /// Deliver pages untrimmed and skip looking for mogrify
    #[arg(long, global = true)]
    pub no_trim: bool,

    /// Maximum number of concurrent compiler processes
    #[arg(short, long, global = true, value_name = "N")]
    pub jobs: Option<usize>,

    /// Per-snippet time limit in seconds (0 disables)
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Time limit for a whole request in seconds (0 disables)
    #[arg(long, global = true, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// Replace the built-in prelude with the contents of a file
    #[arg(long, global = true, value_name = "PATH")]
    pub prelude_file: Option<PathBuf>,

    /// Pixels per inch of rendered pages
    #[arg(long, global = true, value_name = "N")]
    pub ppi: Option<u32>,
}

impl Settings {
    /// Build the compiler configuration.
    ///
    /// Reads the prelude file if one was given.
    pub fn compiler_config(&self) -> typeset_core::Result<CompilerConfig> {
        let mut config = CompilerConfig::default();

        if let Some(ref path) = self.typst {
            config.typst_path = path.clone();
        }
        if let Some(ref path) = self.prelude_file {
            config.prelude = Prelude::from_file(path)?;
        }
        if let Some(jobs) = self.jobs {
            config.max_concurrency = jobs.max(1);
        }
        if let Some(secs) = self.timeout {
            config.job_timeout = limit(secs);
        }
        if let Some(secs) = self.deadline {
            config.request_deadline = limit(secs);
        }
        config.ppi = self.ppi;

        Ok(config)
    }

    /// Build the trimming configuration; `None` with `--no-trim`.
    pub fn trim_config(&self) -> Option<TrimConfig> {
        if self.no_trim {
            return None;
        }

        let mut config = TrimConfig::default();
        if let Some(ref path) = self.mogrify {
            config.program = path.clone();
        }
        Some(config)
    }
}

fn limit(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
