//! Render and typeset commands.
//!
//! Drives the core pipeline for one request: read the text, compile every
//! snippet, then either write the pages to the output directory and print
//! `ok`, or print the status list with the compiler diagnostics.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde::Serialize;
use typeset_core::compile::format_statuses;
use typeset_core::{
    AbortHandle, CompileCallback, JobReport, Outcome, RenderedImage, Snippet, Typesetter,
};

use crate::colors;
use crate::input::Input;
use crate::settings::Settings;

/// Delivery options shared by `render` and `typeset`.
#[derive(clap::Args, Debug, Clone)]
pub struct Delivery {
    /// Directory the rendered pages are written to
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Print a JSON report instead of text
    #[arg(long)]
    pub json: bool,
}

/// Prints one line per job to stderr as compilation progresses.
pub struct ProgressCallback;

impl CompileCallback for ProgressCallback {
    fn on_job_started(&self, snippet_index: usize) {
        eprintln!(
            "{}  ▶ Compiling{} snippet {}",
            colors::CYAN,
            colors::RESET,
            snippet_index
        );
    }

    fn on_job_finished(&self, report: &JobReport) {
        let (color, mark) = if report.status.is_success() {
            (colors::GREEN, "✓")
        } else {
            (colors::RED, "✗")
        };
        eprintln!(
            "{}  {}{} snippet {} {}({}, {} ms){}",
            color,
            mark,
            colors::RESET,
            report.index,
            colors::DIM,
            report.status,
            report.elapsed.as_millis(),
            colors::RESET
        );
    }
}

#[derive(Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
enum Report<'a> {
    Empty,
    Ok { images: Vec<PathBuf> },
    Error { status: String, jobs: &'a [JobReport] },
}

/// Render every snippet found in the input text.
pub async fn execute(
    input: &Input,
    delivery: &Delivery,
    settings: &Settings,
) -> anyhow::Result<ExitCode> {
    let text = input.read().await?;
    let snippets = typeset_core::extract(&text);

    if snippets.is_empty() {
        if delivery.json {
            print_json(&Report::Empty)?;
        } else {
            println!("no snippets found");
        }
        return Ok(ExitCode::SUCCESS);
    }

    run(&snippets, delivery, settings).await
}

/// Compile the whole input as a single snippet, without extraction.
pub async fn execute_direct(
    input: &Input,
    delivery: &Delivery,
    settings: &Settings,
) -> anyhow::Result<ExitCode> {
    let source = input.read().await?;
    run(&[Snippet::direct(source)], delivery, settings).await
}

async fn run(
    snippets: &[Snippet],
    delivery: &Delivery,
    settings: &Settings,
) -> anyhow::Result<ExitCode> {
    let config = settings.compiler_config()?;
    let extension = config.format.clone();
    let mut typesetter = Typesetter::new(config, settings.trim_config())?;
    if !delivery.json {
        typesetter.set_callback(ProgressCallback);
    }

    let abort = AbortHandle::new();
    let watcher = tokio::spawn({
        let abort = abort.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling compile jobs");
                abort.abort();
            }
        }
    });

    let outcome = typesetter.render_snippets(snippets, &abort).await;
    watcher.abort();

    match outcome? {
        Outcome::Success(images) => {
            let written = deliver(&images, &delivery.out_dir, &extension).await?;
            if delivery.json {
                print_json(&Report::Ok { images: written })?;
            } else {
                println!("ok");
                for path in &written {
                    println!("{}  {}{}", colors::DIM, path.display(), colors::RESET);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Outcome::Failure(reports) => {
            let status = format_statuses(reports.iter().map(|r| &r.status));
            if delivery.json {
                print_json(&Report::Error {
                    status,
                    jobs: &reports,
                })?;
            } else {
                println!("error: {status}");
                print_diagnostics(&reports);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Write the pages into `out_dir`, named after their snippet and page.
async fn deliver(
    images: &[RenderedImage],
    out_dir: &Path,
    extension: &str,
) -> anyhow::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(out_dir).await?;

    let mut written = Vec::with_capacity(images.len());
    for image in images {
        let path = out_dir.join(output_name(image, extension));
        tokio::fs::write(&path, &image.data).await?;
        tracing::debug!(path = %path.display(), bytes = image.data.len(), "Wrote image");
        written.push(path);
    }
    Ok(written)
}

fn output_name(image: &RenderedImage, extension: &str) -> String {
    match (image.index, image.page) {
        (Some(index), Some(page)) => format!("snippet{index}-page{page}.{extension}"),
        _ => image.file_name.clone(),
    }
}

fn print_diagnostics(reports: &[JobReport]) {
    for report in reports.iter().filter(|r| !r.status.is_success()) {
        println!(
            "\n{}snippet {}{} ({}):",
            colors::BOLD,
            report.index,
            colors::RESET,
            report.status
        );
        let stderr = report.stderr.trim();
        if !stderr.is_empty() {
            println!("{stderr}");
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
