//! Typeset CLI - render typst snippets embedded in chat text.

mod colors;
mod info;
mod input;
mod render;
mod settings;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::input::Input;
use crate::render::Delivery;
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "typeset")]
#[command(about = "Render typst snippets embedded in chat text")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    settings: Settings,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every snippet in a message
    Render {
        #[command(flatten)]
        input: Input,

        #[command(flatten)]
        delivery: Delivery,
    },

    /// Typeset a (short) source as-is, without looking for delimiters
    Typeset {
        #[command(flatten)]
        input: Input,

        #[command(flatten)]
        delivery: Delivery,
    },

    /// List the snippets a message contains
    Extract {
        #[command(flatten)]
        input: Input,

        /// Print the snippets as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display the prelude of every input
    Prelude,

    /// How to mark up snippets
    Usage,

    /// Check that the external tools can be found
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Render core errors with their recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<typeset_core::Error>() {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else {
            err
        }
    };

    let settings = &cli.settings;
    let code = match cli.command {
        Commands::Render { input, delivery } => {
            render::execute(&input, &delivery, settings).await.map_err(format_error)?
        }

        Commands::Typeset { input, delivery } => render::execute_direct(&input, &delivery, settings)
            .await
            .map_err(format_error)?,

        Commands::Extract { input, json } => {
            info::extract(&input, json).await.map_err(format_error)?;
            ExitCode::SUCCESS
        }

        Commands::Prelude => {
            info::prelude(settings).map_err(format_error)?;
            ExitCode::SUCCESS
        }

        Commands::Usage => {
            info::usage();
            ExitCode::SUCCESS
        }

        Commands::Check => {
            info::check(settings).await.map_err(format_error)?;
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}
