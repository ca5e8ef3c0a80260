//! Informational commands: usage, prelude, extract and check.

use typeset_core::{Origin, Toolchain, Trimmer};

use crate::colors;
use crate::input::Input;
use crate::settings::Settings;

pub const USAGE: &str = r#"Format everything surrounded by ` (backtick) and $ (dollar sign)
in typst math mode.

Format everything in a typst code block with typst.

Ex:

`` `$e^alpha$` ``
"#;

/// Print how snippets are marked up in a message.
pub fn usage() {
    print!("{USAGE}");
}

/// Print the prelude inside a typst code block.
pub fn prelude(settings: &Settings) -> anyhow::Result<()> {
    let config = settings.compiler_config()?;
    println!("```typst");
    println!("{}", config.prelude.as_str().trim_end());
    println!("```");
    Ok(())
}

/// Show which snippets would be compiled, without compiling them.
pub async fn extract(input: &Input, json: bool) -> anyhow::Result<()> {
    let text = input.read().await?;
    let snippets = typeset_core::extract(&text);

    if json {
        println!("{}", serde_json::to_string_pretty(&snippets)?);
        return Ok(());
    }

    if snippets.is_empty() {
        println!("no snippets found");
        return Ok(());
    }

    for snippet in &snippets {
        let origin = match snippet.origin {
            Origin::FencedBlock => "block",
            Origin::InlineMath => "inline",
            Origin::Direct => "direct",
        };
        println!(
            "{}[{}]{} {}{}{}",
            colors::BOLD,
            snippet.index,
            colors::RESET,
            colors::DIM,
            origin,
            colors::RESET
        );
        println!("{}", snippet.text);
    }
    Ok(())
}

/// Report the external tools a render would use.
pub async fn check(settings: &Settings) -> anyhow::Result<()> {
    let config = settings.compiler_config()?;
    let toolchain = Toolchain::detect(&config)?;
    println!(
        "{}typst{}    {} ({})",
        colors::GREEN,
        colors::RESET,
        toolchain.typst_path().display(),
        version_or_unknown(toolchain.query_version().await)
    );

    match settings.trim_config() {
        Some(trim) => match Trimmer::new(&trim) {
            Ok(trimmer) => println!(
                "{}mogrify{}  {} ({})",
                colors::GREEN,
                colors::RESET,
                trimmer.program().display(),
                version_or_unknown(trimmer.query_version().await)
            ),
            Err(e) => println!(
                "{}mogrify{}  {}",
                colors::YELLOW,
                colors::RESET,
                e.with_hint()
            ),
        },
        None => println!("{}mogrify{}  disabled", colors::DIM, colors::RESET),
    }

    println!("jobs     {}", config.max_concurrency);
    println!("timeout  {}", describe_limit(config.job_timeout));
    println!("deadline {}", describe_limit(config.request_deadline));
    Ok(())
}

fn version_or_unknown(version: typeset_core::Result<String>) -> String {
    version.unwrap_or_else(|_| "version unknown".to_string())
}

fn describe_limit(limit: Option<std::time::Duration>) -> String {
    match limit {
        Some(limit) => format!("{}s", limit.as_secs_f64()),
        None => "none".to_string(),
    }
}
