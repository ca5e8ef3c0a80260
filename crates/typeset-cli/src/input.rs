//! Where a command's text comes from.

use std::path::PathBuf;

use anyhow::Context;
use tokio::io::AsyncReadExt;

#[derive(clap::Args, Debug, Clone)]
pub struct Input {
    /// Message text; read from stdin when neither this nor --file is given
    pub text: Option<String>,

    /// Read the text from a file
    #[arg(short, long, value_name = "PATH", conflicts_with = "text")]
    pub file: Option<PathBuf>,
}

impl Input {
    /// Read the text from the argument, the file or stdin.
    pub async fn read(&self) -> anyhow::Result<String> {
        if let Some(ref text) = self.text {
            return Ok(text.clone());
        }

        if let Some(ref path) = self.file {
            return tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()));
        }

        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("Failed to read stdin")?;
        Ok(text)
    }
}
