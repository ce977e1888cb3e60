use anyhow::{Context, Result};
use serde::Serialize;

/// Output format for reports printed on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let encoded = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", encoded);
    Ok(())
}
