use std::io::Write;

use anyhow::{Context, Result};
use gqlprobe_core::{config::ProbeConfig, loader::QueryDocument};

use super::run::collect;

/// Prints the name of every collected case.
pub fn execute(config: &ProbeConfig, filter: Option<&str>, out: &mut impl Write) -> Result<bool> {
    let documents: Vec<QueryDocument> = collect(config, filter)?;
    for document in &documents {
        writeln!(out, "{}", document.name).context("Failed to write case name")?;
    }
    Ok(true)
}
