use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, info, instrument};

use crate::{config::QueryConfig, error::ProbeError};

/// A single GraphQL query or mutation read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDocument {
    /// Case name: the file name without its extension.
    pub name: String,
    pub path: PathBuf,
    pub text: String,
}

impl QueryDocument {
    /// Reads a query document, trimming surrounding whitespace.
    pub fn from_file(path: &Path) -> Result<Self, ProbeError> {
        let text = fs::read_to_string(path)?.trim().to_string();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Ok(Self {
            name,
            path: path.to_path_buf(),
            text,
        })
    }
}

/// Lists every file in `config.dir` that carries `config.extension`, sorted by
/// name so runs are reproducible.
///
/// A missing directory, or one with no matching files, is a configuration
/// error: an empty collection must not pass silently.
#[instrument]
pub fn discover_queries(config: &QueryConfig) -> Result<Vec<QueryDocument>, ProbeError> {
    let dir = &config.dir;
    if !dir.is_dir() {
        return Err(ProbeError::Configuration(format!(
            "Query directory not found: {}",
            dir.display()
        )));
    }

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(config.extension.as_str()));
        if matches {
            paths.push(path);
        } else {
            debug!(path = %path.display(), "Ignoring non-query file");
        }
    }
    paths.sort();

    if paths.is_empty() {
        return Err(ProbeError::Configuration(format!(
            "No .{} files found in {}",
            config.extension,
            dir.display()
        )));
    }

    let documents = paths
        .iter()
        .map(|p| QueryDocument::from_file(p))
        .collect::<Result<Vec<_>, _>>()?;
    info!(count = documents.len(), dir = %dir.display(), "Collected query documents");
    Ok(documents)
}
