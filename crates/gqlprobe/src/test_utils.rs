//! Test helpers shared by the cli modules.

use std::path::Path;

use gqlprobe_core::config::ProbeConfig;
use tempfile::TempDir;

/// Creates a temporary query directory holding one `.graphql` file per entry.
///
/// # Panics
/// Panics if the directory or a file cannot be written.
pub fn create_query_dir(queries: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::Builder::new()
        .prefix("gqlprobe-test")
        .rand_bytes(8)
        .tempdir()
        .unwrap();
    for (name, text) in queries {
        std::fs::write(dir.path().join(format!("{name}.graphql")), text).unwrap();
    }
    dir
}

/// Bearer-token configuration pointing at `api_url`, built the same way the
/// cli builds it from the environment.
///
/// # Panics
/// Panics if the values do not form a valid configuration.
pub fn test_config(api_url: &str, query_dir: &Path, extra: &[(&str, &str)]) -> ProbeConfig {
    let query_dir = query_dir.display().to_string();
    let mut vars = vec![
        ("API_URL", api_url.to_string()),
        ("BEARER_TOKEN", "test-token".to_string()),
        ("QUERY_DIR", query_dir),
    ];
    vars.extend(extra.iter().map(|(k, v)| (*k, v.to_string())));
    ProbeConfig::from_env(|key: &str| {
        vars.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
    })
    .unwrap()
}
