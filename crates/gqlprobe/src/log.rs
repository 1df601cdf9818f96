//! Logging for gqlprobe.
use anyhow::Context;
use std::io::LineWriter;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::time::OffsetTime;

const LOG_FILE: &str = "gqlprobe.log";
const MAX_LOG_SIZE: u64 = 100 * 1024;

/// Directory for the log file: the report directory when one is configured,
/// otherwise `<data_local_dir>/gqlprobe`.
pub fn log_dir(report_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = match report_dir {
        Some(dir) => dir.to_path_buf(),
        None => dirs::data_local_dir()
            .map(|p| p.join("gqlprobe"))
            .context("Failed to get data directory")?,
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    Ok(dir)
}

/// Moves `gqlprobe.log` aside to `gqlprobe.log.old` once it grows past 100KB.
fn rotate(log_dir: &Path) -> std::io::Result<PathBuf> {
    let log_path = log_dir.join(LOG_FILE);
    if log_path.exists() && std::fs::metadata(&log_path)?.len() > MAX_LOG_SIZE {
        let backup_path = log_dir.join(format!("{LOG_FILE}.old"));
        if backup_path.exists() {
            std::fs::remove_file(&backup_path)?;
        }
        std::fs::rename(&log_path, backup_path)?;
    }
    Ok(log_path)
}

/// Initializes file logging under `log_dir`.
///
/// Request and response details are logged at DEBUG level for both the CLI
/// and the core crate. Authorization values never reach the log.
///
/// # Errors
///
/// Returns an error if the log file cannot be rotated or opened, or if the
/// local timezone offset cannot be determined.
pub fn setup_logging(log_dir: &Path) -> anyhow::Result<()> {
    let log_path = rotate(log_dir).context("Failed to rotate log file")?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    // Ensure the logs are flushed after every line
    let writer = Mutex::new(LineWriter::new(log_file));

    tracing_subscriber::fmt()
        .with_env_filter("gqlprobe=debug,gqlprobe_core=debug")
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(OffsetTime::local_rfc_3339()?)
        .init();
    Ok(())
}
