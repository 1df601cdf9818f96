use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::Local;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::error::ProbeError;

/// Result of running one query document.
#[derive(Debug, Clone, PartialEq)]
pub enum CaseStatus {
    Passed,
    Failed { kind: String, message: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseOutcome {
    pub name: String,
    pub status: CaseStatus,
    pub elapsed: Duration,
}

impl CaseOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, CaseStatus::Failed { .. })
    }
}

/// Outcomes of a whole run plus the derived metrics shown in the summary.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<CaseOutcome>,
    pub total_time: Duration,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn passed(&self) -> usize {
        self.count(|s| matches!(s, CaseStatus::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, CaseStatus::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, CaseStatus::Skipped { .. }))
    }

    fn count(&self, predicate: impl Fn(&CaseStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }

    /// Mean time per case, zero for an empty run.
    pub fn average_response_time(&self) -> Duration {
        match u32::try_from(self.outcomes.len()) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => self.outcomes.iter().map(|o| o.elapsed).sum::<Duration>() / n,
        }
    }

    /// Number of failed cases per error kind.
    pub fn error_kinds(&self) -> BTreeMap<String, usize> {
        let mut kinds = BTreeMap::new();
        for outcome in &self.outcomes {
            if let CaseStatus::Failed { kind, .. } = &outcome.status {
                *kinds.entry(kind.clone()).or_insert(0) += 1;
            }
        }
        kinds
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Diagnostic record written for each failed case.
#[derive(Serialize, Debug, Clone)]
pub struct ErrorArtifact {
    pub test_name: String,
    pub error_type: String,
    pub error_message: String,
    pub request: Value,
    pub response_status: Option<u16>,
    pub response: Option<Value>,
    pub timestamp: String,
}

impl ErrorArtifact {
    pub fn new(test_name: &str, error_type: &str, error_message: &str, payload: Value) -> Self {
        Self {
            test_name: test_name.to_string(),
            error_type: error_type.to_string(),
            error_message: error_message.to_string(),
            request: json!({
                "headers": {
                    "Authorization": "<token-hidden>",
                    "Content-Type": "application/json",
                },
                "payload": payload,
            }),
            response_status: None,
            response: None,
            timestamp: Local::now().to_rfc3339(),
        }
    }

    pub fn with_response(mut self, status: Option<u16>, body: Value) -> Self {
        self.response_status = status;
        self.response = Some(body);
        self
    }
}

/// Writes error artifacts under `<report_dir>/error_artifacts`.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl ArtifactWriter {
    pub fn new(report_dir: &Path) -> Result<Self, ProbeError> {
        let dir = report_dir.join("error_artifacts");
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[instrument(skip_all, fields(test_name = %artifact.test_name))]
    pub fn write(&self, artifact: &ErrorArtifact) -> Result<PathBuf, ProbeError> {
        let file_name = format!(
            "error_{}_{}.json",
            sanitize(&artifact.test_name),
            Local::now().format("%Y%m%d_%H%M%S")
        );
        let path = self.dir.join(file_name);
        let content = serde_json::to_string_pretty(artifact)
            .map_err(|e| ProbeError::Io(std::io::Error::other(e)))?;
        fs::write(&path, content)?;
        debug!(path = %path.display(), "Wrote error artifact");
        Ok(path)
    }
}
