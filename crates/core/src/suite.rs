use std::time::Instant;

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::{
    config::{NetworkPolicy, ProbeConfig},
    error::ProbeError,
    executor::{GraphqlClient, GraphqlRequest},
    loader::QueryDocument,
    report::{ArtifactWriter, CaseOutcome, CaseStatus, ErrorArtifact, RunReport},
    schema::{SchemaError, SchemaRegistry},
    validator::validate_response,
};

/// Reason attached to cases skipped because the endpoint refused this network.
pub fn restricted_network_reason(body: &str) -> String {
    format!("endpoint returned 403 and this network is not allowlisted: {body}")
}

// Failure details kept until the outcome and its artifact are built.
struct Failure {
    kind: String,
    message: String,
    status: Option<u16>,
    response: Option<Value>,
}

/// Runs query documents one after another against a single client.
///
/// Per-case failures stay isolated in their outcome; configuration and
/// authentication errors abort the run.
pub struct Suite<'a> {
    client: &'a GraphqlClient,
    network: NetworkPolicy,
    schemas: Option<SchemaRegistry>,
    artifacts: Option<ArtifactWriter>,
}

impl<'a> Suite<'a> {
    pub fn new(config: &ProbeConfig, client: &'a GraphqlClient) -> Result<Self, ProbeError> {
        let artifacts = config
            .report_dir
            .as_deref()
            .map(ArtifactWriter::new)
            .transpose()?;
        Ok(Self {
            client,
            network: config.network,
            schemas: config.schema_dir.as_deref().map(SchemaRegistry::new),
            artifacts,
        })
    }

    /// Runs every document, calling `on_outcome` as each case finishes.
    #[instrument(skip_all, fields(cases = documents.len()))]
    pub async fn run<F>(
        &mut self,
        documents: &[QueryDocument],
        mut on_outcome: F,
    ) -> Result<RunReport, ProbeError>
    where
        F: FnMut(&CaseOutcome),
    {
        let started = Instant::now();
        let mut outcomes = Vec::with_capacity(documents.len());
        for document in documents {
            let outcome = self.run_case(document).await?;
            on_outcome(&outcome);
            outcomes.push(outcome);
        }
        let report = RunReport {
            outcomes,
            total_time: started.elapsed(),
        };
        info!(
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.skipped(),
            "Run finished"
        );
        Ok(report)
    }

    /// Executes and validates one document. Returns `Err` only for fatal errors.
    #[instrument(skip_all, fields(case = %document.name))]
    pub async fn run_case(&mut self, document: &QueryDocument) -> Result<CaseOutcome, ProbeError> {
        let request = GraphqlRequest::new(document.text.clone());
        let started = Instant::now();
        let result = self.client.execute_with_status(&request).await;
        let elapsed = started.elapsed();

        let status = match result {
            Err(e) if e.is_fatal() => return Err(e),
            Err(ProbeError::Authorization { body, .. })
                if self.network == NetworkPolicy::Restricted =>
            {
                let reason = restricted_network_reason(&body);
                warn!(%reason, "Skipping case");
                CaseStatus::Skipped { reason }
            }
            Err(e) => self.fail(
                document,
                &request,
                Failure {
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                    status: e.status().map(|s| s.as_u16()),
                    response: e.body().map(|b| Value::String(b.to_string())),
                },
            ),
            Ok((response_status, response)) => match self.check(document, &response) {
                Ok(()) => CaseStatus::Passed,
                Err((kind, message)) => self.fail(
                    document,
                    &request,
                    Failure {
                        kind: kind.to_string(),
                        message,
                        status: Some(response_status.as_u16()),
                        response: Some(response),
                    },
                ),
            },
        };

        Ok(CaseOutcome {
            name: document.name.clone(),
            status,
            elapsed,
        })
    }

    fn check(
        &mut self,
        document: &QueryDocument,
        response: &Value,
    ) -> Result<(), (&'static str, String)> {
        validate_response(response)
            .map_err(|v| ("shape", format!("Response for {}: {v}", document.name)))?;

        let (Some(schemas), Some(data)) = (self.schemas.as_mut(), response.get("data")) else {
            return Ok(());
        };
        schemas
            .validate(&document.name, data)
            .map(|_| ())
            .map_err(|e| match e {
                SchemaError::Violation { .. } => ("schema", e.to_string()),
                SchemaError::Load { .. } => ("schema_load", e.to_string()),
            })
    }

    fn fail(
        &self,
        document: &QueryDocument,
        request: &GraphqlRequest,
        failure: Failure,
    ) -> CaseStatus {
        warn!(kind = %failure.kind, message = %failure.message, "Case failed");

        if let Some(writer) = &self.artifacts {
            let payload = serde_json::to_value(request).unwrap_or(Value::Null);
            let mut artifact =
                ErrorArtifact::new(&document.name, &failure.kind, &failure.message, payload);
            if let Some(response) = failure.response {
                artifact = artifact.with_response(failure.status, response);
            }
            if let Err(e) = writer.write(&artifact) {
                warn!(error = %e, "Failed to write error artifact");
            }
        }

        CaseStatus::Failed {
            kind: failure.kind,
            message: failure.message,
        }
    }
}
