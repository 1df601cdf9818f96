use std::io::Write;

use anyhow::{Context, Result, bail};
use gqlprobe_core::{
    ProbeError,
    config::{NetworkPolicy, ProbeConfig},
    executor::GraphqlClient,
    loader::{QueryDocument, discover_queries},
    suite::{Suite, restricted_network_reason},
};

use crate::ux::{MessageType, format_outcome, format_summary, style_text};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub filter: Option<String>,
    pub health_check: bool,
}

/// Collects the query documents, keeping only names containing `filter`.
pub fn collect(config: &ProbeConfig, filter: Option<&str>) -> Result<Vec<QueryDocument>> {
    let documents = discover_queries(&config.queries).context("Failed to collect query files")?;
    let Some(filter) = filter else {
        return Ok(documents);
    };
    let matched: Vec<QueryDocument> = documents
        .into_iter()
        .filter(|d| d.name.contains(filter))
        .collect();
    if matched.is_empty() {
        bail!("No query files match filter '{filter}'");
    }
    Ok(matched)
}

/// Executes the run command: one case per query document, then a summary.
/// Returns whether no case failed.
pub async fn execute(
    config: &ProbeConfig,
    options: &RunOptions,
    out: &mut impl Write,
) -> Result<bool> {
    let documents = collect(config, options.filter.as_deref())?;
    let client = GraphqlClient::from_config(config).context("Failed to create GraphQL client")?;

    if options.health_check {
        match client.health_check().await {
            Ok(_) => {}
            Err(ProbeError::Authorization { body, .. })
                if config.network == NetworkPolicy::Restricted =>
            {
                writeln!(
                    out,
                    "{} all {} queries\n     {}",
                    style_text("SKIP", MessageType::Skip),
                    documents.len(),
                    restricted_network_reason(&body)
                )?;
                return Ok(true);
            }
            Err(e) => return Err(e).context("API health check failed"),
        }
    }

    writeln!(
        out,
        "{}",
        style_text(
            format!(
                "Running {} queries against {}",
                documents.len(),
                config.api_url
            ),
            MessageType::Header
        )
    )?;

    let mut suite = Suite::new(config, &client).context("Failed to prepare test suite")?;
    let mut write_result = Ok(());
    let report = suite
        .run(&documents, |outcome| {
            if write_result.is_ok() {
                write_result = writeln!(out, "{}", format_outcome(outcome));
            }
        })
        .await
        .context("Test run aborted")?;
    write_result.context("Failed to write results")?;

    writeln!(out, "\n{}", format_summary(&report))?;
    Ok(report.is_success())
}

#[cfg(test)]
mod tests {
    use console::strip_ansi_codes;
    use serde_json::json;
    use wiremock::matchers::{body_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::test_utils::{create_query_dir, test_config};

    async fn mock_query(server: &MockServer, query: &str, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(body_json(json!({ "query": query })))
            .respond_with(template)
            .mount(server)
            .await;
    }

    fn output(out: Vec<u8>) -> String {
        strip_ansi_codes(&String::from_utf8(out).unwrap()).into_owned()
    }

    #[tokio::test]
    async fn test_run_all_pass() {
        let server = MockServer::start().await;
        mock_query(
            &server,
            "{ __typename }",
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "__typename": "Query" } })),
        )
        .await;
        mock_query(
            &server,
            "{ invalid { field } }",
            ResponseTemplate::new(200)
                .set_body_json(json!({ "errors": [{ "message": "Cannot query field" }] })),
        )
        .await;

        let dir = create_query_dir(&[
            ("typename", "{ __typename }"),
            ("invalid", "{ invalid { field } }"),
        ]);
        let config = test_config(&server.uri(), dir.path(), &[]);
        let options = RunOptions {
            filter: None,
            health_check: true,
        };

        let mut out = Vec::new();
        assert!(execute(&config, &options, &mut out).await.unwrap());

        let text = output(out);
        assert!(text.contains("Running 2 queries against"));
        assert!(text.contains("PASS invalid"));
        assert!(text.contains("PASS typename"));
        assert!(text.contains("Total Queries: 2"));
        assert!(text.contains("All queries passed."));
    }

    #[tokio::test]
    async fn test_run_reports_failure() {
        let server = MockServer::start().await;
        mock_query(
            &server,
            "{ broken }",
            ResponseTemplate::new(200).set_body_json(json!({ "result": 1 })),
        )
        .await;

        let dir = create_query_dir(&[("broken", "{ broken }")]);
        let config = test_config(&server.uri(), dir.path(), &[]);

        let mut out = Vec::new();
        let options = RunOptions::default();
        assert!(!execute(&config, &options, &mut out).await.unwrap());

        let text = output(out);
        assert!(text.contains("FAIL broken"));
        assert!(text.contains("shape: Response for broken"));
        assert!(text.contains("Error Types:\n  shape: 1"));
    }

    #[tokio::test]
    async fn test_run_skips_everything_on_restricted_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Ip Forbidden"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = create_query_dir(&[("a", "{ a }"), ("b", "{ b }")]);
        let config = test_config(
            &server.uri(),
            dir.path(),
            &[("ALLOWLISTED_NETWORK", "false")],
        );
        let options = RunOptions {
            filter: None,
            health_check: true,
        };

        let mut out = Vec::new();
        assert!(execute(&config, &options, &mut out).await.unwrap());
        assert!(output(out).starts_with("SKIP all 2 queries"));
    }

    #[tokio::test]
    async fn test_run_unhealthy_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let dir = create_query_dir(&[("a", "{ a }")]);
        let config = test_config(&server.uri(), dir.path(), &[]);
        let options = RunOptions {
            filter: None,
            health_check: true,
        };

        let err = execute(&config, &options, &mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "API health check failed");
    }

    #[test]
    fn test_collect_filter_without_matches() {
        let dir = create_query_dir(&[("a", "{ a }")]);
        let config = test_config("http://localhost/graphql", dir.path(), &[]);

        let err = collect(&config, Some("zzz")).unwrap_err();
        assert_eq!(err.to_string(), "No query files match filter 'zzz'");
    }

    #[test]
    fn test_collect_empty_directory() {
        let dir = create_query_dir(&[]);
        let config = test_config("http://localhost/graphql", dir.path(), &[]);

        let err = collect(&config, None).unwrap_err();
        assert_eq!(err.to_string(), "Failed to collect query files");
        assert!(format!("{err:#}").contains("No .graphql files found"));
    }
}
