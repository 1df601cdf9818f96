use gqlprobe_core::config::ProbeConfig;
use gqlprobe_core::executor::GraphqlClient;
use gqlprobe_core::loader::discover_queries;
use gqlprobe_core::report::CaseStatus;
use gqlprobe_core::suite::Suite;

/// This test is marked as `ignore` because it sends every query file to the real endpoint.
/// It needs API_URL plus credentials in the environment and the query directory on disk.
/// To run this test: `cargo test --package gqlprobe-core --test live_queries -- --ignored`
#[tokio::test]
#[ignore]
async fn test_live_query_files() {
    let config = ProbeConfig::from_process_env().expect("Failed to load configuration");
    let documents = discover_queries(&config.queries).expect("Failed to collect queries");
    let client = GraphqlClient::from_config(&config).expect("Failed to create client");
    let mut suite = Suite::new(&config, &client).expect("Failed to create suite");

    let report = suite
        .run(&documents, |_| {})
        .await
        .expect("Run aborted");

    let failures: Vec<String> = report
        .outcomes
        .iter()
        .filter_map(|o| match &o.status {
            CaseStatus::Failed { message, .. } => Some(format!("{}: {message}", o.name)),
            _ => None,
        })
        .collect();
    assert!(failures.is_empty(), "Failed queries:\n{}", failures.join("\n"));
}
