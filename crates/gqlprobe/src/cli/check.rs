use std::io::Write;

use anyhow::{Context, Result};
use gqlprobe_core::{
    ProbeError,
    config::{NetworkPolicy, ProbeConfig},
    executor::GraphqlClient,
    suite::restricted_network_reason,
};

use crate::ux::{MessageType, style_text};

/// Probes the endpoint once and reports whether it is usable.
pub async fn execute(config: &ProbeConfig, out: &mut impl Write) -> Result<bool> {
    let client = GraphqlClient::from_config(config).context("Failed to create GraphQL client")?;

    let healthy = match client.health_check().await {
        Ok(status) => {
            writeln!(
                out,
                "{} {} responded with {status}",
                style_text("OK", MessageType::Pass),
                client.endpoint()
            )?;
            true
        }
        Err(ProbeError::Authorization { body, .. })
            if config.network == NetworkPolicy::Restricted =>
        {
            writeln!(
                out,
                "{} {}",
                style_text("SKIP", MessageType::Skip),
                restricted_network_reason(&body)
            )?;
            true
        }
        Err(e) if e.is_fatal() => return Err(e).context("API health check failed"),
        Err(e) => {
            writeln!(out, "{} {e}", style_text("FAIL", MessageType::Fail))?;
            false
        }
    };
    Ok(healthy)
}

#[cfg(test)]
mod tests {
    use console::strip_ansi_codes;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::test_utils::{create_query_dir, test_config};

    #[tokio::test]
    async fn test_check_healthy() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":{}}"#))
            .mount(&server)
            .await;

        let dir = create_query_dir(&[]);
        let config = test_config(&server.uri(), dir.path(), &[]);

        let mut out = Vec::new();
        assert!(execute(&config, &mut out).await.unwrap());
        let text = String::from_utf8(out).unwrap();
        let text = strip_ansi_codes(&text);
        assert!(text.contains(&format!("OK {}/ responded with 200 OK", server.uri())));
    }

    #[tokio::test]
    async fn test_check_forbidden_on_allowlisted_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Ip Forbidden"))
            .mount(&server)
            .await;

        let dir = create_query_dir(&[]);
        let config = test_config(&server.uri(), dir.path(), &[]);

        let mut out = Vec::new();
        assert!(!execute(&config, &mut out).await.unwrap());
        let text = String::from_utf8(out).unwrap();
        assert!(strip_ansi_codes(&text).starts_with("FAIL Authorization error"));
    }
}
