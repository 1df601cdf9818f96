use std::{sync::Arc, time::Duration};

use reqwest::{Client, StatusCode, header};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::{
    auth::{Authenticator, authenticator_from_config},
    config::ProbeConfig,
    error::ProbeError,
    validator::describe_graphql_errors,
};

/// Query used to probe whether the endpoint is up and accepts our credential.
pub const HEALTH_CHECK_QUERY: &str = "{ __typename }";

/// JSON body of a GraphQL POST request.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GraphqlRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

impl GraphqlRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
        }
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }
}

/// Sends query documents to one GraphQL endpoint. No retries: every call is
/// exactly one HTTP request.
pub struct GraphqlClient {
    endpoint: Url,
    client: Client,
    authenticator: Arc<dyn Authenticator>,
}

impl GraphqlClient {
    pub fn new(
        endpoint: Url,
        authenticator: Arc<dyn Authenticator>,
        timeout: Duration,
    ) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Configuration(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint,
            client,
            authenticator,
        })
    }

    /// Builds the client and its authenticator from the run configuration.
    pub fn from_config(config: &ProbeConfig) -> Result<Self, ProbeError> {
        let authenticator = authenticator_from_config(&config.auth, config.timeout)?;
        Self::new(config.api_url.clone(), authenticator, config.timeout)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn send(&self, request: &GraphqlRequest) -> Result<(StatusCode, String), ProbeError> {
        let authorization = self.authenticator.authorization().await?;

        debug!(
            url = %self.endpoint,
            authorization = "<token-hidden>",
            payload = ?request,
            "Sending GraphQL request"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(header::AUTHORIZATION, authorization)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(%status, body_len = body.len(), "Received GraphQL response");

        if status == StatusCode::FORBIDDEN {
            return Err(ProbeError::Authorization { status, body });
        }
        Ok((status, body))
    }

    /// Posts the request and returns the parsed JSON body.
    ///
    /// A 400 whose body carries GraphQL `errors` is returned like a success.
    pub async fn execute(&self, request: &GraphqlRequest) -> Result<Value, ProbeError> {
        self.execute_with_status(request)
            .await
            .map(|(_, value)| value)
    }

    /// Like [`GraphqlClient::execute`], also returning the HTTP status.
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub async fn execute_with_status(
        &self,
        request: &GraphqlRequest,
    ) -> Result<(StatusCode, Value), ProbeError> {
        let (status, body) = self.send(request).await?;
        let parsed = serde_json::from_str::<Value>(&body);

        match parsed {
            Ok(value) if status.is_success() => {
                log_graphql_errors(&value);
                Ok((status, value))
            }
            Ok(value) if status == StatusCode::BAD_REQUEST && value.get("errors").is_some() => {
                log_graphql_errors(&value);
                Ok((status, value))
            }
            Err(_) if status.is_success() => Err(ProbeError::MalformedResponse { status, body }),
            _ => Err(ProbeError::Http { status, body }),
        }
    }

    pub async fn execute_query(&self, query: &str) -> Result<Value, ProbeError> {
        self.execute(&GraphqlRequest::new(query)).await
    }

    /// Posts [`HEALTH_CHECK_QUERY`]. A 200 or 400 means the endpoint is
    /// reachable and speaks GraphQL.
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub async fn health_check(&self) -> Result<StatusCode, ProbeError> {
        let (status, body) = self.send(&GraphqlRequest::new(HEALTH_CHECK_QUERY)).await?;
        if status == StatusCode::OK || status == StatusCode::BAD_REQUEST {
            debug!(%status, "Health check passed");
            Ok(status)
        } else {
            Err(ProbeError::Http { status, body })
        }
    }
}

fn log_graphql_errors(value: &Value) {
    for error in describe_graphql_errors(value) {
        warn!("GraphQL error: {error}");
    }
}
