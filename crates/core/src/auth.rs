use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use url::Url;

use crate::{
    config::{AuthConfig, ClientCredentialsConfig},
    error::ProbeError,
};

/// Tokens this close to expiry are fetched again.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Produces the `Authorization` header value attached to every request.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authorization(&self) -> Result<String, ProbeError>;
}

/// Formats a token as a bearer header value, leaving an existing prefix alone.
pub fn bearer_header(token: &str) -> String {
    if token.starts_with("Bearer ") {
        token.to_string()
    } else {
        format!("Bearer {token}")
    }
}

/// Builds the authenticator for the configured credential source.
pub fn authenticator_from_config(
    auth: &AuthConfig,
    timeout: Duration,
) -> Result<Arc<dyn Authenticator>, ProbeError> {
    let authenticator: Arc<dyn Authenticator> = match auth {
        AuthConfig::Bearer { token } => Arc::new(StaticTokenAuthenticator::new(token.clone())?),
        AuthConfig::ClientCredentials(config) => {
            Arc::new(ClientCredentialsAuthenticator::new(config.clone(), timeout)?)
        }
    };
    Ok(authenticator)
}

/// Presents a preconfigured secret.
pub struct StaticTokenAuthenticator {
    token: String,
}

impl StaticTokenAuthenticator {
    pub fn new(token: String) -> Result<Self, ProbeError> {
        if token.trim().is_empty() {
            return Err(ProbeError::Configuration(
                "Bearer token must not be empty".to_string(),
            ));
        }
        Ok(Self { token })
    }
}

impl fmt::Debug for StaticTokenAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenAuthenticator").finish_non_exhaustive()
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authorization(&self) -> Result<String, ProbeError> {
        Ok(bearer_header(&self.token))
    }
}

// Token endpoint response, success and error shapes share one struct.
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Instant::now() + EXPIRY_MARGIN < expires_at,
            None => true,
        }
    }
}

/// Exchanges a client id and secret for an access token (OAuth2
/// client-credentials grant) and caches it until shortly before expiry.
pub struct ClientCredentialsAuthenticator {
    config: ClientCredentialsConfig,
    token_url: Url,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for ClientCredentialsAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentialsAuthenticator")
            .field("config", &self.config)
            .field("token_url", &self.token_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ClientCredentialsAuthenticator {
    pub fn new(config: ClientCredentialsConfig, timeout: Duration) -> Result<Self, ProbeError> {
        let token_url = token_endpoint(&config.authority, &config.tenant_id)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Configuration(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            token_url,
            client,
            cached: Mutex::new(None),
        })
    }

    #[instrument(skip(self), fields(token_url = %self.token_url))]
    async fn fetch_token(&self) -> Result<CachedToken, ProbeError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("scope", self.config.scope.as_str()),
        ];

        let response = self
            .client
            .post(self.token_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                ProbeError::Authentication(format!("Failed to reach token endpoint: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProbeError::Authentication(format!(
                "Token endpoint returned {status}: {text}"
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            ProbeError::Authentication(format!("Failed to parse token response: {e}"))
        })?;
        let access_token = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ProbeError::Authentication(
                    "Token response did not include an access_token".to_string(),
                )
            })?;

        info!(expires_in = ?token.expires_in, "Acquired access token");
        Ok(CachedToken {
            access_token,
            // Lifetimes past the clock's range are treated as non-expiring.
            expires_at: token
                .expires_in
                .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs))),
        })
    }
}

fn token_endpoint(authority: &Url, tenant_id: &str) -> Result<Url, ProbeError> {
    let mut base = authority.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(&format!("{tenant_id}/oauth2/v2.0/token"))
        .map_err(|e| ProbeError::Configuration(format!("Invalid token endpoint: {e}")))
}

#[async_trait]
impl Authenticator for ClientCredentialsAuthenticator {
    async fn authorization(&self) -> Result<String, ProbeError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            debug!("Reusing cached access token");
            return Ok(bearer_header(&token.access_token));
        }
        let token = self.fetch_token().await?;
        let header = bearer_header(&token.access_token);
        *cached = Some(token);
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn credentials(authority: &str) -> ClientCredentialsConfig {
        ClientCredentialsConfig {
            client_id: "my-client".to_string(),
            client_secret: "my-secret".to_string(),
            tenant_id: "my-tenant".to_string(),
            scope: "api://example/.default".to_string(),
            authority: Url::parse(authority).unwrap(),
        }
    }

    fn authenticator(server: &MockServer) -> ClientCredentialsAuthenticator {
        ClientCredentialsAuthenticator::new(credentials(&server.uri()), Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn test_bearer_header_prefix() {
        assert_eq!(bearer_header("abc"), "Bearer abc");
        assert_eq!(bearer_header("Bearer abc"), "Bearer abc");
    }

    #[test]
    fn test_token_endpoint() {
        let url = token_endpoint(&Url::parse("https://login.example.com").unwrap(), "t1").unwrap();
        assert_eq!(url.as_str(), "https://login.example.com/t1/oauth2/v2.0/token");

        let url =
            token_endpoint(&Url::parse("https://idp.example.com/auth").unwrap(), "t1").unwrap();
        assert_eq!(url.as_str(), "https://idp.example.com/auth/t1/oauth2/v2.0/token");
    }

    #[tokio::test]
    async fn test_static_token() {
        let auth = StaticTokenAuthenticator::new("abc123".to_string()).unwrap();
        assert_eq!(auth.authorization().await.unwrap(), "Bearer abc123");
    }

    #[test]
    fn test_static_token_empty() {
        let err = StaticTokenAuthenticator::new("  ".to_string()).unwrap_err();
        assert!(matches!(err, ProbeError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_client_credentials_success_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/my-tenant/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=my-client"))
            .and(body_string_contains("client_secret=my-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": "issued-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = authenticator(&server);
        assert_eq!(auth.authorization().await.unwrap(), "Bearer issued-token");
        assert_eq!(auth.authorization().await.unwrap(), "Bearer issued-token");
    }

    #[tokio::test]
    async fn test_client_credentials_refetches_expiring_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/my-tenant/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "expires_in": 30,
                "access_token": "short-lived"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let auth = authenticator(&server);
        auth.authorization().await.unwrap();
        auth.authorization().await.unwrap();
    }

    #[tokio::test]
    async fn test_client_credentials_unbounded_lifetime() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/my-tenant/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "expires_in": u64::MAX,
                "access_token": "long-lived"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = authenticator(&server);
        assert_eq!(auth.authorization().await.unwrap(), "Bearer long-lived");
        assert_eq!(auth.authorization().await.unwrap(), "Bearer long-lived");
    }

    #[tokio::test]
    async fn test_client_credentials_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/my-tenant/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "invalid_client",
                "error_description": "AADSTS7000215: Invalid client secret provided."
            })))
            .mount(&server)
            .await;

        let err = authenticator(&server).authorization().await.unwrap_err();
        assert!(matches!(err, ProbeError::Authentication(_)));
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("invalid_client"));
    }

    #[tokio::test]
    async fn test_client_credentials_missing_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/my-tenant/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .mount(&server)
            .await;

        let err = authenticator(&server).authorization().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Authentication error: Token response did not include an access_token"
        );
    }

    #[tokio::test]
    async fn test_client_credentials_unreachable() {
        // Nothing listens on the discard port.
        let auth = ClientCredentialsAuthenticator::new(
            credentials("http://127.0.0.1:9"),
            Duration::from_secs(1),
        )
        .unwrap();
        let err = auth.authorization().await.unwrap_err();
        assert!(matches!(err, ProbeError::Authentication(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_authenticator_from_config() {
        let auth = authenticator_from_config(
            &AuthConfig::Bearer {
                token: String::new(),
            },
            Duration::from_secs(1),
        );
        assert!(matches!(auth, Err(ProbeError::Configuration(_))));

        let auth = authenticator_from_config(
            &AuthConfig::ClientCredentials(credentials("https://login.example.com")),
            Duration::from_secs(1),
        );
        assert!(auth.is_ok());
    }
}
