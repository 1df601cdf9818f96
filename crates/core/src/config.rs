use std::{fmt, fs, path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use crate::error::ProbeError;

pub const API_URL: &str = "API_URL";
pub const BEARER_TOKEN: &str = "BEARER_TOKEN";
pub const CLIENT_ID: &str = "CLIENT_ID";
pub const CLIENT_SECRET: &str = "CLIENT_SECRET";
pub const TENANT_ID: &str = "TENANT_ID";
pub const SCOPE: &str = "SCOPE";
pub const QUERY_DIR: &str = "QUERY_DIR";
pub const QUERY_EXTENSION: &str = "QUERY_EXTENSION";
pub const REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";
pub const TOKEN_AUTHORITY: &str = "TOKEN_AUTHORITY";
pub const ALLOWLISTED_NETWORK: &str = "ALLOWLISTED_NETWORK";
pub const TEST_REPORT_DIR: &str = "TEST_REPORT_DIR";
pub const SCHEMA_DIR: &str = "SCHEMA_DIR";

pub const DEFAULT_QUERY_DIR: &str = "graphql_queries";
pub const DEFAULT_QUERY_EXTENSION: &str = "graphql";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Whether the machine running the suite is known to be inside the endpoint's
/// IP allowlist. Decides how a 403 from the endpoint is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkPolicy {
    /// 403 is a genuine authorization failure.
    #[default]
    Allowlisted,
    /// 403 is expected and the affected case is skipped.
    Restricted,
}

/// Settings for the OAuth2 client-credentials grant.
#[derive(Clone, PartialEq)]
pub struct ClientCredentialsConfig {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub scope: String,
    pub authority: Url,
}

impl fmt::Debug for ClientCredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentialsConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<hidden>")
            .field("tenant_id", &self.tenant_id)
            .field("scope", &self.scope)
            .field("authority", &self.authority.as_str())
            .finish()
    }
}

/// Credential source, selected once when the configuration is built.
#[derive(Clone, PartialEq)]
pub enum AuthConfig {
    Bearer { token: String },
    ClientCredentials(ClientCredentialsConfig),
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthConfig::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"<hidden>")
                .finish(),
            AuthConfig::ClientCredentials(c) => c.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryConfig {
    pub dir: PathBuf,
    pub extension: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_QUERY_DIR),
            extension: DEFAULT_QUERY_EXTENSION.to_string(),
        }
    }
}

/// Everything a run needs, built once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub api_url: Url,
    pub auth: AuthConfig,
    pub queries: QueryConfig,
    pub timeout: Duration,
    pub network: NetworkPolicy,
    pub report_dir: Option<PathBuf>,
    pub schema_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug)]
struct RawConfig {
    api_url: String,
    auth: RawAuthConfig,
    #[serde(default)]
    queries: RawQueryConfig,
    timeout_secs: Option<u64>,
    network: Option<NetworkPolicy>,
    report_dir: Option<String>,
    schema_dir: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawAuthConfig {
    Bearer {
        token: String,
    },
    ClientCredentials {
        client_id: String,
        client_secret: String,
        tenant_id: String,
        scope: String,
        authority: Option<String>,
    },
}

#[derive(Deserialize, Debug, Default)]
struct RawQueryConfig {
    dir: Option<String>,
    extension: Option<String>,
}

fn config_error(message: impl Into<String>) -> ProbeError {
    ProbeError::Configuration(message.into())
}

fn parse_url(value: &str, what: &str) -> Result<Url, ProbeError> {
    let url = Url::parse(value).map_err(|e| config_error(format!("Invalid {what} '{value}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(config_error(format!(
            "Invalid {what} '{value}': unsupported scheme '{scheme}'"
        ))),
    }
}

fn non_empty(value: String, field: &str) -> Result<String, ProbeError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(config_error(format!("'{field}' must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ProbeError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(config_error(format!(
            "{key} must be true/false or 1/0, got '{value}'"
        ))),
    }
}

impl RawConfig {
    /// Expands `${VAR}` references in every string value.
    fn expand<F>(self, lookup: &F) -> Result<RawConfig, ProbeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expand = |value: String| -> Result<String, ProbeError> {
            shellexpand::env_with_context(&value, |var: &str| {
                lookup(var)
                    .map(Some)
                    .ok_or_else(|| "variable is not set".to_string())
            })
            .map(|v| v.into_owned())
            .map_err(|e| config_error(e.to_string()))
        };
        let expand_opt = |value: Option<String>| value.map(&expand).transpose();

        let auth = match self.auth {
            RawAuthConfig::Bearer { token } => RawAuthConfig::Bearer {
                token: expand(token)?,
            },
            RawAuthConfig::ClientCredentials {
                client_id,
                client_secret,
                tenant_id,
                scope,
                authority,
            } => RawAuthConfig::ClientCredentials {
                client_id: expand(client_id)?,
                client_secret: expand(client_secret)?,
                tenant_id: expand(tenant_id)?,
                scope: expand(scope)?,
                authority: expand_opt(authority)?,
            },
        };

        Ok(RawConfig {
            api_url: expand(self.api_url)?,
            auth,
            queries: RawQueryConfig {
                dir: expand_opt(self.queries.dir)?,
                extension: expand_opt(self.queries.extension)?,
            },
            timeout_secs: self.timeout_secs,
            network: self.network,
            report_dir: expand_opt(self.report_dir)?,
            schema_dir: expand_opt(self.schema_dir)?,
        })
    }

    fn into_config(self) -> Result<ProbeConfig, ProbeError> {
        let api_url = parse_url(self.api_url.trim(), "API URL")?;

        let auth = match self.auth {
            RawAuthConfig::Bearer { token } => AuthConfig::Bearer {
                token: non_empty(token, "token")?,
            },
            RawAuthConfig::ClientCredentials {
                client_id,
                client_secret,
                tenant_id,
                scope,
                authority,
            } => AuthConfig::ClientCredentials(ClientCredentialsConfig {
                client_id: non_empty(client_id, "client_id")?,
                client_secret: non_empty(client_secret, "client_secret")?,
                tenant_id: non_empty(tenant_id, "tenant_id")?,
                scope: non_empty(scope, "scope")?,
                authority: parse_url(
                    authority.as_deref().unwrap_or(DEFAULT_AUTHORITY),
                    "token authority",
                )?,
            }),
        };

        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(config_error("Request timeout must be a positive number of seconds"));
        }

        let extension = self
            .queries
            .extension
            .unwrap_or_else(|| DEFAULT_QUERY_EXTENSION.to_string());
        let extension = non_empty(extension, "extension")?
            .trim_start_matches('.')
            .to_string();

        Ok(ProbeConfig {
            api_url,
            auth,
            queries: QueryConfig {
                dir: self
                    .queries
                    .dir
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_QUERY_DIR)),
                extension,
            },
            timeout: Duration::from_secs(timeout_secs),
            network: self.network.unwrap_or_default(),
            report_dir: self.report_dir.map(PathBuf::from),
            schema_dir: self.schema_dir.map(PathBuf::from),
        })
    }
}

impl ProbeConfig {
    /// Builds the configuration from environment-style variables.
    ///
    /// `BEARER_TOKEN` selects the static token variant. Otherwise all of
    /// `CLIENT_ID`, `CLIENT_SECRET`, `TENANT_ID` and `SCOPE` are required.
    #[instrument(skip(lookup))]
    pub fn from_env<F>(lookup: F) -> Result<Self, ProbeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| {
            var(key).ok_or_else(|| config_error(format!("Missing environment variable: {key}")))
        };

        let api_url = require(API_URL)?;

        let auth = if let Some(token) = var(BEARER_TOKEN) {
            RawAuthConfig::Bearer { token }
        } else {
            let keys = [CLIENT_ID, CLIENT_SECRET, TENANT_ID, SCOPE];
            let missing: Vec<&str> = keys.into_iter().filter(|k| var(k).is_none()).collect();
            if missing.len() == keys.len() {
                return Err(config_error(format!(
                    "Missing credentials: set {BEARER_TOKEN}, or {CLIENT_ID}, {CLIENT_SECRET}, {TENANT_ID} and {SCOPE}"
                )));
            }
            if !missing.is_empty() {
                return Err(config_error(format!(
                    "Missing environment variables: {}",
                    missing.join(", ")
                )));
            }
            RawAuthConfig::ClientCredentials {
                client_id: require(CLIENT_ID)?,
                client_secret: require(CLIENT_SECRET)?,
                tenant_id: require(TENANT_ID)?,
                scope: require(SCOPE)?,
                authority: var(TOKEN_AUTHORITY),
            }
        };

        let timeout_secs = var(REQUEST_TIMEOUT_SECS)
            .map(|v| {
                v.parse::<u64>().map_err(|_| {
                    config_error(format!(
                        "{REQUEST_TIMEOUT_SECS} must be a positive integer, got '{v}'"
                    ))
                })
            })
            .transpose()?;

        let network = var(ALLOWLISTED_NETWORK)
            .map(|v| parse_bool(ALLOWLISTED_NETWORK, &v))
            .transpose()?
            .map(|allowlisted| {
                if allowlisted {
                    NetworkPolicy::Allowlisted
                } else {
                    NetworkPolicy::Restricted
                }
            });

        RawConfig {
            api_url,
            auth,
            queries: RawQueryConfig {
                dir: var(QUERY_DIR),
                extension: var(QUERY_EXTENSION),
            },
            timeout_secs,
            network,
            report_dir: var(TEST_REPORT_DIR),
            schema_dir: var(SCHEMA_DIR),
        }
        .into_config()
    }

    /// Builds the configuration from the process environment.
    pub fn from_process_env() -> Result<Self, ProbeError> {
        Self::from_env(|key| std::env::var(key).ok())
    }

    /// Loads a YAML config file. String values may reference `${VAR}`, which
    /// is resolved through `lookup`.
    #[instrument(skip(lookup))]
    pub fn from_file<F>(path: &Path, lookup: F) -> Result<Self, ProbeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content = fs::read_to_string(path).map_err(|e| {
            config_error(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        let raw: RawConfig = serde_yaml::from_str(&content).map_err(|e| {
            config_error(format!("Failed to parse config file {}: {e}", path.display()))
        })?;
        raw.expand(&lookup)?.into_config()
    }
}
