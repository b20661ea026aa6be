// src/config.rs

use crate::error::NilaVerifyError;
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_AUTH_SERVER_URL: &str = "http://localhost:9000";
pub const DEFAULT_CLIENT_ID: &str = "messaging-client";
pub const DEFAULT_CLIENT_SECRET: &str = "secret";
pub const DEFAULT_SCOPES: &str = "message.read message.write";
pub const DEFAULT_TOKEN_PATH: &str = "/oauth2/token";
pub const DEFAULT_JWKS_PATH: &str = "/oauth2/jwks";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Largest accepted clock skew tolerance.
pub const MAX_LEEWAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Every asymmetric JWS algorithm `jsonwebtoken` can verify.
pub const ASYMMETRIC_ALGORITHMS: [Algorithm; 9] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
];

/// Contains the validation settings for the access token.
///
/// This struct is used to configure the specific checks that will be performed
/// on the token, such as allowed algorithms and clock skew tolerance.
#[derive(Debug, Clone)]
pub struct ValidationDetails {
    /// The signing algorithms that are permitted for the access token.
    /// Tokens signed with any other algorithm will be rejected.
    pub algorithms: Vec<Algorithm>,
    /// The tolerance for clock skew when validating `exp` and `nbf`.
    /// Defaults to zero: the token must not be expired at verification time.
    pub leeway: Duration,
}

impl Default for ValidationDetails {
    fn default() -> Self {
        Self {
            algorithms: ASYMMETRIC_ALGORITHMS.to_vec(),
            leeway: Duration::ZERO,
        }
    }
}

/// The main configuration of a verification run.
///
/// It should be constructed using the `ConfigBuilder`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the authorization server, as supplied.
    pub auth_server_url: Url,
    pub client_id: String,
    pub client_secret: String,
    /// Space-delimited scopes requested with the grant.
    pub scopes: String,
    /// Expected `iss` claim.
    pub issuer: String,
    /// Expected `aud` claim.
    pub audience: String,
    pub token_endpoint: Url,
    pub jwks_endpoint: Url,
    /// Upper bound for each HTTP request.
    pub timeout: Duration,
    pub validation: ValidationDetails,
}

/// Joins `path` under `base`, keeping any path prefix `base` already has.
///
/// `Url::join` would replace the last segment of `http://host/auth`, so the base is
/// first normalised to end with a slash.
pub fn endpoint_url(base: &Url, path: &str) -> Result<Url, NilaVerifyError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|e| NilaVerifyError::InvalidUrl(e.to_string()))
}

/// A builder for creating a `Config` instance.
///
/// Unset fields fall back to the defaults of a local Spring Authorization Server
/// with the `messaging-client` registration.
#[derive(Debug, Default, Clone)]
pub struct ConfigBuilder {
    auth_server_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    scopes: Option<String>,
    issuer: Option<String>,
    audience: Option<String>,
    token_path: Option<String>,
    jwks_path: Option<String>,
    timeout: Option<Duration>,
    algorithms: Option<Vec<Algorithm>>,
    leeway: Option<Duration>,
}

impl ConfigBuilder {
    /// Creates a new `ConfigBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the builder from a parsed config file. Later setter calls override it.
    pub fn from_file(file: &FileConfig) -> Result<Self, NilaVerifyError> {
        let mut builder = Self {
            auth_server_url: file.auth_server_url.clone(),
            client_id: file.client_id.clone(),
            client_secret: file.client_secret.clone(),
            scopes: file.scopes.clone(),
            issuer: file.issuer.clone(),
            audience: file.audience.clone(),
            token_path: file.token_path.clone(),
            jwks_path: file.jwks_path.clone(),
            timeout: file.timeout_seconds.map(Duration::from_secs),
            leeway: file.leeway_seconds.map(Duration::from_secs),
            algorithms: None,
        };
        if let Some(names) = &file.algorithms {
            builder = builder.algorithm_names(names)?;
        }
        Ok(builder)
    }

    /// Sets the base URL of the authorization server.
    pub fn auth_server_url(mut self, url: impl Into<String>) -> Self {
        self.auth_server_url = Some(url.into());
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn scopes(mut self, scopes: impl Into<String>) -> Self {
        self.scopes = Some(scopes.into());
        self
    }

    /// Overrides the expected `iss`. Defaults to the authorization server URL.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Overrides the expected `aud`. Defaults to the client ID.
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn token_path(mut self, path: impl Into<String>) -> Self {
        self.token_path = Some(path.into());
        self
    }

    pub fn jwks_path(mut self, path: impl Into<String>) -> Self {
        self.jwks_path = Some(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the allowed signing algorithms.
    /// Defaults to every asymmetric algorithm if not set.
    pub fn algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = Some(algorithms);
        self
    }

    /// Same as [`ConfigBuilder::algorithms`], parsing names such as `RS256`.
    pub fn algorithm_names<S: AsRef<str>>(self, names: &[S]) -> Result<Self, NilaVerifyError> {
        let algorithms = names
            .iter()
            .map(|name| {
                let name = name.as_ref().trim();
                name.parse::<Algorithm>()
                    .map_err(|_| NilaVerifyError::InvalidConfiguration(format!("Invalid algorithm string: {}", name)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.algorithms(algorithms))
    }

    /// Sets the clock skew tolerance. Defaults to zero.
    pub fn leeway(mut self, leeway: Duration) -> Self {
        self.leeway = Some(leeway);
        self
    }

    /// Consumes the builder and returns a `Config` object.
    ///
    /// # Errors
    ///
    /// Returns an error if a URL does not parse, the client ID is empty, the timeout
    /// is zero, the leeway exceeds [`MAX_LEEWAY`], or the algorithm list is empty or
    /// contains a symmetric algorithm.
    pub fn build(self) -> Result<Config, NilaVerifyError> {
        let raw_url = self.auth_server_url.unwrap_or_else(|| DEFAULT_AUTH_SERVER_URL.to_string());
        let raw_url = raw_url.trim();
        let auth_server_url = Url::parse(raw_url).map_err(|e| NilaVerifyError::InvalidUrl(format!("{}: {}", raw_url, e)))?;
        if auth_server_url.cannot_be_a_base() {
            return Err(NilaVerifyError::InvalidUrl(format!("{} cannot be used as a base URL", raw_url)));
        }

        let client_id = self.client_id.unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());
        if client_id.trim().is_empty() {
            return Err(NilaVerifyError::MissingConfiguration("client_id".to_string()));
        }
        let client_secret = self.client_secret.unwrap_or_else(|| DEFAULT_CLIENT_SECRET.to_string());
        let scopes = self.scopes.unwrap_or_else(|| DEFAULT_SCOPES.to_string());

        let token_endpoint = endpoint_url(&auth_server_url, self.token_path.as_deref().unwrap_or(DEFAULT_TOKEN_PATH))?;
        let jwks_endpoint = endpoint_url(&auth_server_url, self.jwks_path.as_deref().unwrap_or(DEFAULT_JWKS_PATH))?;

        // `Url` always renders a trailing slash for an empty path; issuers usually don't have one.
        let issuer = self.issuer.unwrap_or_else(|| raw_url.trim_end_matches('/').to_string());
        let audience = self.audience.unwrap_or_else(|| client_id.clone());

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(NilaVerifyError::InvalidConfiguration("timeout must be greater than zero".to_string()));
        }

        let mut validation = ValidationDetails::default();
        if let Some(algorithms) = self.algorithms {
            if algorithms.is_empty() {
                return Err(NilaVerifyError::InvalidConfiguration("at least one algorithm must be allowed".to_string()));
            }
            if let Some(symmetric) = algorithms.iter().find(|alg| !ASYMMETRIC_ALGORITHMS.contains(*alg)) {
                return Err(NilaVerifyError::InvalidConfiguration(format!(
                    "{:?} is a shared-secret algorithm and cannot be verified with a JWKS",
                    symmetric
                )));
            }
            validation.algorithms = algorithms;
        }
        if let Some(leeway) = self.leeway {
            if leeway > MAX_LEEWAY {
                return Err(NilaVerifyError::InvalidConfiguration(format!(
                    "leeway of {}s exceeds the maximum of {}s",
                    leeway.as_secs(),
                    MAX_LEEWAY.as_secs()
                )));
            }
            validation.leeway = leeway;
        }

        Ok(Config {
            auth_server_url,
            client_id,
            client_secret,
            scopes,
            issuer,
            audience,
            token_endpoint,
            jwks_endpoint,
            timeout,
            validation,
        })
    }
}

/// Logging section of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

/// The YAML config file. Every field is optional; flags and environment variables
/// take precedence over it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub auth_server_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scopes: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub token_path: Option<String>,
    pub jwks_path: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub leeway_seconds: Option<u64>,
    pub algorithms: Option<Vec<String>>,
    pub logging: Option<LoggingConfig>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, NilaVerifyError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            NilaVerifyError::InvalidConfiguration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        serde_yaml::from_str(&raw).map_err(|e| {
            NilaVerifyError::InvalidConfiguration(format!("Failed to parse YAML config from {}: {}", path.display(), e))
        })
    }
}
