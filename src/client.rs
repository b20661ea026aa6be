// src/client.rs

use crate::config::Config;
use crate::error::NilaVerifyError;
use crate::model::{JsonWebKeySet, OAuthErrorResponse, TokenResponse};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

/// HTTP client for the two authorization server endpoints the harness talks to.
///
/// Holds no state besides the connection pool; every call is independent.
pub struct AuthServerClient<'a> {
    config: &'a Config,
    http_client: reqwest::Client,
}

impl<'a> AuthServerClient<'a> {
    /// Creates a client whose requests are bounded by `config.timeout`.
    pub fn new(config: &'a Config) -> Result<Self, NilaVerifyError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(NilaVerifyError::HttpClient)?;
        Ok(Self { config, http_client })
    }

    /// Requests an access token with the client credentials grant, authenticating
    /// the client with HTTP Basic.
    #[instrument(skip(self), fields(endpoint = %self.config.token_endpoint, client_id = %self.config.client_id), err)]
    pub async fn request_token(&self) -> Result<TokenResponse, NilaVerifyError> {
        let endpoint = &self.config.token_endpoint;

        let mut form = vec![("grant_type", "client_credentials")];
        let scopes = self.config.scopes.trim();
        if !scopes.is_empty() {
            form.push(("scope", scopes));
        }

        let request = self
            .http_client
            .post(endpoint.clone())
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(ACCEPT, "application/json")
            .form(&form);

        let token: TokenResponse = self.execute(endpoint, request).await?;
        if token.access_token.trim().is_empty() {
            return Err(NilaVerifyError::MalformedResponse {
                endpoint: endpoint.to_string(),
                reason: "'access_token' is empty".to_string(),
            });
        }
        debug!(token_type = %token.token_type, expires_in = ?token.expires_in, "Access token issued");
        Ok(token)
    }

    /// Fetches the authorization server's JSON Web Key Set.
    #[instrument(skip(self), fields(endpoint = %self.config.jwks_endpoint), err)]
    pub async fn fetch_jwks(&self) -> Result<JsonWebKeySet, NilaVerifyError> {
        let endpoint = &self.config.jwks_endpoint;
        let request = self.http_client.get(endpoint.clone()).header(ACCEPT, "application/json");
        let jwks: JsonWebKeySet = self.execute(endpoint, request).await?;
        debug!("Successfully fetched {} keys", jwks.keys.len());
        Ok(jwks)
    }

    /// Sends the request, rejects non-2xx statuses with the body verbatim and parses
    /// a 2xx body as `T`.
    async fn execute<T: DeserializeOwned>(
        &self,
        endpoint: &Url,
        request: reqwest::RequestBuilder,
    ) -> Result<T, NilaVerifyError> {
        let transport = |source| NilaVerifyError::Transport {
            endpoint: endpoint.to_string(),
            source,
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        if !status.is_success() {
            match serde_json::from_str::<OAuthErrorResponse>(&body) {
                Ok(oauth_error) => warn!(
                    status = status.as_u16(),
                    error = %oauth_error.error,
                    description = oauth_error.error_description.as_deref().unwrap_or(""),
                    "Authorization server rejected the request"
                ),
                Err(_) => warn!(status = status.as_u16(), "Authorization server rejected the request"),
            }
            return Err(NilaVerifyError::UnexpectedStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| NilaVerifyError::MalformedResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}
