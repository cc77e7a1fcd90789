//! Token endpoint exchange
//!
//! `TokenExchange` is the one capability the refresher needs from the
//! outside world: trade a refresh token plus client identity for a new
//! access token. `HttpTokenExchange` implements it as a standard OAuth2
//! refresh-token grant (form POST to the token endpoint). There is no retry
//! here; a failed exchange is reported once and left to the caller.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::config::RefreshConfig;
use crate::constants::{DEFAULT_TIMEOUT_SECS, REFRESH_GRANT_TYPE};
use crate::error::ExchangeError;

/// Parameters of one refresh-token grant.
#[derive(Clone, Copy)]
pub struct RefreshRequest<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub refresh_token: &'a str,
}

impl fmt::Debug for RefreshRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshRequest")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Successful response from the token endpoint.
///
/// `expires_in` is a delta in seconds from the response time. The refresher
/// converts it to an absolute unix millisecond timestamp. `refresh_token` is
/// only present when the server rotates it.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Capability to exchange a refresh token for an access token.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn TokenExchange>`).
pub trait TokenExchange: Send + Sync {
    fn refresh<'a>(
        &'a self,
        request: RefreshRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<TokenResponse, ExchangeError>> + Send + 'a>>;
}

/// reqwest-backed refresh-token grant against a token endpoint.
#[derive(Debug, Clone)]
pub struct HttpTokenExchange {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpTokenExchange {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn from_config(client: reqwest::Client, config: &RefreshConfig) -> Self {
        Self::new(client, config.token_endpoint.clone()).with_timeout(config.timeout())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_refresh(
        &self,
        request: RefreshRequest<'_>,
    ) -> Result<TokenResponse, ExchangeError> {
        debug!(endpoint = %self.endpoint, client_id = request.client_id, "posting refresh grant");

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .form(&[
                ("grant_type", REFRESH_GRANT_TYPE),
                ("refresh_token", request.refresh_token),
                ("client_id", request.client_id),
                ("client_secret", request.client_secret),
            ])
            .send()
            .await
            .map_err(|e| ExchangeError::Http(format!("token refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(ExchangeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| ExchangeError::InvalidResponse(e.to_string()))?;

        if token.access_token.is_empty() {
            return Err(ExchangeError::InvalidResponse(
                "empty access_token in refresh response".into(),
            ));
        }

        Ok(token)
    }
}

impl TokenExchange for HttpTokenExchange {
    fn refresh<'a>(
        &'a self,
        request: RefreshRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<TokenResponse, ExchangeError>> + Send + 'a>> {
        Box::pin(self.post_refresh(request))
    }
}
