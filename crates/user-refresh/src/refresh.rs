//! User refresh-token client
//!
//! `UserRefreshClient` owns one `CredentialRecord` and an exchange
//! collaborator. It is the only code that mutates the record, through the
//! record's two mutation points.
//!
//! The record sits behind a lock that is never held across an await: a
//! refresh copies the identity out, performs the exchange unlocked, then
//! applies the result. Concurrent refreshes on the same client are not
//! de-duplicated. Each performs its own exchange and the last one to finish
//! decides the stored access token; callers that care must not overlap them.
//! The same holds for a `populate_*` call that lands while a refresh is in
//! flight: the refresh applies its result without re-checking the identity,
//! so a refresh token rotated for the old identity replaces the new one.

use std::io;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures_util::Stream;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use crate::config::RefreshConfig;
use crate::constants::{DEFAULT_TOKEN_TYPE, EAGER_REFRESH_THRESHOLD_SECS};
use crate::credentials::{CredentialRecord, Credentials, TokenResult, now_millis};
use crate::error::{Error, ExchangeError, Result};
use crate::exchange::{HttpTokenExchange, RefreshRequest, TokenExchange, TokenResponse};
use crate::secret::Secret;
use crate::{stream, validate};

/// Result of a successful refresh.
///
/// `credentials` is the snapshot right after the update; `response` is the
/// raw token endpoint response for callers that need extra fields.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub credentials: Credentials,
    pub response: TokenResponse,
}

/// Credentials backed by a user-granted refresh token.
pub struct UserRefreshClient {
    record: RwLock<CredentialRecord>,
    exchange: Arc<dyn TokenExchange>,
    eager_refresh_threshold: Duration,
}

impl UserRefreshClient {
    /// Create a client with optional initial identity.
    ///
    /// Empty fields can be filled later with one of the `populate_*` calls.
    pub fn new(
        client_id: Option<String>,
        client_secret: Option<String>,
        refresh_token: Option<String>,
        exchange: Arc<dyn TokenExchange>,
    ) -> Self {
        Self {
            record: RwLock::new(CredentialRecord::new(
                client_id,
                client_secret,
                refresh_token,
            )),
            exchange,
            eager_refresh_threshold: Duration::from_secs(EAGER_REFRESH_THRESHOLD_SECS),
        }
    }

    /// Create an empty client that refreshes over HTTP per `config`.
    pub fn from_config(config: &RefreshConfig, http: reqwest::Client) -> Self {
        let exchange = Arc::new(HttpTokenExchange::from_config(http, config));
        Self::new(None, None, None, exchange)
            .with_eager_refresh_threshold(config.eager_refresh_threshold())
    }

    pub fn with_eager_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.eager_refresh_threshold = threshold;
        self
    }

    /// Clone of the current record.
    pub fn record(&self) -> CredentialRecord {
        self.read().clone()
    }

    /// Clone of the current credential snapshot.
    pub fn credentials(&self) -> Credentials {
        self.read().credentials().clone()
    }

    /// Populate identity from a parsed `authorized_user` JSON value.
    ///
    /// The record is only touched if every validation check passes.
    pub fn populate_from_object(&self, value: Option<&Value>) -> Result<()> {
        validate::populate_from_object(&mut self.write(), value)
    }

    /// Populate identity from a chunked byte stream containing JSON.
    ///
    /// An absent stream fails with `MissingInput`, but never on the first
    /// poll. Parse failures leave the record untouched.
    pub async fn populate_from_stream<S, B>(&self, source: Option<S>) -> Result<()>
    where
        S: Stream<Item = io::Result<B>>,
        B: AsRef<[u8]>,
    {
        let value = stream::decode_stream(source).await?;
        self.populate_from_object(Some(&value))
    }

    /// Populate identity from an async reader (e.g. an opened credential file).
    pub async fn populate_from_reader<R>(&self, reader: Option<R>) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let value = stream::decode_reader(reader).await?;
        self.populate_from_object(Some(&value))
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Only the record's own refresh token is ever sent. On success the
    /// access token and expiry are replaced together; on any failure the
    /// record keeps its previous state.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let (client_id, client_secret, refresh_token) = {
            let record = self.read();
            record.ensure_refreshable()?;
            (
                record.client_id().to_owned(),
                Secret::new(record.client_secret().to_owned()),
                Secret::new(record.refresh_token().to_owned()),
            )
        };

        debug!(client_id = %client_id, "refreshing access token");
        let request = RefreshRequest {
            client_id: &client_id,
            client_secret: client_secret.expose(),
            refresh_token: refresh_token.expose(),
        };

        let response = match self.exchange.refresh(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    client_id = %client_id,
                    invalid_grant = e.is_invalid_grant(),
                    error = %e,
                    "access token refresh failed"
                );
                return Err(Error::RefreshFailed(e));
            }
        };

        let token_type = response.token_type.as_deref().unwrap_or(DEFAULT_TOKEN_TYPE);
        if let Err(e) = authorization_value(token_type, &response.access_token) {
            warn!(client_id = %client_id, error = %e, "refresh returned an unusable token");
            return Err(Error::RefreshFailed(e));
        }

        let expiry_date = response
            .expires_in
            .map(|secs| now_millis().saturating_add(secs.saturating_mul(1000)));
        let result = TokenResult {
            access_token: Secret::new(response.access_token.clone()),
            token_type: response.token_type.clone(),
            expiry_date,
            refresh_token: response
                .refresh_token
                .clone()
                .filter(|t| !t.is_empty())
                .map(Secret::new),
        };

        let credentials = {
            let mut record = self.write();
            record.apply_token_result(result);
            record.credentials().clone()
        };

        info!(
            client_id = %client_id,
            expires_in = ?response.expires_in,
            rotated_refresh_token = response.refresh_token.is_some(),
            "access token refreshed"
        );
        Ok(RefreshOutcome {
            credentials,
            response,
        })
    }

    /// Current access token, refreshing first if it is missing or expires
    /// within the eager refresh threshold.
    pub async fn access_token(&self) -> Result<String> {
        self.current_token().await.map(|(token, _)| token)
    }

    /// Insert an `Authorization` header carrying the current access token.
    pub async fn authorize(&self, headers: &mut HeaderMap) -> Result<()> {
        let (token, token_type) = self.current_token().await?;
        let value = authorization_value(&token_type, &token).map_err(Error::RefreshFailed)?;
        headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    async fn current_token(&self) -> Result<(String, String)> {
        let cached = self.cached_token();
        if let Some(token) = cached {
            return Ok(token);
        }

        debug!("cached access token missing or expiring, refreshing");
        let outcome = self.refresh().await?;
        let token = outcome.credentials.access_token.ok_or_else(|| {
            Error::RefreshFailed(ExchangeError::InvalidResponse(
                "refresh returned no access token".into(),
            ))
        })?;
        let token_type = outcome
            .credentials
            .token_type
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_owned());
        Ok((token, token_type))
    }

    fn cached_token(&self) -> Option<(String, String)> {
        let record = self.read();
        let credentials = record.credentials();
        let threshold_millis = self.eager_refresh_threshold.as_millis() as u64;
        if credentials.is_expired(now_millis(), threshold_millis) {
            return None;
        }
        let token = credentials.access_token.clone()?;
        let token_type = credentials
            .token_type
            .clone()
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_owned());
        Some((token, token_type))
    }

    fn read(&self) -> RwLockReadGuard<'_, CredentialRecord> {
        self.record.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CredentialRecord> {
        self.record.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sensitive `Authorization` header value for `token_type` and `token`.
///
/// `refresh` runs this before storing a token, so a stored token always
/// encodes.
fn authorization_value(
    token_type: &str,
    token: &str,
) -> std::result::Result<HeaderValue, ExchangeError> {
    let mut value = HeaderValue::from_str(&format!("{token_type} {token}")).map_err(|e| {
        ExchangeError::InvalidResponse(format!(
            "token_type and access_token do not form a valid Authorization header: {e}"
        ))
    })?;
    value.set_sensitive(true);
    Ok(value)
}
