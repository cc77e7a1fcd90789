//! Error types for credential population and refresh

/// Errors from populating or refreshing user credentials.
///
/// Validation variants are listed in the order the validator checks them;
/// the first failing check decides which one is returned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("must pass in a JSON object containing the user refresh token")]
    MissingInput,

    #[error("the incoming JSON object does not have the \"authorized_user\" type")]
    WrongCredentialType,

    #[error("the incoming JSON object does not contain a client_id field")]
    MissingClientId,

    #[error("the incoming JSON object does not contain a client_secret field")]
    MissingClientSecret,

    #[error("the incoming JSON object does not contain a refresh_token field")]
    MissingRefreshToken,

    #[error("credential parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(#[from] ExchangeError),
}

/// Underlying cause of a failed token endpoint exchange.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

impl ExchangeError {
    /// Whether the authorization server rejected the refresh token itself.
    ///
    /// 401/403 always mean the grant is unusable. A 400 only does when the
    /// body carries the OAuth2 `invalid_grant` error code; other 400s are
    /// request problems that a corrected retry may fix.
    pub fn is_invalid_grant(&self) -> bool {
        match self {
            ExchangeError::Status { status, body } => {
                matches!(status, 401 | 403) || (*status == 400 && body.contains("invalid_grant"))
            }
            _ => false,
        }
    }
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;
