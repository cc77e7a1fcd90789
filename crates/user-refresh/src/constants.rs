//! OAuth2 constants for installed-application user credentials
//!
//! These identify the credential kind and the public Google token endpoint.
//! None of them are secrets; the client secret and tokens live in the
//! credential record.

/// Value of the `type` field in a user refresh-token credential file
pub const AUTHORIZED_USER_TYPE: &str = "authorized_user";

/// Default token endpoint for refresh-token grants
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// `grant_type` sent when exchanging a refresh token
pub const REFRESH_GRANT_TYPE: &str = "refresh_token";

/// Token type assumed when the token endpoint omits `token_type`
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Default timeout for a single token endpoint request
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Access tokens expiring within this window are treated as already expired,
/// so a token handed to a caller does not lapse mid-request.
pub const EAGER_REFRESH_THRESHOLD_SECS: u64 = 300;
