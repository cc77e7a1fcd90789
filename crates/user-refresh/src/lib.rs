//! User refresh-token credentials
//!
//! Builds, validates, and refreshes credentials derived from a long-lived
//! refresh token issued by an installed-application OAuth2 flow. The crate
//! owns the credential state and the refresh protocol; the actual HTTP call
//! to the token endpoint goes through the `TokenExchange` trait so it can be
//! swapped out in tests or by callers with their own transport.
//!
//! Credential flow:
//! 1. Caller builds a `UserRefreshClient` with an exchange collaborator
//! 2. Identity is loaded via `populate_from_object()` (parsed JSON) or
//!    `populate_from_stream()` / `populate_from_reader()` (raw bytes)
//! 3. `refresh()` trades the stored refresh token for an access token
//! 4. `access_token()` / `authorize()` reuse the cached token until it is
//!    close to expiry, refreshing on demand
//! 5. `complete()` / `complete_now()` adapt any of the above to an optional
//!    completion callback

pub mod completion;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod exchange;
pub mod refresh;
pub mod secret;
pub mod stream;
pub mod validate;

pub use completion::{Completion, complete, complete_now};
pub use config::{ConfigError, RefreshConfig};
pub use constants::*;
pub use credentials::{CredentialRecord, Credentials};
pub use error::{Error, ExchangeError, Result};
pub use exchange::{HttpTokenExchange, RefreshRequest, TokenExchange, TokenResponse};
pub use refresh::{RefreshOutcome, UserRefreshClient};
pub use secret::Secret;
pub use validate::AuthorizedUser;
