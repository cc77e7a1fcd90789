//! Credential record for user refresh-token credentials
//!
//! The record holds the client identity, the refresh token, and the most
//! recent access token with its expiry. It has exactly two mutation points:
//! `apply_identity` (JSON population) and `apply_token_result` (refresh).
//! Both replace every field they own in one call, so a failed validation or
//! refresh can never leave the record half-updated.
//!
//! The refresh token is written twice: once into the canonical field used for
//! the next exchange, and once into the `Credentials` snapshot that request
//! signing code reads. Both writes happen in the same mutation point.

use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::secret::Secret;
use crate::validate::AuthorizedUser;

/// Externally visible token state, read by request signing code.
///
/// `expiry_date` is a unix timestamp in milliseconds (absolute, not a delta).
/// `refresh_token` is populated as soon as an identity is loaded, before any
/// network refresh has happened.
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct Credentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<u64>,
}

impl Credentials {
    /// Whether the access token is missing or expires within `threshold_millis`.
    ///
    /// A token without an expiry is treated as expired.
    pub fn is_expired(&self, now_millis: u64, threshold_millis: u64) -> bool {
        match (&self.access_token, self.expiry_date) {
            (Some(_), Some(expiry)) => expiry <= now_millis.saturating_add(threshold_millis),
            _ => true,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("token_type", &self.token_type)
            .field("expiry_date", &self.expiry_date)
            .finish()
    }
}

/// Token state produced by one successful exchange.
///
/// `refresh_token` is only set when the authorization server rotated it.
#[derive(Debug)]
pub(crate) struct TokenResult {
    pub access_token: Secret<String>,
    pub token_type: Option<String>,
    pub expiry_date: Option<u64>,
    pub refresh_token: Option<Secret<String>>,
}

/// Mutable credential state shared by every holder of a `UserRefreshClient`.
#[derive(Debug, Clone, Default)]
pub struct CredentialRecord {
    client_id: String,
    client_secret: Secret<String>,
    refresh_token: Secret<String>,
    access_token: Option<Secret<String>>,
    expiry_date: Option<u64>,
    credentials: Credentials,
}

impl CredentialRecord {
    /// Create a record from optional initial values.
    ///
    /// Any field may be left empty and filled in later by population. A
    /// non-empty refresh token is mirrored into the snapshot right away.
    pub fn new(
        client_id: Option<String>,
        client_secret: Option<String>,
        refresh_token: Option<String>,
    ) -> Self {
        let refresh_token = refresh_token.unwrap_or_default();
        let credentials = Credentials {
            refresh_token: (!refresh_token.is_empty()).then(|| refresh_token.clone()),
            ..Credentials::default()
        };
        Self {
            client_id: client_id.unwrap_or_default(),
            client_secret: Secret::new(client_secret.unwrap_or_default()),
            refresh_token: Secret::new(refresh_token),
            access_token: None,
            expiry_date: None,
            credentials,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        self.client_secret.expose()
    }

    pub fn refresh_token(&self) -> &str {
        self.refresh_token.expose()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_ref().map(|t| t.expose().as_str())
    }

    /// Access token expiry as unix milliseconds, `None` if unknown.
    pub fn expiry_date(&self) -> Option<u64> {
        self.expiry_date
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Check that the record carries everything a refresh needs.
    ///
    /// Fields are checked in the same order as JSON validation.
    pub fn ensure_refreshable(&self) -> Result<()> {
        if self.client_id.is_empty() {
            return Err(Error::MissingClientId);
        }
        if self.client_secret.is_empty() {
            return Err(Error::MissingClientSecret);
        }
        if self.refresh_token.is_empty() {
            return Err(Error::MissingRefreshToken);
        }
        Ok(())
    }

    /// Replace the client identity and refresh token.
    ///
    /// The snapshot's refresh token is updated in the same step.
    pub(crate) fn apply_identity(&mut self, identity: AuthorizedUser) {
        let AuthorizedUser {
            client_id,
            client_secret,
            refresh_token,
        } = identity;
        self.credentials.refresh_token = Some(refresh_token.clone());
        self.client_id = client_id;
        self.client_secret = Secret::new(client_secret);
        self.refresh_token = Secret::new(refresh_token);
    }

    /// Store the outcome of a successful exchange.
    ///
    /// Access token and expiry are always replaced together, including when
    /// the server omitted `expires_in` (expiry becomes unknown).
    pub(crate) fn apply_token_result(&mut self, result: TokenResult) {
        let TokenResult {
            access_token,
            token_type,
            expiry_date,
            refresh_token,
        } = result;

        if let Some(rotated) = refresh_token {
            self.credentials.refresh_token = Some(rotated.expose().clone());
            self.refresh_token = rotated;
        }

        self.credentials.access_token = Some(access_token.expose().clone());
        self.credentials.token_type = token_type;
        self.credentials.expiry_date = expiry_date;
        self.access_token = Some(access_token);
        self.expiry_date = expiry_date;
    }
}

/// Current time as unix milliseconds.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(suffix: &str) -> AuthorizedUser {
        AuthorizedUser {
            client_id: format!("id_{suffix}"),
            client_secret: format!("secret_{suffix}"),
            refresh_token: format!("rt_{suffix}"),
        }
    }

    fn token_result(access: &str, expiry_date: Option<u64>) -> TokenResult {
        TokenResult {
            access_token: Secret::new(access.to_owned()),
            token_type: Some("Bearer".into()),
            expiry_date,
            refresh_token: None,
        }
    }

    #[test]
    fn empty_record_is_not_refreshable() {
        let record = CredentialRecord::default();
        assert!(matches!(
            record.ensure_refreshable(),
            Err(Error::MissingClientId)
        ));
        assert!(record.access_token().is_none());
        assert!(record.expiry_date().is_none());
        assert!(record.credentials().refresh_token.is_none());
    }

    #[test]
    fn refreshable_checks_follow_field_order() {
        let record = CredentialRecord::new(Some("id".into()), None, None);
        assert!(matches!(
            record.ensure_refreshable(),
            Err(Error::MissingClientSecret)
        ));

        let record = CredentialRecord::new(Some("id".into()), Some("secret".into()), None);
        assert!(matches!(
            record.ensure_refreshable(),
            Err(Error::MissingRefreshToken)
        ));

        let record = CredentialRecord::new(
            Some("id".into()),
            Some("secret".into()),
            Some("rt".into()),
        );
        assert!(record.ensure_refreshable().is_ok());
    }

    #[test]
    fn constructor_seeds_snapshot_refresh_token() {
        let record = CredentialRecord::new(None, None, Some("rt_init".into()));
        assert_eq!(record.refresh_token(), "rt_init");
        assert_eq!(
            record.credentials().refresh_token.as_deref(),
            Some("rt_init")
        );
    }

    #[test]
    fn apply_identity_keeps_snapshot_in_sync() {
        let mut record = CredentialRecord::default();
        record.apply_identity(identity("a"));

        assert_eq!(record.client_id(), "id_a");
        assert_eq!(record.client_secret(), "secret_a");
        assert_eq!(record.refresh_token(), "rt_a");
        assert_eq!(record.credentials().refresh_token.as_deref(), Some("rt_a"));
    }

    #[test]
    fn apply_identity_preserves_token_state() {
        let mut record = CredentialRecord::default();
        record.apply_identity(identity("a"));
        record.apply_token_result(token_result("at_1", Some(42)));

        record.apply_identity(identity("b"));
        assert_eq!(record.refresh_token(), "rt_b");
        assert_eq!(record.access_token(), Some("at_1"));
        assert_eq!(record.expiry_date(), Some(42));
    }

    #[test]
    fn apply_token_result_updates_token_and_expiry_together() {
        let mut record = CredentialRecord::default();
        record.apply_identity(identity("a"));
        record.apply_token_result(token_result("at_1", Some(1_000)));

        assert_eq!(record.access_token(), Some("at_1"));
        assert_eq!(record.expiry_date(), Some(1_000));
        assert_eq!(record.credentials().access_token.as_deref(), Some("at_1"));
        assert_eq!(record.credentials().expiry_date, Some(1_000));
        assert_eq!(record.credentials().token_type.as_deref(), Some("Bearer"));

        // No expires_in on the next response clears the old expiry as well
        record.apply_token_result(token_result("at_2", None));
        assert_eq!(record.access_token(), Some("at_2"));
        assert_eq!(record.expiry_date(), None);
        assert_eq!(record.credentials().expiry_date, None);
    }

    #[test]
    fn rotated_refresh_token_updates_both_copies() {
        let mut record = CredentialRecord::default();
        record.apply_identity(identity("a"));
        record.apply_token_result(TokenResult {
            refresh_token: Some(Secret::new("rt_rotated".into())),
            ..token_result("at_1", Some(1_000))
        });

        assert_eq!(record.refresh_token(), "rt_rotated");
        assert_eq!(
            record.credentials().refresh_token.as_deref(),
            Some("rt_rotated")
        );
    }

    #[test]
    fn credentials_expiry_respects_threshold() {
        let creds = Credentials {
            access_token: Some("at".into()),
            expiry_date: Some(10_000),
            ..Credentials::default()
        };
        assert!(!creds.is_expired(5_000, 1_000));
        assert!(creds.is_expired(9_500, 1_000));
        assert!(creds.is_expired(10_000, 0));

        let no_expiry = Credentials {
            access_token: Some("at".into()),
            ..Credentials::default()
        };
        assert!(no_expiry.is_expired(0, 0));
        assert!(Credentials::default().is_expired(0, 0));
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let mut record = CredentialRecord::default();
        record.apply_identity(identity("a"));
        record.apply_token_result(token_result("at_visible?", Some(1)));

        let debug = format!("{record:?}");
        assert!(!debug.contains("rt_a"), "got: {debug}");
        assert!(!debug.contains("secret_a"), "got: {debug}");
        assert!(!debug.contains("at_visible?"), "got: {debug}");
        assert!(debug.contains("id_a"), "got: {debug}");
    }

    #[test]
    fn credentials_serialize_without_empty_fields() {
        let creds = Credentials {
            refresh_token: Some("rt".into()),
            ..Credentials::default()
        };
        let json = serde_json::to_string(&creds).unwrap();
        assert_eq!(json, r#"{"refresh_token":"rt"}"#);
    }
}
