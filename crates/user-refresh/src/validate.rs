//! Input validation for `authorized_user` credential objects
//!
//! Parsed JSON is decoded into a typed `AuthorizedUser` before anything
//! touches the credential record. Checks run in a fixed order and the first
//! failure wins:
//! 1. input present and not `null`  → `MissingInput`
//! 2. `type == "authorized_user"`   → `WrongCredentialType`
//! 3. `client_id` non-empty string  → `MissingClientId`
//! 4. `client_secret` non-empty     → `MissingClientSecret`
//! 5. `refresh_token` non-empty     → `MissingRefreshToken`
//!
//! Identity fields must be non-empty strings. Any other JSON value (number,
//! object, `null`) is treated the same as an absent field.

use std::fmt;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::constants::AUTHORIZED_USER_TYPE;
use crate::credentials::CredentialRecord;
use crate::error::{Error, Result};

/// A validated user identity, ready to be applied to a credential record.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl AuthorizedUser {
    /// Decode an untyped JSON value into an identity.
    pub fn from_value(value: Option<&Value>) -> Result<Self> {
        let value = match value {
            Some(v) if !v.is_null() => v,
            _ => return Err(Error::MissingInput),
        };

        if value.get("type").and_then(Value::as_str) != Some(AUTHORIZED_USER_TYPE) {
            return Err(Error::WrongCredentialType);
        }

        let client_id = required_string(value, "client_id").ok_or(Error::MissingClientId)?;
        let client_secret =
            required_string(value, "client_secret").ok_or(Error::MissingClientSecret)?;
        let refresh_token =
            required_string(value, "refresh_token").ok_or(Error::MissingRefreshToken)?;

        Ok(Self {
            client_id,
            client_secret,
            refresh_token,
        })
    }

    /// Render the identity in the `authorized_user` input shape.
    pub fn to_json(&self) -> Value {
        json!({
            "type": AUTHORIZED_USER_TYPE,
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "refresh_token": self.refresh_token,
        })
    }
}

impl fmt::Debug for AuthorizedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedUser")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

fn required_string(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Validate `value` and, only if every check passes, apply it to `record`.
///
/// On failure the record is left exactly as it was.
pub fn populate_from_object(record: &mut CredentialRecord, value: Option<&Value>) -> Result<()> {
    match AuthorizedUser::from_value(value) {
        Ok(identity) => {
            debug!(client_id = %identity.client_id, "loaded authorized_user credentials");
            record.apply_identity(identity);
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "rejected authorized_user credentials");
            Err(e)
        }
    }
}
