//! Session token bundle as returned by the token exchange and persisted in the
//! per-profile cache file.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// HTTP status the token exchange must report for a bundle to be usable.
/// Only an exact match counts; other 2xx codes are rejected.
pub const SUCCESS_STATUS: u16 = 200;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &"** redacted **")
            .finish()
    }
}

/// One complete token exchange result. The cache file holds exactly one of
/// these, serialized as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub credentials: Credentials,
    pub expiration: DateTime<Utc>,
    pub response_status: u16,
}

impl SessionToken {
    pub fn is_success(&self) -> bool {
        self.response_status == SUCCESS_STATUS
    }

    /// A bundle can be handed out without a refresh when the exchange
    /// succeeded and the token outlives `now`.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_success() && !is_expired(self.expiration, now)
    }
}

/// `true` once `now` has reached `expiration`. Both sides are UTC instants, so
/// the local timezone of the host never enters the comparison.
pub fn is_expired(expiration: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expiration <= now
}
