//! Access tokens and their lifecycle state

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::SecureString;

/// Lifecycle state of a token relative to the rotation threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenState {
    /// More than the threshold remains
    Valid,
    /// Still valid but within the threshold
    ExpiringSoon,
    /// Past its expiry
    Expired,
}

impl TokenState {
    /// State of something expiring at `expires_at`, seen at `now`
    #[must_use]
    pub fn at(expires_at: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> Self {
        let remaining = expires_at - now;
        if remaining <= Duration::zero() {
            Self::Expired
        } else if remaining < threshold {
            Self::ExpiringSoon
        } else {
            Self::Valid
        }
    }
}

/// A bearer token with an absolute expiry
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: SecureString,
    expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &self.value)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    /// Token expiring at a fixed instant
    #[must_use]
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: SecureString::new(value),
            expires_at,
        }
    }

    /// Token expiring `lifetime` from now
    #[must_use]
    pub fn expiring_in(value: impl Into<String>, lifetime: std::time::Duration) -> Self {
        let lifetime = Duration::from_std(lifetime).unwrap_or_else(|_| Duration::days(365));
        Self::new(value, Utc::now() + lifetime)
    }

    /// Bearer value
    #[must_use]
    pub fn secret(&self) -> &str {
        self.value.expose()
    }

    /// Expiry instant
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Time left at `now` (negative once expired)
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// State at `now` against a rotation threshold
    #[must_use]
    pub fn state(&self, now: DateTime<Utc>, threshold: Duration) -> TokenState {
        TokenState::at(self.expires_at, now, threshold)
    }

    /// Whether the token may still be handed out, keeping `margin` in hand
    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now < self.expires_at - margin
    }
}
