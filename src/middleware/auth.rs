//! Identity extraction for Axum
//!
//! The fronting auth proxy verifies the caller and forwards two trusted
//! headers: the display principal and the authorization subject. Neither is
//! required at upgrade time; the session manager rejects prompts from a
//! connection that lacks them.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use wayfarer_core::Principal;

use crate::server::config::AuthConfig;

/// Axum extractor resolving the connection's principal from trusted headers
///
/// Header names come from an `Extension<Arc<AuthConfig>>` when present,
/// otherwise the defaults (`x-auth-user`, `x-auth-subject`).
pub struct ResolvedIdentity(pub Principal);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for ResolvedIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let defaults;
        let config = match parts.extensions.get::<Arc<AuthConfig>>() {
            Some(config) => config.as_ref(),
            None => {
                defaults = AuthConfig::default();
                &defaults
            }
        };

        Ok(ResolvedIdentity(resolve_principal(parts, config)))
    }
}

/// Read both identity headers; blank values count as absent
pub fn resolve_principal(parts: &Parts, config: &AuthConfig) -> Principal {
    Principal {
        display_name: header_value(parts, &config.principal_header),
        subject_id: header_value(parts, &config.subject_header),
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
