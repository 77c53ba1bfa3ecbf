//! Bearer credential resolution.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{
    error::{AuthError, CredentialError},
    models::Identity,
    repo::{IdentityRepo, SessionRepo},
    token::hash_token,
};

/// Split an `Authorization` header value into its bearer credential.
///
/// The header must be exactly `Bearer <token>` separated by a single space.
///
/// # Errors
/// Returns the structural defect found in the header.
pub fn parse_bearer(header: Option<&str>) -> Result<&str, CredentialError> {
    let header = header.ok_or(CredentialError::MissingHeader)?;
    let parts: Vec<&str> = header.split(' ').collect();
    if parts.len() > 2 {
        return Err(CredentialError::MalformedHeader);
    }
    if parts[0] != "Bearer" {
        return Err(CredentialError::WrongScheme);
    }
    match parts.get(1) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(CredentialError::MissingToken),
    }
}

/// Resolves bearer tokens to live identities. Read only.
#[derive(Clone)]
pub struct Authenticator {
    sessions: Arc<dyn SessionRepo>,
    identities: Arc<dyn IdentityRepo>,
}

impl Authenticator {
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionRepo>, identities: Arc<dyn IdentityRepo>) -> Self {
        Self {
            sessions,
            identities,
        }
    }

    /// Resolve the identity behind an `Authorization` header value.
    ///
    /// # Errors
    /// `Unauthenticated` on any credential defect, `Internal` on store failure.
    pub async fn resolve(&self, header: Option<&str>) -> Result<Identity, AuthError> {
        self.resolve_at(header, Utc::now()).await
    }

    /// Same as [`Self::resolve`] with an explicit clock.
    ///
    /// # Errors
    /// `Unauthenticated` on any credential defect, `Internal` on store failure.
    pub async fn resolve_at(
        &self,
        header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Identity, AuthError> {
        let token = parse_bearer(header).map_err(AuthError::Unauthenticated)?;

        let session = self
            .sessions
            .find_by_access_token(&hash_token(token))
            .await?
            .ok_or(AuthError::Unauthenticated(CredentialError::SessionNotFound))?;

        if now > session.access_expires_at {
            debug!(session_id = %session.id, "access token expired");
            return Err(AuthError::Unauthenticated(
                CredentialError::AccessTokenExpired,
            ));
        }

        self.identities
            .find_by_id(session.user_id)
            .await?
            .ok_or(AuthError::Unauthenticated(CredentialError::UnknownIdentity))
    }
}
