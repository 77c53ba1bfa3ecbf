//! Typed failures returned by the session core.

use std::fmt;

/// Why a bearer credential was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialError {
    MissingHeader,
    MalformedHeader,
    WrongScheme,
    MissingToken,
    SessionNotFound,
    AccessTokenExpired,
    /// The session owner no longer exists; reported without detail.
    UnknownIdentity,
    /// Authorization ran without a resolved identity.
    NoIdentity,
}

impl CredentialError {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MissingHeader => "missing Authorization header",
            Self::MalformedHeader => "malformed header",
            Self::WrongScheme => "wrong scheme",
            Self::MissingToken => "missing token",
            Self::SessionNotFound => "session not found",
            Self::AccessTokenExpired => "access token expired",
            Self::UnknownIdentity | Self::NoIdentity => "unauthenticated",
        }
    }
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Unauthenticated(CredentialError),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    Expired(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Business-rule failures are expected; only `Internal` needs operator attention.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn credential_messages() {
        assert_eq!(
            CredentialError::SessionNotFound.to_string(),
            "session not found"
        );
        assert_eq!(
            CredentialError::AccessTokenExpired.message(),
            "access token expired"
        );
    }

    #[test]
    fn unauthenticated_displays_reason() {
        let err = AuthError::Unauthenticated(CredentialError::WrongScheme);
        assert_eq!(err.to_string(), "wrong scheme");
        assert!(!err.is_internal());
    }

    #[test]
    fn internal_wraps_anyhow() {
        let err: AuthError = anyhow!("connection reset").into();
        assert!(err.is_internal());
        assert!(err.to_string().contains("connection reset"));
    }
}
