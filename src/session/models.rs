//! Identity and session records shared by the stores and the session core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Coarse role attached to every identity.
///
/// `Teacher` is the privileged role with blanket access to student records.
/// `Parent` is restricted to the students it owns.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Teacher,
    Parent,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Parent => "parent",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "teacher" => Some(Self::Teacher),
            "parent" => Some(Self::Parent),
            _ => None,
        }
    }

    /// Privileged roles skip ownership checks entirely.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::Teacher)
    }
}

#[derive(Clone)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"***")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Fields required to persist a new identity.
#[derive(Clone)]
pub struct NewIdentity {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Outcome of inserting an identity; email is unique across identities.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(Identity),
    Conflict,
}

/// Result of exchanging a reset token for a new password hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedeemOutcome {
    Redeemed(Uuid),
    /// Unknown, already used, superseded or expired.
    InvalidToken,
    /// The token's owner is gone; nothing was changed.
    UnknownIdentity,
}

/// Persisted session row. Only token digests are stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub access_token_hash: Vec<u8>,
    pub refresh_token_hash: Vec<u8>,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Freshly issued session handed back to the caller with the raw tokens.
#[derive(Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish()
    }
}

/// Verified identity claim returned by an external identity provider.
#[derive(Clone, Debug, Deserialize)]
pub struct ExternalIdentity {
    pub email: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

impl ExternalIdentity {
    /// Display name for identities created on first federated login.
    #[must_use]
    pub fn display_name(&self) -> String {
        let given = self.given_name.as_deref().map(str::trim).filter(|v| !v.is_empty());
        let family = self.family_name.as_deref().map(str::trim).filter(|v| !v.is_empty());
        match (given, family) {
            (Some(given), Some(family)) => format!("{given} {family}"),
            (Some(given), None) => given.to_string(),
            _ => "Guest".to_string(),
        }
    }
}

/// Payload handed to a [`super::ResetNotifier`] when a reset is requested.
#[derive(Clone, Debug)]
pub struct ResetNotice {
    pub email: String,
    pub name: String,
    pub reset_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!(Role::parse(" Teacher "), Some(Role::Teacher));
        assert_eq!(Role::parse("PARENT"), Some(Role::Parent));
        assert_eq!(Role::parse("admin"), None);
    }

    #[test]
    fn only_teacher_is_privileged() {
        assert!(Role::Teacher.is_privileged());
        assert!(!Role::Parent.is_privileged());
    }

    #[test]
    fn role_serializes_snake_case() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_string(&Role::Teacher)?, "\"teacher\"");
        let role: Role = serde_json::from_str("\"parent\"")?;
        assert_eq!(role, Role::Parent);
        Ok(())
    }

    #[test]
    fn display_name_prefers_full_name() {
        let claim = ExternalIdentity {
            email: "ann@example.com".to_string(),
            given_name: Some("Ann".to_string()),
            family_name: Some("Lee".to_string()),
        };
        assert_eq!(claim.display_name(), "Ann Lee");

        let claim = ExternalIdentity {
            family_name: None,
            ..claim
        };
        assert_eq!(claim.display_name(), "Ann");

        let claim = ExternalIdentity {
            given_name: Some("  ".to_string()),
            family_name: Some("Lee".to_string()),
            ..claim
        };
        assert_eq!(claim.display_name(), "Guest");
    }

    #[test]
    fn debug_output_hides_secrets() {
        let now = Utc::now();
        let session = Session {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            access_token: "access-secret".to_string(),
            refresh_token: "refresh-secret".to_string(),
            access_expires_at: now,
            refresh_expires_at: now,
        };
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("access-secret"));
        assert!(!rendered.contains("refresh-secret"));

        let identity = Identity {
            id: Uuid::nil(),
            name: "Ann".to_string(),
            email: "ann@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::Parent,
            created_at: now,
            updated_at: now,
        };
        assert!(!format!("{identity:?}").contains("argon2id"));
    }
}
