//! Session lifecycle: registration, login, rotation, logout and password reset.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    error::AuthError,
    models::{
        CreateOutcome, Identity, NewIdentity, RedeemOutcome, ResetNotice, Role, Session,
        SessionRecord,
    },
    password::{hash_password_blocking, verify_password_blocking},
    repo::{
        IdentityProvider, IdentityRepo, LogResetNotifier, ResetNotifier, ResetTokenRepo,
        SessionRepo,
    },
    token::{generate_token, hash_token, TokenIssuer},
};

pub const DEFAULT_RESET_TTL_SECONDS: i64 = 15 * 60;
pub const DEFAULT_FRONTEND_BASE_URL: &str = "http://localhost:3000";

const NAME_MIN: usize = 3;
const NAME_MAX: usize = 30;

#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

static EMAIL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    EMAIL_RE
        .as_ref()
        .is_some_and(|regex| regex.is_match(email_normalized))
}

#[derive(Clone)]
pub struct SessionManager {
    identities: Arc<dyn IdentityRepo>,
    sessions: Arc<dyn SessionRepo>,
    reset_tokens: Arc<dyn ResetTokenRepo>,
    issuer: TokenIssuer,
    provider: Option<Arc<dyn IdentityProvider>>,
    notifier: Arc<dyn ResetNotifier>,
    reset_ttl: TimeDelta,
    frontend_base_url: String,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        identities: Arc<dyn IdentityRepo>,
        sessions: Arc<dyn SessionRepo>,
        reset_tokens: Arc<dyn ResetTokenRepo>,
        issuer: TokenIssuer,
    ) -> Self {
        Self {
            identities,
            sessions,
            reset_tokens,
            issuer,
            provider: None,
            notifier: Arc::new(LogResetNotifier),
            reset_ttl: TimeDelta::minutes(15),
            frontend_base_url: DEFAULT_FRONTEND_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn ResetNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// # Errors
    /// Returns an error if the TTL is not positive or out of range.
    pub fn with_reset_ttl_seconds(mut self, seconds: i64) -> anyhow::Result<Self> {
        if seconds <= 0 {
            anyhow::bail!("reset token TTL must be positive");
        }
        self.reset_ttl = TimeDelta::try_seconds(seconds).context("reset token TTL out of range")?;
        Ok(self)
    }

    #[must_use]
    pub fn with_frontend_base_url(mut self, url: &str) -> Self {
        self.frontend_base_url = url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub const fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    #[must_use]
    pub fn federation_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Create a Parent identity with an Argon2 password hash.
    ///
    /// # Errors
    /// `BadRequest` on invalid input, `Conflict` when the email is taken.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let name = name.trim();
        let name_len = name.chars().count();
        if !(NAME_MIN..=NAME_MAX).contains(&name_len) {
            return Err(AuthError::BadRequest("name must be 3 to 30 characters"));
        }
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::BadRequest("invalid email"));
        }
        if password.is_empty() {
            return Err(AuthError::BadRequest("password is required"));
        }

        if self.identities.find_by_email(&email).await?.is_some() {
            return Err(AuthError::Conflict("Email in use"));
        }

        let password_hash = hash_password_blocking(password.to_string()).await?;
        let outcome = self
            .identities
            .create(NewIdentity {
                name: name.to_string(),
                email,
                password_hash,
                role: Role::Parent,
            })
            .await?;

        match outcome {
            CreateOutcome::Created(identity) => {
                info!(user_id = %identity.id, "identity registered");
                Ok(identity)
            }
            CreateOutcome::Conflict => Err(AuthError::Conflict("Email in use")),
        }
    }

    /// # Errors
    /// `NotFound` for unknown emails, `Unauthorized` for a wrong password.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let identity = self
            .identities
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AuthError::NotFound("User not found"))?;

        let valid =
            verify_password_blocking(identity.password_hash.clone(), password.to_string()).await?;
        if !valid {
            debug!(user_id = %identity.id, "password mismatch");
            return Err(AuthError::Unauthorized("Unauthorized"));
        }

        let session = self.issue_session(identity.id).await?;
        info!(user_id = %identity.id, session_id = %session.id, "login");
        Ok(session)
    }

    /// Delete the session if present; unknown ids are not an error.
    ///
    /// # Errors
    /// `Internal` on store failure.
    pub async fn logout(&self, session_id: Uuid) -> Result<(), AuthError> {
        if self.sessions.delete_by_id(session_id).await? {
            info!(%session_id, "logout");
        }
        Ok(())
    }

    /// Rotate a session: the old pair is consumed and a new session is issued.
    ///
    /// # Errors
    /// `Unauthorized` when the pair matches nothing, `Expired` past the refresh window.
    pub async fn refresh(&self, session_id: Uuid, refresh_token: &str) -> Result<Session, AuthError> {
        self.refresh_at(session_id, refresh_token, Utc::now()).await
    }

    /// Same as [`Self::refresh`] with an explicit clock.
    ///
    /// # Errors
    /// `Unauthorized` when the pair matches nothing, `Expired` past the refresh window.
    pub async fn refresh_at(
        &self,
        session_id: Uuid,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, AuthError> {
        let record = self
            .sessions
            .find_by_id_and_refresh_token(session_id, &hash_token(refresh_token))
            .await?
            .ok_or(AuthError::Unauthorized("Session not found"))?;

        if now > record.refresh_expires_at {
            return Err(AuthError::Expired("Session token expired"));
        }

        // A concurrent refresh that deleted first wins.
        if !self.sessions.delete_by_id(record.id).await? {
            return Err(AuthError::Unauthorized("Session not found"));
        }

        let session = self.issue_session_at(record.user_id, now).await?;
        info!(user_id = %record.user_id, old_session_id = %record.id, session_id = %session.id, "session refreshed");
        Ok(session)
    }

    /// Sign in through the external provider, creating the identity on first use.
    ///
    /// # Errors
    /// `Unauthorized` if federation is disabled or the provider rejects the code.
    pub async fn login_federated(&self, code: &str) -> Result<Session, AuthError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(AuthError::Unauthorized("Federated login is not configured"))?;
        let claim = provider.exchange_code(code).await?;
        let email = normalize_email(&claim.email);

        let identity = match self.identities.find_by_email(&email).await? {
            Some(identity) => identity,
            None => {
                let password_hash = hash_password_blocking(generate_token()?).await?;
                let outcome = self
                    .identities
                    .create(NewIdentity {
                        name: claim.display_name(),
                        email: email.clone(),
                        password_hash,
                        role: Role::Parent,
                    })
                    .await?;
                match outcome {
                    CreateOutcome::Created(identity) => {
                        info!(user_id = %identity.id, "identity created from federated login");
                        identity
                    }
                    // Lost a race with a concurrent first login.
                    CreateOutcome::Conflict => self
                        .identities
                        .find_by_email(&email)
                        .await?
                        .ok_or(AuthError::NotFound("User not found"))?,
                }
            }
        };

        let session = self.issue_session(identity.id).await?;
        info!(user_id = %identity.id, session_id = %session.id, "federated login");
        Ok(session)
    }

    /// Issue a reset token for the identity and hand the link to the notifier.
    ///
    /// Tokens issued earlier for the same identity stop working.
    ///
    /// # Errors
    /// `NotFound` for unknown emails, `Internal` if storing or notifying fails.
    pub async fn request_reset(&self, email: &str) -> Result<(), AuthError> {
        let identity = self
            .identities
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AuthError::NotFound("User not found"))?;

        let token = generate_token()?;
        let expires_at = Utc::now() + self.reset_ttl;
        let superseded = self.reset_tokens.delete_by_owner(identity.id).await?;
        if superseded > 0 {
            debug!(user_id = %identity.id, superseded, "previous reset tokens dropped");
        }
        self.reset_tokens
            .create(identity.id, &hash_token(&token), expires_at)
            .await?;

        let notice = ResetNotice {
            email: identity.email.clone(),
            name: identity.name.clone(),
            reset_url: format!("{}/reset-password?token={token}", self.frontend_base_url),
        };
        self.notifier
            .notify(&notice)
            .await
            .context("Failed to send the email, please try again later.")?;
        info!(user_id = %identity.id, "password reset requested");
        Ok(())
    }

    /// Redeem a reset token for a new password and revoke existing sessions.
    ///
    /// The token stays valid if anything fails before the password is stored.
    ///
    /// # Errors
    /// `Unauthorized` for an unknown or expired token, `BadRequest` for an empty password.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), AuthError> {
        if password.is_empty() {
            return Err(AuthError::BadRequest("password is required"));
        }
        let password_hash = hash_password_blocking(password.to_string()).await?;

        let user_id = match self
            .reset_tokens
            .redeem(&hash_token(token), &password_hash, Utc::now())
            .await?
        {
            RedeemOutcome::Redeemed(user_id) => user_id,
            RedeemOutcome::InvalidToken => {
                return Err(AuthError::Unauthorized("Token is expired or invalid"))
            }
            RedeemOutcome::UnknownIdentity => return Err(AuthError::NotFound("User not found")),
        };

        let revoked = self.sessions.delete_by_owner(user_id).await?;
        info!(%user_id, revoked, "password reset");
        Ok(())
    }

    async fn issue_session(&self, user_id: Uuid) -> Result<Session, AuthError> {
        self.issue_session_at(user_id, Utc::now()).await
    }

    async fn issue_session_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Session, AuthError> {
        let tokens = self.issuer.issue_at(now)?;
        self.sessions.delete_by_owner(user_id).await?;

        let record = SessionRecord {
            id: Uuid::new_v4(),
            user_id,
            access_token_hash: hash_token(&tokens.access_token),
            refresh_token_hash: hash_token(&tokens.refresh_token),
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        };
        self.sessions.create(&record).await?;

        Ok(Session {
            id: record.id,
            user_id,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })
    }
}
