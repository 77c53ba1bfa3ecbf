//! Persistence and provider seams consumed by the session core.
//!
//! Stores promise atomic single-record operations. The one multi-record write
//! is [`ResetTokenRepo::redeem`], which must apply all of its changes or none.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use super::{
    authorize::ResourceKind,
    error::AuthError,
    models::{
        CreateOutcome, ExternalIdentity, Identity, NewIdentity, RedeemOutcome, ResetNotice,
        SessionRecord,
    },
};

#[async_trait]
pub trait IdentityRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>>;
    /// Insert a new identity, reporting `Conflict` when the email is taken.
    async fn create(&self, identity: NewIdentity) -> Result<CreateOutcome>;
}

#[async_trait]
pub trait SessionRepo: Send + Sync {
    async fn find_by_access_token(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>>;
    async fn find_by_id_and_refresh_token(
        &self,
        id: Uuid,
        token_hash: &[u8],
    ) -> Result<Option<SessionRecord>>;
    async fn create(&self, session: &SessionRecord) -> Result<()>;
    /// Returns `true` if a session was deleted.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool>;
    /// Returns the number of sessions deleted.
    async fn delete_by_owner(&self, user_id: Uuid) -> Result<u64>;
}

#[async_trait]
pub trait OwnershipRepo: Send + Sync {
    /// `true` when the resource exists and its owner reference equals `owner_id`.
    async fn find_owned_resource(
        &self,
        kind: ResourceKind,
        resource_id: Uuid,
        owner_id: Uuid,
    ) -> Result<bool>;
}

#[async_trait]
pub trait ResetTokenRepo: Send + Sync {
    async fn create(&self, user_id: Uuid, token_hash: &[u8], expires_at: DateTime<Utc>) -> Result<()>;
    /// Returns the number of tokens deleted.
    async fn delete_by_owner(&self, user_id: Uuid) -> Result<u64>;
    /// Atomically exchange an unexpired token for a password change.
    ///
    /// On success the owner's password hash is replaced and every reset token
    /// of that owner is deleted. Any other outcome leaves the store untouched.
    async fn redeem(
        &self,
        token_hash: &[u8],
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<RedeemOutcome>;
}

/// Exchanges an external authorization code for a verified identity claim.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity, AuthError>;
}

/// Delivers password reset links.
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn notify(&self, notice: &ResetNotice) -> Result<()>;
}

/// Default notifier: writes the reset link to the log instead of sending mail.
#[derive(Clone, Debug)]
pub struct LogResetNotifier;

#[async_trait]
impl ResetNotifier for LogResetNotifier {
    async fn notify(&self, notice: &ResetNotice) -> Result<()> {
        info!(
            to = %notice.email,
            name = %notice.name,
            reset_url = %notice.reset_url,
            "password reset requested"
        );
        Ok(())
    }
}
