//! Session lifecycle and role-scoped authorization.
//!
//! Three cooperating parts:
//! - [`SessionManager`] issues, rotates and revokes sessions. Only the auth
//!   endpoints call it.
//! - [`Authenticator`] resolves a bearer access token to an [`Identity`] on
//!   every protected request.
//! - [`Authorizer`] decides whether that identity may act on a resource given
//!   the route's allowed roles.
//!
//! Persistence is reached only through the traits in [`repo`].

pub mod authenticate;
pub mod authorize;
pub mod error;
pub mod models;
pub mod password;
pub mod repo;
pub mod service;
pub mod token;

pub use authenticate::{parse_bearer, Authenticator};
pub use authorize::{Authorizer, Decision, DenyReason, ResourceKind, ResourceRef};
pub use error::{AuthError, CredentialError};
pub use models::{
    CreateOutcome, ExternalIdentity, Identity, NewIdentity, RedeemOutcome, ResetNotice, Role,
    Session, SessionRecord,
};
pub use repo::{
    IdentityProvider, IdentityRepo, LogResetNotifier, OwnershipRepo, ResetNotifier,
    ResetTokenRepo, SessionRepo,
};
pub use service::{SessionManager, DEFAULT_FRONTEND_BASE_URL, DEFAULT_RESET_TTL_SECONDS};
pub use token::{TokenIssuer, DEFAULT_ACCESS_TTL_SECONDS, DEFAULT_REFRESH_TTL_SECONDS};
