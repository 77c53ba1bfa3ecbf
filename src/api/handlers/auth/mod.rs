//! Authentication endpoints.
//!
//! - `register`/`login` create identities and sessions.
//! - `session` rotates and clears the cookie-held refresh credentials.
//! - `reset` drives the password reset flow.
//! - `oauth` handles Google sign-in when it is configured.
//!
//! Protected routes elsewhere use the [`Principal`] extractor.

pub mod login;
mod principal;
pub mod register;
pub mod reset;
pub mod oauth;
pub mod session;
mod state;
pub mod types;

pub use principal::Principal;
pub use state::AuthConfig;
