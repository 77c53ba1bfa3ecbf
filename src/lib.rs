//! # Tutela (student records with session-scoped access)
//!
//! `tutela` serves a small REST API over student records. Everything that
//! matters for security lives in [`session`]: the dual-token session lifecycle
//! and the role-scoped authorization engine that guards each route.
//!
//! ## Sessions
//!
//! A login issues a pair of opaque tokens. The access token (15 minutes by
//! default) authenticates each request through the `Authorization: Bearer`
//! header. The refresh token (24 hours by default) travels in an `HttpOnly`
//! cookie together with the session id and can be exchanged exactly once for a
//! brand-new session. Every identity owns at most one session: a new login or
//! refresh deletes the previous one. Only SHA-256 digests of the tokens are
//! persisted.
//!
//! ## Roles
//!
//! - **Teacher** (privileged): blanket access to every student record.
//! - **Parent** (restricted): access only to students whose `parent_id` matches
//!   the caller. Ownership is checked per request against the store.

pub mod api;
pub mod cli;
pub mod google;
pub mod session;
pub mod store;
pub mod students;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
