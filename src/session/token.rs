//! Opaque token generation, hashing, and expiry windows.

use anyhow::{anyhow, Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, TimeDelta, Utc};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
pub const DEFAULT_REFRESH_TTL_SECONDS: i64 = 24 * 60 * 60;

const TOKEN_BYTES: usize = 32;

/// Create a new random token (32 bytes, URL-safe base64 without padding).
///
/// # Errors
/// Returns an error if the OS entropy source fails.
pub fn generate_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a token so raw values never touch the database.
#[must_use]
pub fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Raw token pair plus the expiry of each token.
#[derive(Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug)]
pub struct TokenIssuer {
    access_ttl: TimeDelta,
    refresh_ttl: TimeDelta,
}

impl TokenIssuer {
    /// Build an issuer; the access lifetime must be strictly shorter than the refresh lifetime.
    ///
    /// # Errors
    /// Returns an error if a TTL is not positive, out of range, or the ordering is violated.
    pub fn new(access_ttl_seconds: i64, refresh_ttl_seconds: i64) -> Result<Self> {
        if access_ttl_seconds <= 0 || refresh_ttl_seconds <= 0 {
            return Err(anyhow!("token TTLs must be positive"));
        }
        if access_ttl_seconds >= refresh_ttl_seconds {
            return Err(anyhow!(
                "access token TTL ({access_ttl_seconds}s) must be shorter than refresh token TTL ({refresh_ttl_seconds}s)"
            ));
        }
        let access_ttl = TimeDelta::try_seconds(access_ttl_seconds)
            .context("access token TTL out of range")?;
        let refresh_ttl = TimeDelta::try_seconds(refresh_ttl_seconds)
            .context("refresh token TTL out of range")?;
        Ok(Self {
            access_ttl,
            refresh_ttl,
        })
    }

    /// Issue a token pair expiring relative to the current time.
    ///
    /// # Errors
    /// Returns an error if the entropy source fails.
    pub fn issue(&self) -> Result<IssuedTokens> {
        self.issue_at(Utc::now())
    }

    /// Issue a token pair expiring relative to `now`.
    ///
    /// # Errors
    /// Returns an error if the entropy source fails.
    pub fn issue_at(&self, now: DateTime<Utc>) -> Result<IssuedTokens> {
        Ok(IssuedTokens {
            access_token: generate_token()?,
            refresh_token: generate_token()?,
            access_expires_at: now + self.access_ttl,
            refresh_expires_at: now + self.refresh_ttl,
        })
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl.num_seconds()
    }
}

impl Default for TokenIssuer {
    fn default() -> Self {
        Self {
            access_ttl: TimeDelta::minutes(15),
            refresh_ttl: TimeDelta::hours(24),
        }
    }
}
