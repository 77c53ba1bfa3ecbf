//! Authenticated principal extraction and authorization helpers.
//!
//! Flow Overview: read the `Authorization: Bearer` header, resolve it to an
//! identity through the [`Authenticator`](crate::session::Authenticator), and
//! hand the identity to the handler. Role and ownership checks run in the
//! handler through [`Principal::require`] because they depend on the route.

use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::{
    api::{response::ApiError, AppState},
    session::{AuthError, CredentialError, Identity, ResourceRef, Role},
};

/// Identity resolved from a live session.
#[derive(Clone, Debug)]
pub struct Principal(pub Identity);

impl Principal {
    /// Enforce the route's allowed roles and, for restricted roles, ownership of `resource`.
    ///
    /// # Errors
    /// Returns `403`/`400` on deny, `500` if the ownership lookup fails.
    pub async fn require(
        &self,
        state: &AppState,
        allowed: &[Role],
        resource: Option<&ResourceRef>,
    ) -> Result<(), ApiError> {
        state
            .authorizer
            .require(Some(&self.0), allowed, resource)
            .await
            .map_err(ApiError::from)
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = parts
            .extensions
            .get::<Arc<AppState>>()
            .cloned()
            .ok_or_else(|| ApiError::from(anyhow!("application state is not installed")))?;

        let header = match parts.headers.get(AUTHORIZATION) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| AuthError::Unauthenticated(CredentialError::MalformedHeader))?,
            ),
            None => None,
        };

        let identity = state.authenticator.resolve(header).await?;
        Ok(Self(identity))
    }
}
