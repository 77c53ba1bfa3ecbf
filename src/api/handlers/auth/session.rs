//! Session cookie endpoints: refresh rotation and logout.
//!
//! The refresh token and the session id live in `HttpOnly` cookies; the access
//! token is returned in the body and sent back as a bearer header.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::{state::AuthConfig, types::AccessTokenResponse};
use crate::{
    api::{
        response::{ApiResponse, ApiResult, ErrorBody},
        AppState,
    },
    session::{AuthError, Session},
};

pub(crate) const SESSION_ID_COOKIE: &str = "sessionId";
pub(crate) const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Session rotated; new cookies set", body = AccessTokenResponse),
        (status = 401, description = "Session not found or expired", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn refresh(headers: HeaderMap, state: Extension<Arc<AppState>>) -> ApiResult<Response> {
    let session_id = extract_cookie(&headers, SESSION_ID_COOKIE)
        .and_then(|value| Uuid::parse_str(&value).ok());
    let refresh_token = extract_cookie(&headers, REFRESH_TOKEN_COOKIE);
    let (Some(session_id), Some(refresh_token)) = (session_id, refresh_token) else {
        return Err(AuthError::Unauthorized("Session not found").into());
    };

    let session = state.sessions.refresh(session_id, &refresh_token).await?;
    Ok(session_response(
        &state.config,
        &session,
        "Successfully refreshed a session!",
    ))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Session cleared"),
        (status = 500, description = "Session could not be deleted", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<AppState>>) -> ApiResult<Response> {
    if let Some(session_id) =
        extract_cookie(&headers, SESSION_ID_COOKIE).and_then(|value| Uuid::parse_str(&value).ok())
    {
        state.sessions.logout(session_id).await?;
    }

    // Cookies are cleared even if the session record was already gone.
    let mut response_headers = HeaderMap::new();
    for name in [SESSION_ID_COOKIE, REFRESH_TOKEN_COOKIE] {
        if let Ok(cookie) = clear_cookie(&state.config, name) {
            response_headers.append(SET_COOKIE, cookie);
        }
    }
    Ok((StatusCode::NO_CONTENT, response_headers).into_response())
}

/// `200` response carrying the access token and the session cookies.
pub(super) fn session_response(config: &AuthConfig, session: &Session, message: &str) -> Response {
    let mut headers = HeaderMap::new();
    let session_id = session.id.to_string();
    for (name, value) in [
        (SESSION_ID_COOKIE, session_id.as_str()),
        (REFRESH_TOKEN_COOKIE, session.refresh_token.as_str()),
    ] {
        match session_cookie(config, name, value) {
            Ok(cookie) => {
                headers.append(SET_COOKIE, cookie);
            }
            Err(err) => error!("Failed to build {name} cookie: {err}"),
        }
    }

    let body = ApiResponse::ok(
        message,
        AccessTokenResponse {
            access_token: session.access_token.clone(),
        },
    );
    (headers, body).into_response()
}

/// Build an `HttpOnly` cookie living as long as the refresh token.
pub(crate) fn session_cookie(
    config: &AuthConfig,
    name: &str,
    value: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.refresh_token_ttl_seconds();
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_cookie(config: &AuthConfig, name: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            Some((parts.next()?.trim(), parts.next()?.trim()))
        })
        .find(|(key, val)| *key == name && !val.is_empty())
        .map(|(_, val)| val.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_cookie_finds_named_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; sessionId=abc; refreshToken=xyz"),
        );
        assert_eq!(extract_cookie(&headers, "sessionId").as_deref(), Some("abc"));
        assert_eq!(extract_cookie(&headers, "refreshToken").as_deref(), Some("xyz"));
        assert_eq!(extract_cookie(&headers, "missing"), None);
    }

    #[test]
    fn extract_cookie_ignores_empty_values() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("sessionId="));
        assert_eq!(extract_cookie(&headers, "sessionId"), None);
    }

    #[test]
    fn session_cookie_attributes() -> Result<(), InvalidHeaderValue> {
        let config = AuthConfig::default();
        let cookie = session_cookie(&config, SESSION_ID_COOKIE, "abc")?;
        let cookie = cookie.to_str().unwrap_or_default();
        assert!(cookie.starts_with("sessionId=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(!cookie.contains("Secure"));

        let secure = AuthConfig::new("https://school.example".to_string());
        let cookie = clear_cookie(&secure, REFRESH_TOKEN_COOKIE)?;
        let cookie = cookie.to_str().unwrap_or_default();
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.ends_with("; Secure"));
        Ok(())
    }
}
