use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::Response,
    Json,
};
use std::sync::Arc;

use super::{
    session::session_response,
    types::{AccessTokenResponse, ConfirmOAuthRequest, OAuthUrlResponse},
};
use crate::api::{
    response::{ApiError, ApiResponse, ApiResult, ErrorBody},
    AppState,
};

#[utoipa::path(
    get,
    path = "/auth/get-oauth-url",
    responses(
        (status = 200, description = "Google consent URL", body = OAuthUrlResponse),
        (status = 404, description = "Google OAuth is not configured", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn get_oauth_url(
    state: Extension<Arc<AppState>>,
) -> ApiResult<ApiResponse<OAuthUrlResponse>> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| ApiError::not_found("Google OAuth is not configured"))?;
    let url = google.auth_url()?;

    Ok(ApiResponse::ok(
        "Successfully get Google OAuth url!",
        OAuthUrlResponse {
            url: url.to_string(),
        },
    ))
}

#[utoipa::path(
    post,
    path = "/auth/confirm-oauth",
    request_body = ConfirmOAuthRequest,
    responses(
        (status = 200, description = "Logged in via Google; session cookies set", body = AccessTokenResponse),
        (status = 401, description = "Code rejected or email unverified", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn confirm_oauth(
    state: Extension<Arc<AppState>>,
    payload: Result<Json<ConfirmOAuthRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    if request.code.trim().is_empty() {
        return Err(ApiError::bad_request("code is required"));
    }
    let session = state.sessions.login_federated(&request.code).await?;

    Ok(session_response(
        &state.config,
        &session,
        "Successfully logged in via Google OAuth!",
    ))
}
