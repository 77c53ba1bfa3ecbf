//! Password reset: issue a single-use token, then redeem it.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::types::{RequestResetEmailRequest, ResetPasswordRequest};
use crate::api::{
    response::{ApiResponse, ApiResult, ErrorBody},
    AppState,
};

#[utoipa::path(
    post,
    path = "/auth/request-reset-email",
    request_body = RequestResetEmailRequest,
    responses(
        (status = 200, description = "Reset link dispatched"),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn request_reset_email(
    state: Extension<Arc<AppState>>,
    payload: Result<Json<RequestResetEmailRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<Value>> {
    let Json(request) = payload?;
    state.sessions.request_reset(&request.email).await?;
    Ok(ApiResponse::ok(
        "Reset password email was successfully sent!",
        json!({}),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced; all sessions revoked"),
        (status = 401, description = "Token is expired or invalid", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    state: Extension<Arc<AppState>>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<Value>> {
    let Json(request) = payload?;
    state
        .sessions
        .reset_password(&request.token, &request.password)
        .await?;
    Ok(ApiResponse::ok("Password was successfully reset!", json!({})))
}
