use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::types::{IdentityResponse, RegisterRequest};
use crate::api::{
    response::{ApiResponse, ApiResult, ErrorBody},
    AppState,
};

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Parent account created", body = IdentityResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Email in use", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    state: Extension<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<IdentityResponse>> {
    let Json(request) = payload?;
    let identity = state
        .sessions
        .register(&request.name, &request.email, &request.password)
        .await?;

    Ok(ApiResponse::new(
        StatusCode::CREATED,
        "User registered successfully!",
        IdentityResponse::from(identity),
    ))
}
