use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::Response,
    Json,
};
use std::sync::Arc;

use super::{
    session::session_response,
    types::{AccessTokenResponse, LoginRequest},
};
use crate::api::{
    response::{ApiResult, ErrorBody},
    AppState,
};

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; session cookies set", body = AccessTokenResponse),
        (status = 400, description = "Malformed body", body = ErrorBody),
        (status = 401, description = "Wrong password", body = ErrorBody),
        (status = 404, description = "Unknown email", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    state: Extension<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    let session = state
        .sessions
        .login(&request.email, &request.password)
        .await?;

    Ok(session_response(
        &state.config,
        &session,
        "Successfully logged in an user!",
    ))
}
