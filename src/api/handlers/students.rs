//! Student CRUD endpoints.
//!
//! Teachers may do everything. Parents may read and patch the students linked
//! to them; every other route is Teacher-only.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    Json,
};
use std::{collections::HashMap, sync::Arc};
use tracing::info;
use uuid::Uuid;

use super::auth::Principal;
use crate::{
    api::{
        response::{ApiError, ApiResponse, ApiResult, ErrorBody},
        AppState,
    },
    session::{ResourceKind, ResourceRef, Role},
    students::{ListQuery, PaginationData, Student, StudentInput, StudentPage, StudentPatch},
};

const TEACHER_ONLY: &[Role] = &[Role::Teacher];
const TEACHER_OR_PARENT: &[Role] = &[Role::Teacher, Role::Parent];

fn parse_student_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::bad_request(ResourceKind::Student.invalid_id_message()))
}

fn student_not_found() -> ApiError {
    ApiError::not_found("Student not found")
}

#[utoipa::path(
    get,
    path = "/students",
    params(
        ("page" = Option<i64>, Query, description = "1-based page number"),
        ("perPage" = Option<i64>, Query, description = "Page size, capped at 100"),
        ("sortBy" = Option<String>, Query, description = "_id, name, age, gender, avgMark or onDuty"),
        ("sortOrder" = Option<String>, Query, description = "asc or desc"),
        ("gender" = Option<String>, Query, description = "male, female or other"),
        ("minAge" = Option<i64>, Query),
        ("maxAge" = Option<i64>, Query),
        ("minAvgMark" = Option<f64>, Query),
        ("maxAvgMark" = Option<f64>, Query)
    ),
    responses(
        (status = 200, description = "Page of students", body = StudentPage),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not a teacher", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "students"
)]
pub async fn list_students(
    principal: Principal,
    state: Extension<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<ApiResponse<StudentPage>> {
    principal.require(&state, TEACHER_ONLY, None).await?;

    let query = ListQuery::from_params(&params);
    let (data, total) = state.students.list(&query).await?;
    let pagination = PaginationData::calculate(total, query.per_page, query.page);

    Ok(ApiResponse::ok(
        "Successfully found students!",
        StudentPage { data, pagination },
    ))
}

#[utoipa::path(
    get,
    path = "/students/{studentId}",
    params(("studentId" = String, Path, description = "Student UUID")),
    responses(
        (status = 200, description = "Student", body = Student),
        (status = 400, description = "Invalid student ID", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "Student not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "students"
)]
pub async fn get_student(
    principal: Principal,
    state: Extension<Arc<AppState>>,
    Path(student_id): Path<String>,
) -> ApiResult<ApiResponse<Student>> {
    let resource = ResourceRef::Student(student_id);
    principal
        .require(&state, TEACHER_OR_PARENT, Some(&resource))
        .await?;
    let id = parse_student_id(resource.raw_id())?;

    let student = state
        .students
        .find_by_id(id)
        .await?
        .ok_or_else(student_not_found)?;

    Ok(ApiResponse::ok(format!("Student found with id {id}"), student))
}

#[utoipa::path(
    post,
    path = "/students",
    request_body = StudentInput,
    responses(
        (status = 201, description = "Student created", body = Student),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not a teacher", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "students"
)]
pub async fn create_student(
    principal: Principal,
    state: Extension<Arc<AppState>>,
    payload: Result<Json<StudentInput>, JsonRejection>,
) -> ApiResult<ApiResponse<Student>> {
    principal.require(&state, TEACHER_ONLY, None).await?;
    let Json(input) = payload?;
    input.validate().map_err(ApiError::bad_request)?;

    let student = state.students.create(input).await?;
    info!(student_id = %student.id, "student created");

    Ok(ApiResponse::new(
        StatusCode::CREATED,
        "Successfully created a student!",
        student,
    ))
}

#[utoipa::path(
    put,
    path = "/students/{studentId}",
    params(("studentId" = String, Path, description = "Student UUID")),
    request_body = StudentInput,
    responses(
        (status = 200, description = "Student replaced", body = Student),
        (status = 201, description = "Student created under the given id", body = Student),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not a teacher", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "students"
)]
pub async fn upsert_student(
    principal: Principal,
    state: Extension<Arc<AppState>>,
    Path(student_id): Path<String>,
    payload: Result<Json<StudentInput>, JsonRejection>,
) -> ApiResult<ApiResponse<Student>> {
    principal.require(&state, TEACHER_ONLY, None).await?;
    let id = parse_student_id(&student_id)?;
    let Json(input) = payload?;
    input.validate().map_err(ApiError::bad_request)?;

    let (student, created) = state.students.upsert(id, input).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok(ApiResponse::new(
        status,
        "Successfully upserted a student!",
        student,
    ))
}

#[utoipa::path(
    patch,
    path = "/students/{studentId}",
    params(("studentId" = String, Path, description = "Student UUID")),
    request_body = StudentPatch,
    responses(
        (status = 200, description = "Student patched", body = Student),
        (status = 400, description = "Invalid or empty input", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "Student not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "students"
)]
pub async fn patch_student(
    principal: Principal,
    state: Extension<Arc<AppState>>,
    Path(student_id): Path<String>,
    payload: Result<Json<StudentPatch>, JsonRejection>,
) -> ApiResult<ApiResponse<Student>> {
    let resource = ResourceRef::Student(student_id);
    principal
        .require(&state, TEACHER_OR_PARENT, Some(&resource))
        .await?;
    let id = parse_student_id(resource.raw_id())?;
    let Json(patch) = payload?;
    if patch.is_empty() {
        return Err(ApiError::bad_request("At least one field must be provided"));
    }
    patch.validate().map_err(ApiError::bad_request)?;

    let student = state
        .students
        .update(id, &patch)
        .await?
        .ok_or_else(student_not_found)?;

    Ok(ApiResponse::ok("Successfully patched a student!", student))
}

#[utoipa::path(
    delete,
    path = "/students/{studentId}",
    params(("studentId" = String, Path, description = "Student UUID")),
    responses(
        (status = 200, description = "Deleted student", body = Student),
        (status = 400, description = "Invalid student ID", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not a teacher", body = ErrorBody),
        (status = 404, description = "Student not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "students"
)]
pub async fn delete_student(
    principal: Principal,
    state: Extension<Arc<AppState>>,
    Path(student_id): Path<String>,
) -> ApiResult<ApiResponse<Student>> {
    principal.require(&state, TEACHER_ONLY, None).await?;
    let id = parse_student_id(&student_id)?;

    let student = state
        .students
        .delete(id)
        .await?
        .ok_or_else(student_not_found)?;
    info!(student_id = %id, "student deleted");

    Ok(ApiResponse::ok("Student deleted successfully!", student))
}
