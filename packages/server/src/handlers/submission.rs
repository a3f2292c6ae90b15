use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::submission::{CreateSubmissionRequest, Submission};
use crate::pipeline::{SubmissionIngress, SubmitCommand};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/{id}/submissions",
    tag = "Submissions",
    operation_id = "createSubmission",
    summary = "Submit a solution to a problem",
    description = "Creates a `Pending` submission and queues it for grading. The verdict arrives later over the live channel.",
    params(("id" = i32, Path, description = "Problem ID")),
    request_body = CreateSubmissionRequest,
    responses(
        (status = 201, description = "Submission created", body = Submission),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Problem not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(problem_id = %problem_id))]
pub async fn create_submission(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(problem_id): Path<i32>,
    AppJson(payload): AppJson<CreateSubmissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let submission = SubmissionIngress::from_state(&state)
        .submit(SubmitCommand {
            problem_id,
            user_id: auth_user.user_id,
            source_code: payload.source,
            language: payload.language,
            contest_id: None,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(submission)))
}

#[utoipa::path(
    post,
    path = "/{id}/problems/{problem_id}/submissions",
    tag = "Submissions",
    operation_id = "createContestSubmission",
    summary = "Submit a solution within a contest",
    description = "Creates a contest submission. The caller must hold a participation record whose window is open; \
                   the latest record decides whether the submission counts as official or virtual.",
    params(
        ("id" = i32, Path, description = "Contest ID"),
        ("problem_id" = i32, Path, description = "Problem ID"),
    ),
    request_body = CreateSubmissionRequest,
    responses(
        (status = 201, description = "Submission created", body = Submission),
        (status = 400, description = "Validation error or not registered (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Contest or problem not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(contest_id = %contest_id, problem_id = %problem_id))]
pub async fn create_contest_submission(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((contest_id, problem_id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<CreateSubmissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let submission = SubmissionIngress::from_state(&state)
        .submit(SubmitCommand {
            problem_id,
            user_id: auth_user.user_id,
            source_code: payload.source,
            language: payload.language,
            contest_id: Some(contest_id),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(submission)))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Submissions",
    operation_id = "getSubmission",
    summary = "Get submission details",
    description = "Returns one of the caller's own submissions. Other users' submissions are reported as not found.",
    params(("id" = i32, Path, description = "Submission ID")),
    responses(
        (status = 200, description = "Submission details", body = Submission),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn get_submission(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Submission>, AppError> {
    let submission = state
        .storage
        .find_submission(id)
        .await?
        .filter(|s| s.user_id == auth_user.user_id)
        .ok_or_else(|| AppError::NotFound("Submission not found".into()))?;
    Ok(Json(submission))
}
