use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use tracing::{info, instrument};

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::contest::{
    Contest, ContestMode, NewParticipation, Participation, RegisterRequest, ScoreboardQuery,
    ScoreboardRow,
};
use crate::pipeline::scoring::{rank_participations, scoreboard_filter};
use crate::state::AppState;

async fn find_contest(state: &AppState, id: i32) -> Result<Contest, AppError> {
    state
        .storage
        .find_contest(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Contest not found".into()))
}

#[utoipa::path(
    post,
    path = "/{id}/register",
    tag = "Contests",
    operation_id = "registerForContest",
    summary = "Register for a contest",
    description = "Official registration is open until the contest ends and allowed once per user. \
                   Virtual registration opens after the contest ends and starts a personal window \
                   as long as the contest itself.",
    params(("id" = i32, Path, description = "Contest ID")),
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = Participation),
        (status = 400, description = "Registration closed for this mode (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Contest not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already registered officially (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(contest_id = %contest_id))]
pub async fn register(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(contest_id): Path<i32>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let contest = find_contest(&state, contest_id).await?;
    let now = Utc::now();

    let (starts_at, ends_at) = match payload.mode {
        ContestMode::Official => {
            if contest.has_ended(now) {
                return Err(AppError::Validation("Contest has already ended".into()));
            }
            (contest.start_time, contest.end_time)
        }
        ContestMode::Virtual => {
            if !contest.has_ended(now) {
                return Err(AppError::Validation(
                    "Virtual participation opens after the contest ends".into(),
                ));
            }
            (now, now + contest.duration())
        }
    };

    let participation = state
        .storage
        .create_participation(NewParticipation {
            contest_id,
            user_id: auth_user.user_id,
            mode: payload.mode,
            registered_at: now,
            starts_at,
            ends_at,
        })
        .await?;

    info!(
        participation_id = participation.id,
        user_id = auth_user.user_id,
        mode = ?participation.mode,
        "Registered for contest"
    );

    Ok((StatusCode::CREATED, Json(participation)))
}

#[utoipa::path(
    get,
    path = "/{id}/participation",
    tag = "Contests",
    operation_id = "getParticipation",
    summary = "Get the caller's participation record",
    description = "Returns the caller's most recent registration for the contest with per-problem scores.",
    params(("id" = i32, Path, description = "Contest ID")),
    responses(
        (status = 200, description = "Participation record", body = Participation),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Contest or registration not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(contest_id = %contest_id))]
pub async fn get_participation(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(contest_id): Path<i32>,
) -> Result<Json<Participation>, AppError> {
    find_contest(&state, contest_id).await?;
    let participation = state
        .storage
        .find_latest_participation(contest_id, auth_user.user_id, None)
        .await?
        .ok_or_else(|| AppError::NotFound("Not registered for this contest".into()))?;
    Ok(Json(participation))
}

#[utoipa::path(
    get,
    path = "/{id}/scoreboard",
    tag = "Contests",
    operation_id = "getScoreboard",
    summary = "Contest scoreboard",
    description = "Ranks participants by total score, breaking ties by the earliest last improvement. \
                   Only official participants are listed unless `include_virtual` is set.",
    params(
        ("id" = i32, Path, description = "Contest ID"),
        ScoreboardQuery,
    ),
    responses(
        (status = 200, description = "Ranked rows", body = Vec<ScoreboardRow>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Contest not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user, query), fields(contest_id = %contest_id))]
pub async fn scoreboard(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(contest_id): Path<i32>,
    Query(query): Query<ScoreboardQuery>,
) -> Result<Json<Vec<ScoreboardRow>>, AppError> {
    find_contest(&state, contest_id).await?;

    let keep = scoreboard_filter(query.include_virtual.unwrap_or(false));
    let participations = state
        .storage
        .list_participations(contest_id)
        .await?
        .into_iter()
        .filter(|p| keep(p))
        .collect();

    Ok(Json(rank_participations(participations)))
}
