// src/handlers/leaderboard.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{attempt::SubmitAttemptRequest, leaderboard::LeaderboardParams},
    services::leaderboard::LeaderboardService,
};

/// Records a scored attempt.
///
/// Returns 201 Created with the stored attempt (score clamped and rounded).
pub async fn submit_attempt(
    State(leaderboard): State<LeaderboardService>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = leaderboard.submit(&payload).await?;
    Ok((StatusCode::CREATED, Json(attempt)))
}

/// Retrieves the top entries of a module leaderboard (default 10).
pub async fn get_leaderboard(
    State(leaderboard): State<LeaderboardService>,
    Path(module_id): Path<String>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, AppError> {
    let view = leaderboard.top(&module_id, params.limit).await?;
    Ok(Json(view))
}

/// Lists a user's attempts, newest first.
pub async fn list_user_attempts(
    State(leaderboard): State<LeaderboardService>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = leaderboard.user_history(&username).await?;
    Ok(Json(attempts))
}
