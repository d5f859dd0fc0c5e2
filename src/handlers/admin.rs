// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::admin_log::AdminLogParams,
    store::{AdminLogStore, SharedStore},
};

/// Lists recent privileged actions, newest first.
/// Admin only.
pub async fn list_admin_logs(
    State(store): State<SharedStore>,
    Query(params): Query<AdminLogParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(50).min(200);
    let logs = store.recent_admin_logs(limit).await?;
    Ok(Json(logs))
}
