// src/handlers/profile.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::profile::{UpdatePhotoRequest, UserProfile},
    store::{ProfileStore, SharedStore},
    utils::jwt::Claims,
};

/// Get a user's public profile.
pub async fn get_profile(
    State(store): State<SharedStore>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let profile = store
        .get_profile(&username)
        .await?
        .ok_or(AppError::NotFound("Profile not found".to_string()))?;

    Ok(Json(profile))
}

/// Set the current user's profile picture.
/// Requires: Login. The URL must be an absolute http(s) URL.
///
/// Tokens are only issued by the GitHub admin login, so in practice only admins
/// can sync a picture here. Everyone else keeps it on their device
/// (`PhotoSync::LocalOnly` in the profile widget).
pub async fn update_photo(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdatePhotoRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let profile = UserProfile {
        username: claims.sub.clone(),
        photo_url: Some(payload.photo_url),
        updated_at: chrono::Utc::now(),
    };

    store.upsert_profile(&profile).await.map_err(|e| {
        tracing::error!("Failed to update profile photo: {:?}", e);
        e
    })?;

    Ok(Json(profile))
}
