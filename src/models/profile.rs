// src/models/profile.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'user_profiles' table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    pub photo_url: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for updating the profile picture.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePhotoRequest {
    #[validate(
        length(min = 1, max = 2048, message = "Photo URL must be between 1 and 2048 characters"),
        custom(function = validate_photo_url)
    )]
    pub photo_url: String,
}

fn validate_photo_url(value: &str) -> Result<(), validator::ValidationError> {
    let parsed =
        url::Url::parse(value).map_err(|_| validator::ValidationError::new("invalid_url"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(validator::ValidationError::new("unsupported_scheme")),
    }
}
