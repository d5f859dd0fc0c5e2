// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// One scored submission of an exam, stored in the 'attempts' table.
/// Immutable once stored.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: String,
    pub username: String,
    pub module_id: String,
    pub exam_id: String,
    /// Integer percentage in 0..=100.
    pub score: i32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// DTO for submitting an attempt.
///
/// `score` is kept as a raw JSON value so that non-numeric input can be
/// rejected with a clear message instead of a deserialization error.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttemptRequest {
    #[serde(default)]
    #[validate(length(max = 50, message = "Username must be at most 50 characters"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(max = 64, message = "Module id must be at most 64 characters"))]
    pub module_id: String,
    #[serde(default)]
    #[validate(length(max = 64, message = "Exam id must be at most 64 characters"))]
    pub exam_id: String,
    #[serde(default)]
    pub score: serde_json::Value,
}

/// An attempt that passed validation, with its score clamped and rounded.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttempt {
    pub username: String,
    pub module_id: String,
    pub exam_id: String,
    pub score: i32,
}
