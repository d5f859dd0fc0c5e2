// src/models/message.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A chat message ('messages' collection). Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub username: String,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplyTo>,
}

/// Snapshot of the message being replied to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyTo {
    pub id: String,
    pub username: String,
    pub message_preview: String,
}

/// DTO for sending a message.
/// The message text itself is checked by the chat service, which also counts characters
/// rather than bytes.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 50, message = "Username must be between 1 and 50 characters"))]
    pub username: String,
    pub message: String,
    #[serde(default)]
    pub reply_to_id: Option<String>,
}

/// Query parameters for deleting a message.
#[derive(Debug, Deserialize)]
pub struct DeleteMessageParams {
    /// Interactive confirmation; deletes without it are refused.
    #[serde(default)]
    pub confirm: bool,
}
