// src/services/chat.rs

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use validator::Validate;

use crate::{
    config::{CHAT_FEED_LIMIT, CHAT_MESSAGE_MAX_CHARS, REPLY_PREVIEW_MAX_CHARS},
    error::AppError,
    models::{
        admin_log::AdminLog,
        message::{ChatMessage, ReplyTo, SendMessageRequest},
    },
    store::{AdminLogStore, MessageStore, SharedStore},
    utils::{html::clean_html, jwt::Claims},
};

/// Snapshot of the feed: the most recent messages, newest first.
pub type FeedSnapshot = Arc<Vec<ChatMessage>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("Message cannot be empty")]
    Empty,
    #[error("Message is too long ({len} characters, max {max})")]
    TooLong { len: usize, max: usize },
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Trims the text and enforces the length limit (in characters, not bytes).
pub fn validate_message_text(text: &str) -> Result<&str, ChatError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ChatError::Empty);
    }
    let len = trimmed.chars().count();
    if len > CHAT_MESSAGE_MAX_CHARS {
        return Err(ChatError::TooLong {
            len,
            max: CHAT_MESSAGE_MAX_CHARS,
        });
    }
    Ok(trimmed)
}

/// First `REPLY_PREVIEW_MAX_CHARS` characters of a stored message, with "..." when cut.
///
/// Stored text is sanitised, so every `&` opens an entity; a cut never lands inside one.
pub fn reply_preview(text: &str) -> String {
    if text.chars().count() <= REPLY_PREVIEW_MAX_CHARS {
        return text.to_string();
    }
    let mut preview: String = text.chars().take(REPLY_PREVIEW_MAX_CHARS).collect();
    if let Some(amp) = preview.rfind('&') {
        if !preview[amp..].contains(';') {
            preview.truncate(amp);
        }
    }
    preview.push_str("...");
    preview
}

/// Where chat widgets send their messages.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, req: SendMessageRequest) -> Result<ChatMessage, AppError>;
}

/// Handle on the live feed. Yields the current snapshot first, then every update.
///
/// Dropping the handle, or calling [`Subscription::stop`], detaches it.
pub struct Subscription {
    initial: Option<FeedSnapshot>,
    receiver: Option<broadcast::Receiver<FeedSnapshot>>,
}

impl Subscription {
    pub async fn next(&mut self) -> Option<FeedSnapshot> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(snapshot) => return Some(snapshot),
                // Snapshots are complete, so a lagging reader just waits for the next one.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Chat subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.receiver = None;
                    return None;
                }
            }
        }
    }

    pub fn stop(&mut self) {
        self.initial = None;
        self.receiver = None;
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }
}

/// Chat feed: validated sends, admin-only deletes and a live snapshot feed.
#[derive(Clone)]
pub struct ChatService {
    store: SharedStore,
    feed: broadcast::Sender<FeedSnapshot>,
}

impl ChatService {
    pub fn new(store: SharedStore) -> Self {
        let (feed, _) = broadcast::channel(16);
        Self { store, feed }
    }

    pub async fn recent(&self) -> Result<Vec<ChatMessage>, AppError> {
        self.store.recent_messages(CHAT_FEED_LIMIT).await
    }

    pub async fn subscribe(&self) -> Result<Subscription, AppError> {
        // Subscribe before reading so no update between the two is lost.
        let receiver = self.feed.subscribe();
        let snapshot = Arc::new(self.recent().await?);
        Ok(Subscription {
            initial: Some(snapshot),
            receiver: Some(receiver),
        })
    }

    pub async fn post(&self, req: SendMessageRequest) -> Result<ChatMessage, AppError> {
        req.validate()?;
        let text = validate_message_text(&req.message)?;
        // Escaping grows the text, so the stored form is checked again.
        let message = validate_message_text(&clean_html(text))?.to_string();

        let reply_to = match req.reply_to_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => {
                let target = self
                    .store
                    .get_message(id)
                    .await?
                    .ok_or(AppError::BadRequest("Reply target not found".to_string()))?;
                Some(ReplyTo {
                    id: target.id,
                    username: target.username,
                    message_preview: reply_preview(&target.message),
                })
            }
            None => None,
        };

        let message = ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            username: req.username.trim().to_string(),
            message,
            timestamp: chrono::Utc::now(),
            reply_to,
        };

        self.store.insert_message(&message).await?;
        tracing::info!(message_id = %message.id, username = %message.username, "Chat message stored");
        self.publish().await;

        Ok(message)
    }

    /// Deletes a message. Requires the admin claim and an explicit confirmation.
    pub async fn delete(&self, actor: &Claims, id: &str, confirmed: bool) -> Result<(), AppError> {
        if !actor.is_admin() {
            tracing::warn!(actor = %actor.sub, message_id = id, "Non-admin tried to delete a message");
            return Err(AppError::Forbidden("Access denied".to_string()));
        }
        if !confirmed {
            return Err(AppError::BadRequest(
                "Deletion requires confirmation".to_string(),
            ));
        }

        if !self.store.delete_message(id).await? {
            return Err(AppError::NotFound("Message not found".to_string()));
        }

        let log = AdminLog::new(&actor.sub, "delete_message", id);
        if let Err(e) = self.store.append_admin_log(&log).await {
            tracing::error!("Failed to write admin log: {}", e);
        }

        tracing::info!(actor = %actor.sub, message_id = id, "Chat message deleted");
        self.publish().await;
        Ok(())
    }

    async fn publish(&self) {
        match self.recent().await {
            Ok(snapshot) => {
                // No receivers is fine.
                let _ = self.feed.send(Arc::new(snapshot));
            }
            Err(e) => tracing::error!("Failed to refresh chat feed: {}", e),
        }
    }
}

#[async_trait]
impl ChatBackend for ChatService {
    async fn send(&self, req: SendMessageRequest) -> Result<ChatMessage, AppError> {
        self.post(req).await
    }
}
