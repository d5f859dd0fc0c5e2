// src/widgets/chat_listener.rs

use thiserror::Error;

use crate::{
    error::AppError,
    models::message::{ChatMessage, ReplyTo, SendMessageRequest},
    services::chat::{ChatBackend, ChatError, Subscription, validate_message_text},
    utils::avatar::{avatar_color, initial},
    widgets::persistence::{CHAT_LAST_READ_KEY, LocalStore},
};

/// A message as the chat panel shows it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub id: String,
    pub username: String,
    pub initial: String,
    pub avatar_color: &'static str,
    pub text: String,
    pub time_label: String,
    pub reply_to: Option<ReplyTo>,
    /// Whether the delete control is shown.
    pub deletable: bool,
}

#[derive(Debug, Error)]
pub enum ChatSendError {
    #[error(transparent)]
    Invalid(#[from] ChatError),
    #[error("failed to send message: {0}")]
    Backend(AppError),
}

pub struct ChatListener {
    store: LocalStore,
    open: bool,
    is_admin: bool,
    unread: usize,
    rendered: Vec<RenderedMessage>,
    subscription: Option<Subscription>,
}

impl ChatListener {
    pub fn new(store: LocalStore) -> Self {
        Self {
            store,
            open: false,
            is_admin: false,
            unread: 0,
            rendered: Vec::new(),
            subscription: None,
        }
    }

    /// Shows delete controls on every message. Deletes are still checked server-side.
    pub fn set_admin(&mut self, is_admin: bool) {
        self.is_admin = is_admin;
        for message in &mut self.rendered {
            message.deletable = is_admin;
        }
    }

    fn last_read_ms(&self) -> i64 {
        self.store.load(CHAT_LAST_READ_KEY).unwrap_or(0)
    }

    fn mark_read(&self, at_ms: i64) {
        if let Err(e) = self.store.save(CHAT_LAST_READ_KEY, &at_ms) {
            tracing::warn!("Failed to store chat read marker: {}", e);
        }
    }

    /// Applies a feed snapshot (newest first).
    ///
    /// While the panel is open, everything in the snapshot counts as read.
    pub fn on_feed(&mut self, snapshot: &[ChatMessage]) {
        let last_read = self.last_read_ms();
        if self.open {
            let newest = snapshot
                .iter()
                .map(|m| m.timestamp.timestamp_millis())
                .max()
                .unwrap_or(last_read);
            if newest > last_read {
                self.mark_read(newest);
            }
        } else {
            self.unread = snapshot
                .iter()
                .filter(|m| m.timestamp.timestamp_millis() > last_read)
                .count();
        }

        self.rendered = snapshot
            .iter()
            .rev()
            .map(|m| RenderedMessage {
                id: m.id.clone(),
                username: m.username.clone(),
                initial: initial(&m.username),
                avatar_color: avatar_color(&m.username),
                text: m.message.clone(),
                time_label: m.timestamp.format("%H:%M").to_string(),
                reply_to: m.reply_to.clone(),
                deletable: self.is_admin,
            })
            .collect();
    }

    pub fn open_panel(&mut self) {
        self.open_panel_at(chrono::Utc::now().timestamp_millis());
    }

    pub fn open_panel_at(&mut self, now_ms: i64) {
        self.open = true;
        self.unread = 0;
        self.mark_read(now_ms.max(self.last_read_ms()));
    }

    pub fn close_panel(&mut self) {
        self.open = false;
    }

    /// Listens on a new feed, stopping the previous subscription first.
    pub fn attach(&mut self, subscription: Subscription) {
        if let Some(mut previous) = self.subscription.replace(subscription) {
            previous.stop();
        }
    }

    pub fn detach(&mut self) {
        if let Some(mut previous) = self.subscription.take() {
            previous.stop();
        }
    }

    /// Waits for the next snapshot and applies it. Returns false once the feed is gone.
    pub async fn pump(&mut self) -> bool {
        let Some(subscription) = self.subscription.as_mut() else {
            return false;
        };
        match subscription.next().await {
            Some(snapshot) => {
                self.on_feed(&snapshot);
                true
            }
            None => {
                self.subscription = None;
                false
            }
        }
    }

    /// Validates locally, then hands the message to the backend.
    pub async fn send(
        &self,
        backend: &dyn ChatBackend,
        username: &str,
        text: &str,
        reply_to_id: Option<&str>,
    ) -> Result<ChatMessage, ChatSendError> {
        let text = validate_message_text(text)?;
        let req = SendMessageRequest {
            username: username.to_string(),
            message: text.to_string(),
            reply_to_id: reply_to_id.map(str::to_string),
        };
        backend.send(req).await.map_err(ChatSendError::Backend)
    }

    pub fn unread(&self) -> usize {
        self.unread
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn messages(&self) -> &[RenderedMessage] {
        &self.rendered
    }

    pub fn is_listening(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }
}
