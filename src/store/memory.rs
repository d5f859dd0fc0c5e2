// src/store/memory.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AdminLogStore, AttemptStore, LeaderboardStore, MessageStore, ProfileStore};
use crate::{
    error::AppError,
    models::{
        admin_log::AdminLog, attempt::Attempt, leaderboard::ModuleLeaderboard,
        message::ChatMessage, profile::UserProfile,
    },
};

/// In-process store used by tests and when no database is configured.
///
/// Vectors keep insertion order, so "backend order" for equal sort keys is stable.
#[derive(Default)]
pub struct MemoryStore {
    attempts: RwLock<Vec<Attempt>>,
    leaderboards: RwLock<HashMap<String, ModuleLeaderboard>>,
    messages: RwLock<Vec<ChatMessage>>,
    profiles: RwLock<HashMap<String, UserProfile>>,
    admin_logs: RwLock<Vec<AdminLog>>,
    materialized_disabled: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a backend where the materialized leaderboard is unavailable:
    /// reads return `None` and writes fail.
    pub fn without_materialized() -> Self {
        let store = Self::default();
        store.materialized_disabled.store(true, Ordering::Relaxed);
        store
    }

    fn materialized_available(&self) -> bool {
        !self.materialized_disabled.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn insert_attempt(&self, attempt: &Attempt) -> Result<(), AppError> {
        self.attempts.write().await.push(attempt.clone());
        Ok(())
    }

    async fn top_attempts_for_module(
        &self,
        module_id: &str,
        limit: usize,
    ) -> Result<Vec<Attempt>, AppError> {
        let attempts = self.attempts.read().await;
        let mut matching: Vec<Attempt> = attempts
            .iter()
            .filter(|a| a.module_id == module_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });
        matching.truncate(limit);
        Ok(matching)
    }

    async fn attempts_for_user(&self, username: &str) -> Result<Vec<Attempt>, AppError> {
        let attempts = self.attempts.read().await;
        let mut matching: Vec<Attempt> = attempts
            .iter()
            .filter(|a| a.username == username)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(matching)
    }
}

#[async_trait]
impl LeaderboardStore for MemoryStore {
    async fn get_materialized(
        &self,
        module_id: &str,
    ) -> Result<Option<ModuleLeaderboard>, AppError> {
        if !self.materialized_available() {
            return Ok(None);
        }
        Ok(self.leaderboards.read().await.get(module_id).cloned())
    }

    async fn put_materialized(&self, board: &ModuleLeaderboard) -> Result<(), AppError> {
        if !self.materialized_available() {
            return Err(AppError::InternalServerError(
                "materialized leaderboard unavailable".to_string(),
            ));
        }
        self.leaderboards
            .write()
            .await
            .insert(board.module_id.clone(), board.clone());
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert_message(&self, message: &ChatMessage) -> Result<(), AppError> {
        self.messages.write().await.push(message.clone());
        Ok(())
    }

    async fn recent_messages(&self, limit: usize) -> Result<Vec<ChatMessage>, AppError> {
        let messages = self.messages.read().await;
        let mut recent: Vec<ChatMessage> = messages.iter().rev().cloned().collect();
        // Stable sort keeps reverse-insertion order for identical timestamps.
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn get_message(&self, id: &str) -> Result<Option<ChatMessage>, AppError> {
        Ok(self
            .messages
            .read()
            .await
            .iter()
            .find(|m| m.id == id)
            .cloned())
    }

    async fn delete_message(&self, id: &str) -> Result<bool, AppError> {
        let mut messages = self.messages.write().await;
        let before = messages.len();
        messages.retain(|m| m.id != id);
        Ok(messages.len() != before)
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, username: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(self.profiles.read().await.get(username).cloned())
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        self.profiles
            .write()
            .await
            .insert(profile.username.clone(), profile.clone());
        Ok(())
    }
}

#[async_trait]
impl AdminLogStore for MemoryStore {
    async fn append_admin_log(&self, log: &AdminLog) -> Result<(), AppError> {
        self.admin_logs.write().await.push(log.clone());
        Ok(())
    }

    async fn recent_admin_logs(&self, limit: usize) -> Result<Vec<AdminLog>, AppError> {
        Ok(self
            .admin_logs
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}
