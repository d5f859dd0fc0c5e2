// src/store/mod.rs

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        admin_log::AdminLog, attempt::Attempt, leaderboard::ModuleLeaderboard,
        message::ChatMessage, profile::UserProfile,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn insert_attempt(&self, attempt: &Attempt) -> Result<(), AppError>;

    /// Attempts of one module, best score first (newest first among equal scores).
    async fn top_attempts_for_module(
        &self,
        module_id: &str,
        limit: usize,
    ) -> Result<Vec<Attempt>, AppError>;

    /// All attempts of one user, newest first.
    async fn attempts_for_user(&self, username: &str) -> Result<Vec<Attempt>, AppError>;
}

#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    /// Returns `None` when no materialized document exists for the module.
    async fn get_materialized(
        &self,
        module_id: &str,
    ) -> Result<Option<ModuleLeaderboard>, AppError>;

    async fn put_materialized(&self, board: &ModuleLeaderboard) -> Result<(), AppError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert_message(&self, message: &ChatMessage) -> Result<(), AppError>;

    /// Most recent messages, newest first.
    async fn recent_messages(&self, limit: usize) -> Result<Vec<ChatMessage>, AppError>;

    async fn get_message(&self, id: &str) -> Result<Option<ChatMessage>, AppError>;

    /// Returns whether a message was removed.
    async fn delete_message(&self, id: &str) -> Result<bool, AppError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, username: &str) -> Result<Option<UserProfile>, AppError>;

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError>;
}

#[async_trait]
pub trait AdminLogStore: Send + Sync {
    async fn append_admin_log(&self, log: &AdminLog) -> Result<(), AppError>;

    /// Newest first.
    async fn recent_admin_logs(&self, limit: usize) -> Result<Vec<AdminLog>, AppError>;
}

/// Everything the application needs from its backend: the `attempts`, `leaderboard`,
/// `messages`, `user_profiles` and `admin_logs` collections.
/// Implemented by `PgStore` and `MemoryStore`.
pub trait Store: AttemptStore + LeaderboardStore + MessageStore + ProfileStore + AdminLogStore {}

impl<T> Store for T where
    T: AttemptStore + LeaderboardStore + MessageStore + ProfileStore + AdminLogStore
{
}

pub type SharedStore = Arc<dyn Store>;
