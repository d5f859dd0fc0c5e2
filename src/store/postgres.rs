// src/store/postgres.rs

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions, types::Json};

use super::{AdminLogStore, AttemptStore, LeaderboardStore, MessageStore, ProfileStore};
use crate::{
    error::AppError,
    models::{
        admin_log::AdminLog,
        attempt::Attempt,
        leaderboard::{LeaderboardEntry, ModuleLeaderboard},
        message::{ChatMessage, ReplyTo},
        profile::UserProfile,
    },
};

/// Postgres-backed store. Queries are checked at runtime so the crate builds
/// without a reachable database.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct LeaderboardRow {
    module_id: String,
    entries: Json<Vec<LeaderboardEntry>>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    username: String,
    message: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    reply_to_id: Option<String>,
    reply_to_username: Option<String>,
    reply_to_preview: Option<String>,
}

impl From<MessageRow> for ChatMessage {
    fn from(row: MessageRow) -> Self {
        let reply_to = match (row.reply_to_id, row.reply_to_username) {
            (Some(id), Some(username)) => Some(ReplyTo {
                id,
                username,
                message_preview: row.reply_to_preview.unwrap_or_default(),
            }),
            _ => None,
        };
        ChatMessage {
            id: row.id,
            username: row.username,
            message: row.message,
            timestamp: row.timestamp,
            reply_to,
        }
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects with retry (the database container may still be starting) and applies migrations.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let mut retry_count = 0;
        let pool = loop {
            match PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(3))
                .connect(database_url)
                .await
            {
                Ok(pool) => break pool,
                Err(e) => {
                    retry_count += 1;
                    if retry_count > 5 {
                        return Err(AppError::InternalServerError(format!(
                            "Failed to connect to database after 5 retries: {}",
                            e
                        )));
                    }
                    tracing::warn!(
                        "Database not ready, retrying in 2s... (Attempt {})",
                        retry_count
                    );
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        };

        tracing::info!("Database connected, running migrations...");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
        tracing::info!("Migrations applied successfully.");

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl AttemptStore for PgStore {
    async fn insert_attempt(&self, attempt: &Attempt) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO attempts (id, username, module_id, exam_id, score, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&attempt.id)
        .bind(&attempt.username)
        .bind(&attempt.module_id)
        .bind(&attempt.exam_id)
        .bind(attempt.score)
        .bind(attempt.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert attempt: {:?}", e);
            AppError::from(e)
        })?;
        Ok(())
    }

    async fn top_attempts_for_module(
        &self,
        module_id: &str,
        limit: usize,
    ) -> Result<Vec<Attempt>, AppError> {
        let attempts = sqlx::query_as::<_, Attempt>(
            r#"
            SELECT id, username, module_id, exam_id, score, timestamp
            FROM attempts
            WHERE module_id = $1
            ORDER BY score DESC, timestamp DESC
            LIMIT $2
            "#,
        )
        .bind(module_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }

    async fn attempts_for_user(&self, username: &str) -> Result<Vec<Attempt>, AppError> {
        let attempts = sqlx::query_as::<_, Attempt>(
            r#"
            SELECT id, username, module_id, exam_id, score, timestamp
            FROM attempts
            WHERE username = $1
            ORDER BY timestamp DESC
            "#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }
}

#[async_trait]
impl LeaderboardStore for PgStore {
    async fn get_materialized(
        &self,
        module_id: &str,
    ) -> Result<Option<ModuleLeaderboard>, AppError> {
        let row = sqlx::query_as::<_, LeaderboardRow>(
            "SELECT module_id, entries, updated_at FROM leaderboard WHERE module_id = $1",
        )
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ModuleLeaderboard {
            module_id: r.module_id,
            entries: r.entries.0,
            updated_at: r.updated_at,
        }))
    }

    async fn put_materialized(&self, board: &ModuleLeaderboard) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO leaderboard (module_id, entries, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (module_id) DO UPDATE SET
                entries = EXCLUDED.entries,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&board.module_id)
        .bind(Json(&board.entries))
        .bind(board.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert leaderboard: {:?}", e);
            AppError::from(e)
        })?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn insert_message(&self, message: &ChatMessage) -> Result<(), AppError> {
        let reply = message.reply_to.as_ref();
        sqlx::query(
            r#"
            INSERT INTO messages
            (id, username, message, timestamp, reply_to_id, reply_to_username, reply_to_preview)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&message.id)
        .bind(&message.username)
        .bind(&message.message)
        .bind(message.timestamp)
        .bind(reply.map(|r| r.id.clone()))
        .bind(reply.map(|r| r.username.clone()))
        .bind(reply.map(|r| r.message_preview.clone()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_messages(&self, limit: usize) -> Result<Vec<ChatMessage>, AppError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, username, message, timestamp, reply_to_id, reply_to_username, reply_to_preview
            FROM messages
            ORDER BY timestamp DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }

    async fn get_message(&self, id: &str) -> Result<Option<ChatMessage>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, username, message, timestamp, reply_to_id, reply_to_username, reply_to_preview
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ChatMessage::from))
    }

    async fn delete_message(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete message: {:?}", e);
                AppError::from(e)
            })?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn get_profile(&self, username: &str) -> Result<Option<UserProfile>, AppError> {
        let profile = sqlx::query_as::<_, UserProfile>(
            "SELECT username, photo_url, updated_at FROM user_profiles WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (username, photo_url, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (username) DO UPDATE SET
                photo_url = EXCLUDED.photo_url,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&profile.username)
        .bind(&profile.photo_url)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AdminLogStore for PgStore {
    async fn append_admin_log(&self, log: &AdminLog) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO admin_logs (id, actor, action, target, timestamp) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&log.id)
        .bind(&log.actor)
        .bind(&log.action)
        .bind(&log.target)
        .bind(log.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_admin_logs(&self, limit: usize) -> Result<Vec<AdminLog>, AppError> {
        let logs = sqlx::query_as::<_, AdminLog>(
            r#"
            SELECT id, actor, action, target, timestamp
            FROM admin_logs
            ORDER BY timestamp DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }
}
