// src/widgets/leaderboard.rs

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    config::{DEFAULT_LEADERBOARD_SIZE, FALLBACK_ATTEMPT_FETCH, MATERIALIZED_LEADERBOARD_CAP},
    error::AppError,
    models::{
        attempt::{Attempt, SubmitAttemptRequest},
        leaderboard::{LeaderboardSource, LeaderboardView},
    },
    services::leaderboard::{LeaderboardService, aggregate, normalize_submission},
    widgets::persistence::{LEADERBOARD_ATTEMPTS_KEY, LEADERBOARD_USERNAME_KEY, LocalStore},
};

#[async_trait]
pub trait LeaderboardBackend: Send + Sync {
    async fn submit(&self, req: &SubmitAttemptRequest) -> Result<Attempt, AppError>;

    async fn top(&self, module_id: &str, limit: usize) -> Result<LeaderboardView, AppError>;
}

#[async_trait]
impl LeaderboardBackend for LeaderboardService {
    async fn submit(&self, req: &SubmitAttemptRequest) -> Result<Attempt, AppError> {
        LeaderboardService::submit(self, req).await
    }

    async fn top(&self, module_id: &str, limit: usize) -> Result<LeaderboardView, AppError> {
        LeaderboardService::top(self, module_id, Some(limit)).await
    }
}

/// Remembers the player's name, submits attempts and shows the module board.
/// Without a reachable backend it keeps attempts locally and ranks them with the
/// same aggregation the server falls back to.
pub struct LeaderboardWidget {
    store: LocalStore,
    backend: Option<Arc<dyn LeaderboardBackend>>,
}

impl LeaderboardWidget {
    /// `backend` is `None` when the page has no backend configured.
    pub fn new(store: LocalStore, backend: Option<Arc<dyn LeaderboardBackend>>) -> Self {
        Self { store, backend }
    }

    pub fn username(&self) -> Option<String> {
        self.store.load(LEADERBOARD_USERNAME_KEY)
    }

    pub fn set_username(&self, username: &str) -> Result<String, AppError> {
        let username = username.trim();
        if username.is_empty() || username.chars().count() > 50 {
            return Err(AppError::BadRequest(
                "Username must be between 1 and 50 characters".to_string(),
            ));
        }
        self.store
            .save(LEADERBOARD_USERNAME_KEY, &username)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
        Ok(username.to_string())
    }

    fn local_attempts(&self) -> Vec<Attempt> {
        self.store.load(LEADERBOARD_ATTEMPTS_KEY).unwrap_or_default()
    }

    /// Submits a finished exam under the remembered username.
    ///
    /// Invalid input is returned as an error. Backend failures are not: the attempt
    /// is kept locally instead.
    pub async fn record(
        &self,
        module_id: &str,
        exam_id: &str,
        score: f64,
    ) -> Result<Attempt, AppError> {
        let username = self
            .username()
            .ok_or(AppError::BadRequest("Choose a username first".to_string()))?;

        let req = SubmitAttemptRequest {
            username,
            module_id: module_id.to_string(),
            exam_id: exam_id.to_string(),
            score: serde_json::json!(score),
        };
        let normalized = normalize_submission(&req)?;

        if let Some(backend) = &self.backend {
            match backend.submit(&req).await {
                Ok(attempt) => return Ok(attempt),
                Err(AppError::BadRequest(msg)) => return Err(AppError::BadRequest(msg)),
                Err(e) => tracing::warn!("Leaderboard backend unavailable, keeping attempt locally: {}", e),
            }
        }

        let attempt = Attempt {
            id: uuid::Uuid::new_v4().to_string(),
            username: normalized.username,
            module_id: normalized.module_id,
            exam_id: normalized.exam_id,
            score: normalized.score,
            timestamp: chrono::Utc::now(),
        };

        let mut attempts = self.local_attempts();
        attempts.push(attempt.clone());
        if attempts.len() > FALLBACK_ATTEMPT_FETCH {
            let excess = attempts.len() - FALLBACK_ATTEMPT_FETCH;
            attempts.drain(..excess);
        }
        if let Err(e) = self.store.save(LEADERBOARD_ATTEMPTS_KEY, &attempts) {
            tracing::warn!("Failed to keep attempt locally: {}", e);
        }

        Ok(attempt)
    }

    /// The module board from the backend, or from local attempts when it is unreachable.
    pub async fn board(&self, module_id: &str, limit: Option<usize>) -> LeaderboardView {
        let top_n = limit
            .unwrap_or(DEFAULT_LEADERBOARD_SIZE)
            .clamp(1, MATERIALIZED_LEADERBOARD_CAP);

        if let Some(backend) = &self.backend {
            match backend.top(module_id, top_n).await {
                Ok(view) => return view,
                Err(e) => tracing::warn!(module_id, "Showing local leaderboard: {}", e),
            }
        }

        let mut attempts: Vec<Attempt> = self
            .local_attempts()
            .into_iter()
            .filter(|a| a.module_id == module_id)
            .collect();
        attempts.sort_by(|a, b| b.score.cmp(&a.score).then(b.timestamp.cmp(&a.timestamp)));

        LeaderboardView {
            module_id: module_id.to_string(),
            source: LeaderboardSource::Computed,
            entries: aggregate(&attempts, top_n),
        }
    }
}
