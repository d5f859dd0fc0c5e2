// src/services/leaderboard.rs

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tokio::sync::Mutex;
use validator::Validate;

use crate::{
    config::{DEFAULT_LEADERBOARD_SIZE, FALLBACK_ATTEMPT_FETCH, MATERIALIZED_LEADERBOARD_CAP},
    error::AppError,
    models::{
        attempt::{Attempt, NewAttempt, SubmitAttemptRequest},
        leaderboard::{LeaderboardEntry, LeaderboardSource, LeaderboardView, ModuleLeaderboard},
    },
    store::{AttemptStore, LeaderboardStore, SharedStore},
};

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").expect("valid id pattern"));

/// Leaderboard ordering: best score descending, ties broken by username.
pub fn rank_order(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.best_score
        .cmp(&a.best_score)
        .then_with(|| a.username.cmp(&b.username))
}

/// Validates a submission and normalizes its score.
///
/// Username, module id and exam id must be present; the score must be a JSON number.
/// The score is clamped to 0..=100 and rounded.
pub fn normalize_submission(req: &SubmitAttemptRequest) -> Result<NewAttempt, AppError> {
    req.validate()?;

    let username = req.username.trim();
    let module_id = req.module_id.trim();
    let exam_id = req.exam_id.trim();

    if username.is_empty() || module_id.is_empty() || exam_id.is_empty() {
        return Err(AppError::BadRequest(
            "username, moduleId and examId are required".to_string(),
        ));
    }
    if !ID_PATTERN.is_match(module_id) || !ID_PATTERN.is_match(exam_id) {
        return Err(AppError::BadRequest(
            "moduleId and examId may only contain letters, digits, '.', '_' and '-'".to_string(),
        ));
    }

    let raw = req
        .score
        .as_f64()
        .filter(|s| s.is_finite())
        .ok_or_else(|| AppError::BadRequest("score must be a number".to_string()))?;

    Ok(NewAttempt {
        username: username.to_string(),
        module_id: module_id.to_string(),
        exam_id: exam_id.to_string(),
        score: raw.clamp(0.0, 100.0).round() as i32,
    })
}

/// Groups attempts by username and returns the top `top_n` entries.
/// Produces the same ranking as a materialized board fed with [`apply_attempt`].
///
/// Callers pass attempts of a single module.
pub fn aggregate(attempts: &[Attempt], top_n: usize) -> Vec<LeaderboardEntry> {
    let mut by_user: HashMap<&str, LeaderboardEntry> = HashMap::new();

    for attempt in attempts {
        by_user
            .entry(attempt.username.as_str())
            .and_modify(|entry| {
                entry.best_score = entry.best_score.max(attempt.score);
                entry.attempts_count += 1;
                if attempt.timestamp > entry.last_attempt {
                    entry.last_attempt = attempt.timestamp;
                }
            })
            .or_insert_with(|| LeaderboardEntry {
                username: attempt.username.clone(),
                best_score: attempt.score,
                attempts_count: 1,
                last_attempt: attempt.timestamp,
            });
    }

    let mut entries: Vec<LeaderboardEntry> = by_user.into_values().collect();
    entries.sort_by(rank_order);
    entries.truncate(top_n);
    entries
}

/// Upserts one attempt into a materialized board, then re-sorts and truncates it.
///
/// `attempts_count` counts the attempts seen since the user last entered the board;
/// a user who drops off the capped board starts again from one.
pub fn apply_attempt(board: &mut ModuleLeaderboard, attempt: &Attempt) {
    match board
        .entries
        .iter_mut()
        .find(|e| e.username == attempt.username)
    {
        Some(entry) => {
            entry.best_score = entry.best_score.max(attempt.score);
            entry.attempts_count += 1;
            if attempt.timestamp > entry.last_attempt {
                entry.last_attempt = attempt.timestamp;
            }
        }
        None => board.entries.push(LeaderboardEntry {
            username: attempt.username.clone(),
            best_score: attempt.score,
            attempts_count: 1,
            last_attempt: attempt.timestamp,
        }),
    }

    board.entries.sort_by(rank_order);
    board.entries.truncate(MATERIALIZED_LEADERBOARD_CAP);
    board.updated_at = chrono::Utc::now();
}

/// Attempt submission and leaderboard reads over an injected store.
///
/// Board updates for one module are serialized, so concurrent submissions never
/// overwrite each other's entries.
#[derive(Clone)]
pub struct LeaderboardService {
    store: SharedStore,
    module_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl LeaderboardService {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            module_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn module_lock(&self, module_id: &str) -> Arc<Mutex<()>> {
        self.module_locks
            .lock()
            .await
            .entry(module_id.to_string())
            .or_default()
            .clone()
    }

    /// Validates and stores an attempt, then updates the module's materialized board.
    ///
    /// A failed board update is logged; the stored attempt stands and reads fall back
    /// to aggregation.
    pub async fn submit(&self, req: &SubmitAttemptRequest) -> Result<Attempt, AppError> {
        let new_attempt = normalize_submission(req)?;

        let attempt = Attempt {
            id: uuid::Uuid::new_v4().to_string(),
            username: new_attempt.username,
            module_id: new_attempt.module_id,
            exam_id: new_attempt.exam_id,
            score: new_attempt.score,
            timestamp: chrono::Utc::now(),
        };

        self.store.insert_attempt(&attempt).await?;

        if let Err(e) = self.materialize(&attempt).await {
            tracing::warn!(
                module_id = %attempt.module_id,
                "Failed to update materialized leaderboard: {}",
                e
            );
        }

        tracing::info!(
            username = %attempt.username,
            module_id = %attempt.module_id,
            score = attempt.score,
            "Attempt recorded"
        );

        Ok(attempt)
    }

    /// The trigger run for each new attempt. Read, apply and write happen under
    /// the module's lock.
    async fn materialize(&self, attempt: &Attempt) -> Result<(), AppError> {
        let lock = self.module_lock(&attempt.module_id).await;
        let _guard = lock.lock().await;

        let mut board = self
            .store
            .get_materialized(&attempt.module_id)
            .await?
            .unwrap_or_else(|| ModuleLeaderboard::empty(attempt.module_id.clone()));
        apply_attempt(&mut board, attempt);
        self.store.put_materialized(&board).await
    }

    /// Top entries of a module: the materialized board when present, otherwise
    /// computed from the best `FALLBACK_ATTEMPT_FETCH` attempts.
    pub async fn top(
        &self,
        module_id: &str,
        limit: Option<usize>,
    ) -> Result<LeaderboardView, AppError> {
        let top_n = limit
            .unwrap_or(DEFAULT_LEADERBOARD_SIZE)
            .clamp(1, MATERIALIZED_LEADERBOARD_CAP);

        match self.store.get_materialized(module_id).await {
            Ok(Some(board)) if !board.entries.is_empty() => {
                return Ok(LeaderboardView {
                    module_id: module_id.to_string(),
                    source: LeaderboardSource::Materialized,
                    entries: board.entries.into_iter().take(top_n).collect(),
                });
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(module_id, "Materialized leaderboard unavailable: {}", e);
            }
        }

        let attempts = self
            .store
            .top_attempts_for_module(module_id, FALLBACK_ATTEMPT_FETCH)
            .await?;

        Ok(LeaderboardView {
            module_id: module_id.to_string(),
            source: LeaderboardSource::Computed,
            entries: aggregate(&attempts, top_n),
        })
    }

    /// All attempts of one user, newest first.
    pub async fn user_history(&self, username: &str) -> Result<Vec<Attempt>, AppError> {
        self.store.attempts_for_user(username).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{admin_log::AdminLog, message::ChatMessage, profile::UserProfile},
        store::{AdminLogStore, MemoryStore, MessageStore, ProfileStore},
    };
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn attempt(user: &str, score: i32, age_secs: i64) -> Attempt {
        Attempt {
            id: uuid::Uuid::new_v4().to_string(),
            username: user.to_string(),
            module_id: "net-101".to_string(),
            exam_id: "exam-1".to_string(),
            score,
            timestamp: Utc::now() - Duration::seconds(age_secs),
        }
    }

    fn request(user: &str, score: serde_json::Value) -> SubmitAttemptRequest {
        SubmitAttemptRequest {
            username: user.to_string(),
            module_id: "net-101".to_string(),
            exam_id: "exam-1".to_string(),
            score,
        }
    }

    #[test]
    fn aggregate_takes_max_and_counts() {
        let attempts = vec![
            attempt("alice", 60, 30),
            attempt("bob", 80, 20),
            attempt("alice", 90, 10),
            attempt("alice", 75, 5),
        ];

        let entries = aggregate(&attempts, 10);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].username, "alice");
        assert_eq!(entries[0].best_score, 90);
        assert_eq!(entries[0].attempts_count, 3);
        assert_eq!(entries[0].last_attempt, attempts[3].timestamp);
        assert_eq!(entries[1].username, "bob");
        assert_eq!(entries[1].attempts_count, 1);
    }

    #[test]
    fn ties_are_broken_by_username() {
        let attempts = vec![
            attempt("zoe", 80, 3),
            attempt("adam", 80, 2),
            attempt("mia", 80, 1),
        ];
        let names: Vec<String> = aggregate(&attempts, 10)
            .into_iter()
            .map(|e| e.username)
            .collect();
        assert_eq!(names, vec!["adam", "mia", "zoe"]);
    }

    #[test]
    fn aggregate_respects_top_n() {
        let attempts: Vec<Attempt> = (0..15)
            .map(|i| attempt(&format!("user{i:02}"), i, 0))
            .collect();
        let entries = aggregate(&attempts, 10);
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[0].best_score, 14);
    }

    #[test]
    fn materialized_and_computed_paths_agree() {
        let attempts = vec![
            attempt("carol", 55, 50),
            attempt("dave", 70, 40),
            attempt("carol", 95, 30),
            attempt("erin", 70, 20),
            attempt("dave", 65, 10),
        ];

        let mut board = ModuleLeaderboard::empty("net-101");
        for a in &attempts {
            apply_attempt(&mut board, a);
        }

        assert_eq!(board.entries, aggregate(&attempts, MATERIALIZED_LEADERBOARD_CAP));
    }

    #[test]
    fn materialized_board_is_capped() {
        let mut board = ModuleLeaderboard::empty("net-101");
        for i in 0..60 {
            apply_attempt(&mut board, &attempt(&format!("u{i:02}"), i % 101, 0));
        }
        assert_eq!(board.entries.len(), MATERIALIZED_LEADERBOARD_CAP);
        assert!(board
            .entries
            .windows(2)
            .all(|w| w[0].best_score >= w[1].best_score));
        // The ten lowest scorers fell off.
        assert!(board.entries.iter().all(|e| e.best_score >= 10));
    }

    #[test]
    fn submission_score_is_clamped_and_rounded() {
        assert_eq!(normalize_submission(&request("a", json!(104.2))).unwrap().score, 100);
        assert_eq!(normalize_submission(&request("a", json!(-3))).unwrap().score, 0);
        assert_eq!(normalize_submission(&request("a", json!(69.5))).unwrap().score, 70);
        assert_eq!(normalize_submission(&request("a", json!(42))).unwrap().score, 42);
    }

    #[test]
    fn submission_rejects_missing_fields_and_non_numbers() {
        assert!(normalize_submission(&request("a", json!("90"))).is_err());
        assert!(normalize_submission(&request("a", serde_json::Value::Null)).is_err());
        assert!(normalize_submission(&request("   ", json!(90))).is_err());

        let mut no_module = request("a", json!(90));
        no_module.module_id = String::new();
        assert!(normalize_submission(&no_module).is_err());

        let mut bad_exam = request("a", json!(90));
        bad_exam.exam_id = "exam 1; drop".to_string();
        assert!(normalize_submission(&bad_exam).is_err());
    }

    #[tokio::test]
    async fn service_reads_materialized_board() {
        let service = LeaderboardService::new(Arc::new(MemoryStore::new()));
        service.submit(&request("alice", json!(60))).await.unwrap();
        service.submit(&request("alice", json!(85))).await.unwrap();
        service.submit(&request("bob", json!(70))).await.unwrap();

        let view = service.top("net-101", None).await.unwrap();
        assert_eq!(view.source, LeaderboardSource::Materialized);
        assert_eq!(view.entries[0].username, "alice");
        assert_eq!(view.entries[0].best_score, 85);
        assert_eq!(view.entries[0].attempts_count, 2);
    }

    #[tokio::test]
    async fn service_falls_back_to_aggregation() {
        let service = LeaderboardService::new(Arc::new(MemoryStore::without_materialized()));
        service.submit(&request("alice", json!(60))).await.unwrap();
        service.submit(&request("bob", json!(99.6))).await.unwrap();

        let view = service.top("net-101", Some(1)).await.unwrap();
        assert_eq!(view.source, LeaderboardSource::Computed);
        assert_eq!(view.entries.len(), 1);
        assert_eq!(view.entries[0].username, "bob");
        assert_eq!(view.entries[0].best_score, 100);
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let service = LeaderboardService::new(Arc::new(MemoryStore::new()));
        service.submit(&request("alice", json!(10))).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        service.submit(&request("alice", json!(20))).await.unwrap();

        let history = service.user_history("alice").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].score, 20);
    }

    /// A memory store whose board reads take a while, like a database round trip.
    struct SlowBoardStore(MemoryStore);

    #[async_trait]
    impl AttemptStore for SlowBoardStore {
        async fn insert_attempt(&self, attempt: &Attempt) -> Result<(), AppError> {
            self.0.insert_attempt(attempt).await
        }

        async fn top_attempts_for_module(
            &self,
            module_id: &str,
            limit: usize,
        ) -> Result<Vec<Attempt>, AppError> {
            self.0.top_attempts_for_module(module_id, limit).await
        }

        async fn attempts_for_user(&self, username: &str) -> Result<Vec<Attempt>, AppError> {
            self.0.attempts_for_user(username).await
        }
    }

    #[async_trait]
    impl LeaderboardStore for SlowBoardStore {
        async fn get_materialized(
            &self,
            module_id: &str,
        ) -> Result<Option<ModuleLeaderboard>, AppError> {
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
            self.0.get_materialized(module_id).await
        }

        async fn put_materialized(&self, board: &ModuleLeaderboard) -> Result<(), AppError> {
            self.0.put_materialized(board).await
        }
    }

    #[async_trait]
    impl MessageStore for SlowBoardStore {
        async fn insert_message(&self, message: &ChatMessage) -> Result<(), AppError> {
            self.0.insert_message(message).await
        }

        async fn recent_messages(&self, limit: usize) -> Result<Vec<ChatMessage>, AppError> {
            self.0.recent_messages(limit).await
        }

        async fn get_message(&self, id: &str) -> Result<Option<ChatMessage>, AppError> {
            self.0.get_message(id).await
        }

        async fn delete_message(&self, id: &str) -> Result<bool, AppError> {
            self.0.delete_message(id).await
        }
    }

    #[async_trait]
    impl ProfileStore for SlowBoardStore {
        async fn get_profile(&self, username: &str) -> Result<Option<UserProfile>, AppError> {
            self.0.get_profile(username).await
        }

        async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
            self.0.upsert_profile(profile).await
        }
    }

    #[async_trait]
    impl AdminLogStore for SlowBoardStore {
        async fn append_admin_log(&self, log: &AdminLog) -> Result<(), AppError> {
            self.0.append_admin_log(log).await
        }

        async fn recent_admin_logs(&self, limit: usize) -> Result<Vec<AdminLog>, AppError> {
            self.0.recent_admin_logs(limit).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_all_reach_the_board() {
        let service = LeaderboardService::new(Arc::new(SlowBoardStore(MemoryStore::new())));

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .submit(&request(&format!("user{i:02}"), json!(50 + i)))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let view = service.top("net-101", Some(50)).await.unwrap();
        assert_eq!(view.source, LeaderboardSource::Materialized);
        assert_eq!(view.entries.len(), 20);
        assert_eq!(view.entries[0].username, "user19");
        assert!(view.entries.iter().all(|e| e.attempts_count == 1));
    }
}
