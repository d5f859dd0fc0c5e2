// src/models/leaderboard.rs

use serde::{Deserialize, Serialize};

/// Best-score-per-user row of a module leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub username: String,
    pub best_score: i32,
    pub attempts_count: i64,
    pub last_attempt: chrono::DateTime<chrono::Utc>,
}

/// The materialized per-module document ('leaderboard' collection, keyed by module id).
/// Holds at most `MATERIALIZED_LEADERBOARD_CAP` entries, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleLeaderboard {
    pub module_id: String,
    pub entries: Vec<LeaderboardEntry>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl ModuleLeaderboard {
    pub fn empty(module_id: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            entries: Vec::new(),
            updated_at: chrono::Utc::now(),
        }
    }
}

/// Where a leaderboard response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardSource {
    Materialized,
    Computed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardView {
    pub module_id: String,
    pub source: LeaderboardSource,
    pub entries: Vec<LeaderboardEntry>,
}

/// Query parameters for reading a leaderboard.
#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    /// Number of entries to return (default: 10, max: 50).
    pub limit: Option<usize>,
}
