// src/models/admin_log.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Audit record of a privileged action ('admin_logs' table).
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminLog {
    pub id: String,
    pub actor: String,
    pub action: String,
    pub target: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl AdminLog {
    pub fn new(actor: &str, action: &str, target: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            actor: actor.to_string(),
            action: action.to_string(),
            target: target.to_string(),
            timestamp: chrono::Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminLogParams {
    pub limit: Option<usize>,
}
