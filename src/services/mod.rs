// src/services/mod.rs

pub mod chat;
pub mod github;
pub mod leaderboard;
pub mod rate_limit;
