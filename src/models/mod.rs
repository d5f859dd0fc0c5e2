// src/models/mod.rs

pub mod admin_log;
pub mod attempt;
pub mod fingerprint;
pub mod leaderboard;
pub mod message;
pub mod profile;
pub mod session;
