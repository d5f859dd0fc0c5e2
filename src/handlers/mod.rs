// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod chat;
pub mod fingerprint;
pub mod leaderboard;
pub mod profile;
