// src/widgets/mod.rs

// Page widgets hold no DOM; the page feeds them events and renders their state.

pub mod chat_listener;
pub mod fingerprint;
pub mod leaderboard;
pub mod persistence;
pub mod profile;
pub mod quiz;
