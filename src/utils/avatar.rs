// src/utils/avatar.rs

/// Background colours for avatar initials.
pub const AVATAR_PALETTE: [&str; 8] = [
    "#e57373", "#64b5f6", "#81c784", "#ffb74d", "#ba68c8", "#4db6ac", "#f06292", "#7986cb",
];

/// Deterministic palette slot for a username.
///
/// The classic `hash * 31 + c` string hash over UTF-16 units, in wrapping i32 arithmetic.
pub fn palette_index(username: &str) -> usize {
    let hash = username
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32));
    (hash.unsigned_abs() as usize) % AVATAR_PALETTE.len()
}

pub fn avatar_color(username: &str) -> &'static str {
    AVATAR_PALETTE[palette_index(username)]
}

/// Upper-cased first character, or '?' for an empty name.
pub fn initial(username: &str) -> String {
    username
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_else(|| "?".to_string())
}
