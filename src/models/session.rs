// src/models/session.rs

use serde::{Deserialize, Serialize};

/// Payload of the `session` cookie, base64-encoded JSON. Times are ms since epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub username: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub timestamp: i64,
    pub expires_at: i64,
}

/// Query parameters of the OAuth callback.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub return_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    pub return_to: Option<String>,
}

/// The subset of the GitHub user object we use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubUser {
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}
