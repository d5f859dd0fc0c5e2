// src/models/fingerprint.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of a fingerprint log request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FingerprintLogRequest {
    #[validate(length(min = 1, max = 128, message = "Fingerprint must be between 1 and 128 characters"))]
    pub fp: String,
    #[serde(default)]
    pub ua: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub tz: Option<String>,
    /// Client timestamp (ms since epoch).
    #[serde(default)]
    pub ts: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
    /// Display name the visitor entered, if any.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintLogResponse {
    pub success: bool,
    pub client_ip: Option<String>,
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
}
