// src/handlers/fingerprint.rs

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::fingerprint::{FingerprintLogRequest, FingerprintLogResponse},
    services::rate_limit::FingerprintRateLimiter,
    utils::client_ip::ClientIp,
};

/// Access log for browser fingerprints.
///
/// At most 3 requests per fingerprint per 60 seconds; further ones get 429.
/// Echoes the caller's address split into IPv4 / IPv6.
pub async fn log_fingerprint(
    State(limiter): State<FingerprintRateLimiter>,
    client_ip: ClientIp,
    Json(payload): Json<FingerprintLogRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    if !limiter.check(&payload.fp).await {
        tracing::warn!(fingerprint = %payload.fp, "Fingerprint rate limit exceeded");
        return Ok((
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "success": false,
                "error": "Rate limit exceeded",
            })),
        )
            .into_response());
    }

    let client = client_ip.0.map(|ip| ip.to_string());

    tracing::info!(
        fingerprint = %payload.fp,
        ip = client.as_deref().unwrap_or("unknown"),
        name = payload.name.as_deref().unwrap_or(""),
        lang = payload.lang.as_deref().unwrap_or(""),
        tz = payload.tz.as_deref().unwrap_or(""),
        url = payload.url.as_deref().unwrap_or(""),
        ua = payload.ua.as_deref().unwrap_or(""),
        "Fingerprint visit"
    );

    Ok(Json(FingerprintLogResponse {
        success: true,
        client_ip: client,
        ipv4: client_ip.ipv4(),
        ipv6: client_ip.ipv6(),
    })
    .into_response())
}
