// src/handlers/auth.rs

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{AppendHeaders, Html, IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::Rng;
use url::Url;

use crate::{
    config::SESSION_TTL_SECONDS,
    error::AppError,
    models::session::{LoginParams, OAuthCallbackParams, SessionPayload},
    services::github::authorize_url,
    state::AppState,
    utils::{
        cookie,
        jwt::{AUTH_COOKIE, sign_jwt},
    },
};

pub const SESSION_COOKIE: &str = "session";
const STATE_COOKIE: &str = "oauth_state";
const STATE_COOKIE_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_RETURN_TO: &str = "/admin/";

const ACCESS_DENIED_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Access denied</title></head>
<body>
<h1>Access denied</h1>
<p>Your GitHub account is not authorized to use the admin pages.</p>
<p><a href="/">Back to the exams</a></p>
</body>
</html>
"#;

/// Encodes a session payload the way the `session` cookie carries it.
pub fn encode_session(payload: &SessionPayload) -> Result<String, AppError> {
    Ok(STANDARD.encode(serde_json::to_vec(payload)?))
}

/// Decodes a `session` cookie value. Returns `None` for malformed or expired sessions.
pub fn decode_session(raw: &str, now_ms: i64) -> Option<SessionPayload> {
    let bytes = STANDARD.decode(raw).ok()?;
    let payload: SessionPayload = serde_json::from_slice(&bytes).ok()?;
    (payload.expires_at > now_ms).then_some(payload)
}

/// Only same-origin paths are accepted as post-login destinations.
pub fn sanitize_return_to(return_to: Option<&str>) -> String {
    let Some(candidate) = return_to.map(str::trim).filter(|s| !s.is_empty()) else {
        return DEFAULT_RETURN_TO.to_string();
    };
    if !candidate.starts_with('/') || candidate.starts_with("//") || candidate.contains('\\') {
        return DEFAULT_RETURN_TO.to_string();
    }

    // Normalizes dot segments and percent-encoding against a throwaway origin.
    let Ok(base) = Url::parse("http://localhost") else {
        return DEFAULT_RETURN_TO.to_string();
    };
    match base.join(candidate) {
        Ok(url) if url.origin() == base.origin() => {
            let mut path = url.path().to_string();
            if let Some(query) = url.query() {
                path.push('?');
                path.push_str(query);
            }
            if let Some(fragment) = url.fragment() {
                path.push('#');
                path.push_str(fragment);
            }
            path
        }
        _ => DEFAULT_RETURN_TO.to_string(),
    }
}

fn callback_uri(state: &AppState, return_to: &str) -> Result<String, AppError> {
    let configured = state
        .config
        .github
        .as_ref()
        .and_then(|oauth| oauth.redirect_uri.clone())
        .unwrap_or_else(|| {
            format!(
                "{}/api/auth/github/callback",
                state.config.public_base_url.trim_end_matches('/')
            )
        });
    let mut url =
        Url::parse(&configured).map_err(|e| AppError::InternalServerError(e.to_string()))?;
    url.query_pairs_mut().append_pair("return_to", return_to);
    Ok(url.to_string())
}

/// Starts the GitHub login: redirects to GitHub with a fresh `state`, also kept in a cookie.
pub async fn github_login(
    State(state): State<AppState>,
    Query(params): Query<LoginParams>,
) -> Result<Response, AppError> {
    let oauth = state
        .config
        .github
        .as_ref()
        .ok_or(AppError::BadRequest("GitHub login is not configured".to_string()))?;

    let mut nonce = [0u8; 16];
    rand::thread_rng().fill(&mut nonce);
    let oauth_state = hex::encode(nonce);

    let return_to = sanitize_return_to(params.return_to.as_deref());
    let redirect = authorize_url(
        &oauth.client_id,
        &callback_uri(&state, &return_to)?,
        &oauth_state,
    )?;

    Ok((
        StatusCode::FOUND,
        AppendHeaders([
            (header::LOCATION, redirect.to_string()),
            (
                header::SET_COOKIE,
                cookie::secure(STATE_COOKIE, &oauth_state, STATE_COOKIE_TTL_SECONDS),
            ),
        ]),
    )
        .into_response())
}

/// OAuth callback.
///
/// * Checks `state` against the cookie set by `github_login`.
/// * Exchanges the code and looks up the GitHub user.
/// * Only logins holding the admin claim get a session; everyone else gets an access denied page.
/// * Sets the `session` (base64 JSON) and `auth_token` (JWT) cookies and redirects to `return_to`.
pub async fn github_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<OAuthCallbackParams>,
) -> Result<Response, AppError> {
    let github = state
        .github
        .clone()
        .ok_or(AppError::BadRequest("GitHub login is not configured".to_string()))?;

    let (Some(code), Some(returned_state)) = (params.code.as_deref(), params.state.as_deref())
    else {
        return Err(AppError::BadRequest("Missing code or state".to_string()));
    };

    match cookie::get(&headers, STATE_COOKIE) {
        Some(expected) if expected == returned_state => {}
        _ => {
            tracing::warn!("OAuth state mismatch");
            return Err(AppError::AuthError("Invalid OAuth state".to_string()));
        }
    }

    let access_token = github.exchange_code(code).await?;
    let user = github.fetch_user(&access_token).await?;

    if !state.config.is_admin(&user.login) {
        tracing::warn!(login = %user.login, "GitHub login without admin claim");
        return Ok((
            StatusCode::FORBIDDEN,
            AppendHeaders([(header::SET_COOKIE, cookie::clear(STATE_COOKIE))]),
            Html(ACCESS_DENIED_PAGE),
        )
            .into_response());
    }

    let now_ms = chrono::Utc::now().timestamp_millis();
    let session = SessionPayload {
        username: user.login.clone(),
        name: user.name.clone(),
        avatar: user.avatar_url.clone(),
        timestamp: now_ms,
        expires_at: now_ms + SESSION_TTL_SECONDS * 1000,
    };

    let token = sign_jwt(
        &user.login,
        "admin",
        &state.config.jwt_secret,
        state.config.jwt_expiration,
    )?;

    tracing::info!(login = %user.login, "Admin signed in");

    let location = sanitize_return_to(params.return_to.as_deref());
    Ok((
        StatusCode::FOUND,
        AppendHeaders([
            (header::LOCATION, location),
            (
                header::SET_COOKIE,
                cookie::secure(SESSION_COOKIE, &encode_session(&session)?, SESSION_TTL_SECONDS),
            ),
            (
                header::SET_COOKIE,
                cookie::secure(AUTH_COOKIE, &token, SESSION_TTL_SECONDS),
            ),
            (header::SET_COOKIE, cookie::clear(STATE_COOKIE)),
        ]),
    )
        .into_response())
}

/// Returns the current session payload, or 401 when there is none.
pub async fn get_session(headers: HeaderMap) -> Result<impl IntoResponse, AppError> {
    let raw = cookie::get(&headers, SESSION_COOKIE)
        .ok_or(AppError::AuthError("Not signed in".to_string()))?;
    let session = decode_session(&raw, chrono::Utc::now().timestamp_millis())
        .ok_or(AppError::AuthError("Session expired or invalid".to_string()))?;
    Ok(Json(session))
}

/// Clears the session cookies.
pub async fn logout() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        AppendHeaders([
            (header::SET_COOKIE, cookie::clear(SESSION_COOKIE)),
            (header::SET_COOKIE, cookie::clear(AUTH_COOKIE)),
        ]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_to_must_stay_on_site() {
        assert_eq!(sanitize_return_to(None), "/admin/");
        assert_eq!(sanitize_return_to(Some("/admin/logs?x=1")), "/admin/logs?x=1");
        assert_eq!(sanitize_return_to(Some("/a/../b")), "/b");
        assert_eq!(sanitize_return_to(Some("https://evil.example/")), "/admin/");
        assert_eq!(sanitize_return_to(Some("//evil.example/")), "/admin/");
        assert_eq!(sanitize_return_to(Some("/\\evil.example")), "/admin/");
    }

    #[test]
    fn session_cookie_round_trip_and_expiry() {
        let payload = SessionPayload {
            username: "octocat".into(),
            name: Some("Mona".into()),
            avatar: None,
            timestamp: 1_000,
            expires_at: 1_000 + SESSION_TTL_SECONDS * 1000,
        };
        let encoded = encode_session(&payload).unwrap();
        assert_eq!(decode_session(&encoded, 2_000), Some(payload.clone()));
        assert_eq!(decode_session(&encoded, payload.expires_at), None);
        assert_eq!(decode_session("not base64!", 0), None);
    }
}
