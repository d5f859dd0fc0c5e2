// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, chat, fingerprint, leaderboard, profile},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, leaderboard, chat, fingerprint, profile, admin).
/// * Applies global middleware (Trace, CORS).
/// * Serves the static exam pages as the fallback when a directory is configured.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = [
        state.config.public_base_url.as_str(),
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ]
    .iter()
    .filter_map(|origin| origin.trim_end_matches('/').parse().ok())
    .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    let auth_routes = Router::new()
        .route("/github/login", get(auth::github_login))
        .route("/github/callback", get(auth::github_callback))
        .route("/session", get(auth::get_session))
        .route("/logout", post(auth::logout));

    let leaderboard_routes = Router::new()
        .route("/api/attempts", post(leaderboard::submit_attempt))
        .route("/api/attempts/{username}", get(leaderboard::list_user_attempts))
        .route(
            "/api/leaderboard/{module_id}",
            get(leaderboard::get_leaderboard),
        );

    let chat_routes = Router::new()
        .route(
            "/messages",
            get(chat::list_messages).post(chat::send_message),
        )
        .route("/stream", get(chat::stream_messages))
        // Protected chat routes; the admin claim itself is checked by the chat service.
        .merge(
            Router::new()
                .route("/messages/{id}", delete(chat::delete_message))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let profile_routes = Router::new()
        .route("/{username}", get(profile::get_profile))
        .merge(
            Router::new()
                .route("/photo", put(profile::update_photo))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let admin_routes = Router::new()
        .route("/logs", get(admin::list_admin_logs))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let mut router = Router::new()
        .nest("/api/auth", auth_routes)
        .merge(leaderboard_routes)
        .nest("/api/chat", chat_routes)
        .route("/api/fingerprint", post(fingerprint::log_fingerprint))
        .nest("/api/profile", profile_routes)
        .nest("/api/admin", admin_routes);

    if let Some(dir) = &state.config.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
