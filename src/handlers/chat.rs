// src/handlers/chat.rs

use std::convert::Infallible;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::Stream;

use crate::{
    error::AppError,
    models::message::{DeleteMessageParams, SendMessageRequest},
    services::chat::ChatService,
    utils::jwt::Claims,
};

/// The live feed: the 50 most recent messages, newest first.
pub async fn list_messages(
    State(chat): State<ChatService>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(chat.recent().await?))
}

/// Posts a message. Empty and over-long messages are rejected with 400.
pub async fn send_message(
    State(chat): State<ChatService>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let message = chat.post(payload).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Deletes a message.
/// Requires: Login + admin claim + `?confirm=true`.
pub async fn delete_message(
    State(chat): State<ChatService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Query(params): Query<DeleteMessageParams>,
) -> Result<impl IntoResponse, AppError> {
    chat.delete(&claims, &id, params.confirm).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Server-sent events: one `snapshot` event per feed change, starting with the current one.
pub async fn stream_messages(
    State(chat): State<ChatService>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = chat.subscribe().await?;

    let stream = futures::stream::unfold(subscription, |mut subscription| async move {
        let snapshot = subscription.next().await?;
        let event = Event::default()
            .event("snapshot")
            .json_data(&*snapshot)
            .unwrap_or_else(|e| {
                tracing::error!("Failed to encode chat snapshot: {}", e);
                Event::default().comment("encoding error")
            });
        Some((Ok(event), subscription))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
