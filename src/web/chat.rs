use crate::domain::models::{ChatMessage, ChatbotConversation, UserRole};
use crate::services::chat::SYSTEM_PROMPT;
use crate::state::SharedState;
use crate::web::error::ApiError;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use futures::StreamExt;
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_CONVERSATION_LIMIT: i64 = 10;

#[derive(Deserialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct NewConversation {
    user_id: Option<String>,
    user_type: UserRole,
    messages: Vec<ChatMessage>,
    #[serde(default)]
    session_duration_minutes: f64,
    satisfaction_rating: Option<f64>,
}

#[derive(Deserialize)]
struct ConversationQuery {
    user_id: Option<String>,
    limit: Option<i64>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/conversations", get(list_conversations).post(save_conversation))
        .with_state(state)
}

/// Relays the conversation to the language model and streams its answer as
/// plain text. Nothing is filtered, truncated or retried.
async fn chat(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let stream = state
        .relay
        .stream_reply(SYSTEM_PROMPT, &payload.messages)
        .await
        .map_err(|e| {
            tracing::error!("Chat upstream failed: {:?}", e);
            ApiError::Upstream(e.to_string())
        })?;

    let body = stream.inspect(|chunk| {
        if let Err(e) = chunk {
            tracing::error!("Chat stream aborted: {:?}", e);
        }
    });

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response())
}

async fn save_conversation(
    State(state): State<SharedState>,
    Json(payload): Json<NewConversation>,
) -> Result<(StatusCode, Json<ChatbotConversation>), ApiError> {
    let user_id = payload
        .user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("user_id is required"))?;
    if payload.session_duration_minutes < 0.0 {
        return Err(ApiError::bad_request("session_duration_minutes must not be negative"));
    }

    let conversation = ChatbotConversation {
        id: Uuid::new_v4(),
        user_id,
        user_type: payload.user_type,
        timestamp: Utc::now(),
        messages: payload.messages,
        session_duration_minutes: payload.session_duration_minutes,
        satisfaction_rating: payload.satisfaction_rating,
    };
    state.analytics.save_conversation(&conversation).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

async fn list_conversations(
    State(state): State<SharedState>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<Vec<ChatbotConversation>>, ApiError> {
    let user_id = query
        .user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("user_id is required"))?;
    let limit = query.limit.unwrap_or(DEFAULT_CONVERSATION_LIMIT).clamp(1, 100);
    Ok(Json(state.analytics.conversations_for(&user_id, limit).await?))
}
