use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use conecta_db::format_ts;
use conecta_db::queries::MessageCursor;
use conecta_types::api::{Claims, MessageResponse, SendMessageRequest, UnreadCount};

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, query_timestamp};
use crate::state::AppState;

const MAX_CONTENT_LEN: usize = 5000;
const MAX_PAGE: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor: `created_at` and `id` of the oldest message on the previous
    /// page. `before` alone skips everything sent in that microsecond.
    #[serde(default, deserialize_with = "query_timestamp")]
    pub before: Option<DateTime<Utc>>,
    pub before_id: Option<Uuid>,
}

fn default_limit() -> u32 {
    50
}

/// Only members with an accepted connection can message each other.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(recipient_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let content = req.content.trim().to_string();
    let len = content.chars().count();
    if len == 0 || len > MAX_CONTENT_LEN {
        return Err(ApiError::validation(format!(
            "Message must be between 1 and {} characters",
            MAX_CONTENT_LEN
        )));
    }

    let sender = claims.sub.to_string();
    let recipient = recipient_id.to_string();

    let row = state
        .run_db(move |db| {
            if db.get_user_by_id(&recipient)?.is_none() {
                return Err(ApiError::NotFound("User").into());
            }
            db.send_message(&sender, &recipient, &content)?
                .ok_or_else(|| ApiError::forbidden("You can only message accepted connections").into())
        })
        .await?;

    debug!("Message {} sent {} -> {}", row.id, row.sender_id, row.recipient_id);
    Ok((StatusCode::CREATED, Json(convert::message(row))))
}

/// Newest first. Reading a page marks the caller's received messages in this
/// conversation as read.
pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(other_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<MessageQuery>,
) -> ApiResult<impl IntoResponse> {
    let reader = claims.sub.to_string();
    let other = other_id.to_string();
    let limit = query.limit.clamp(1, MAX_PAGE);
    let cursor = match (query.before, query.before_id) {
        (Some(at), id) => Some(MessageCursor {
            created_at: format_ts(at),
            id: id.map(|id| id.to_string()),
        }),
        (None, Some(_)) => return Err(ApiError::validation("before_id requires before")),
        (None, None) => None,
    };

    let rows = state
        .run_db(move |db| db.get_conversation(&reader, &other, limit, cursor.as_ref()))
        .await?;

    let messages: Vec<MessageResponse> = rows.into_iter().map(convert::message).collect();
    Ok(Json(messages))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let me = claims.sub.to_string();
    let count = state.run_db(move |db| db.unread_count(&me)).await?;
    Ok(Json(UnreadCount { count }))
}
