//! Guestbook message routes.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use quill_common::error::AppError;
use quill_common::types::{Message, MessageStatus, NewMessage, Pagination};
use quill_engine::message::MessageService;
use quill_notifier::NotificationTask;

use crate::middleware::auth::AuthUser;
use crate::middleware::client_ip::ClientIp;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/messages", post(create_message))
        .route("/api/messages", get(list_messages))
}

/// Request body for leaving a message.
#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub message: String,
    /// Contact address for reply notifications; defaults to the account email
    #[serde(default)]
    pub email: Option<String>,
    /// Message being replied to; 0 or absent means none
    #[serde(default)]
    pub reply_to: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMessageResponse {
    pub message_id: i64,
    pub status: MessageStatus,
}

/// Raw paging parameters. Values that are not integers fall back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ListMessagesQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl ListMessagesQuery {
    fn parse(raw: Option<&str>) -> Option<i64> {
        raw.and_then(|v| v.trim().parse().ok())
    }

    pub fn page(&self) -> Option<i64> {
        Self::parse(self.page.as_deref())
    }

    pub fn page_size(&self) -> Option<i64> {
        Self::parse(self.page_size.as_deref())
    }
}

#[derive(Debug, Serialize)]
pub struct ListMessagesResponse {
    pub messages: Vec<Message>,
    pub pagination: Pagination,
}

/// POST /api/messages: Persist a message, detach its notifications, return at once.
async fn create_message(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientIp(ip): ClientIp,
    Json(req): Json<CreateMessageRequest>,
) -> Result<Json<CreateMessageResponse>, AppError> {
    let email = req
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .or(auth.email)
        .unwrap_or_default();

    let new = NewMessage {
        content: req.message,
        user_id: auth.user_id,
        username: auth.username,
        email,
        ip,
        reply_to: req.reply_to.filter(|id| *id > 0),
    };
    let message = MessageService::create(&state.pool, &new).await?;

    for task in NotificationTask::for_message(&message) {
        state.dispatcher.submit(task);
    }

    Ok(Json(CreateMessageResponse {
        message_id: message.id,
        status: message.status,
    }))
}

/// GET /api/messages: Approved messages, newest first.
async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<ListMessagesResponse>, AppError> {
    let (messages, pagination) =
        MessageService::list_approved(&state.pool, query.page(), query.page_size()).await?;
    Ok(Json(ListMessagesResponse {
        messages,
        pagination,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Uri;

    fn query(uri: &'static str) -> ListMessagesQuery {
        Query::<ListMessagesQuery>::try_from_uri(&Uri::from_static(uri))
            .unwrap()
            .0
    }

    fn normalized(uri: &'static str) -> (u32, u32) {
        let q = query(uri);
        Pagination::normalize(q.page(), q.page_size())
    }

    #[test]
    fn test_negative_values_fall_back() {
        assert_eq!(normalized("/api/messages?page=-1"), (1, 20));
        assert_eq!(normalized("/api/messages?page_size=-5"), (1, 20));
        assert_eq!(normalized("/api/messages?page=-3&page_size=0"), (1, 20));
    }

    #[test]
    fn test_non_numeric_values_fall_back() {
        assert_eq!(normalized("/api/messages?page=abc"), (1, 20));
        assert_eq!(normalized("/api/messages?page=2&page_size=lots"), (2, 20));
        assert_eq!(normalized("/api/messages?page=&page_size="), (1, 20));
    }

    #[test]
    fn test_valid_values_kept() {
        assert_eq!(normalized("/api/messages?page=3&page_size=50"), (3, 50));
        assert_eq!(normalized("/api/messages"), (1, 20));
    }
}
