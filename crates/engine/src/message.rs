//! Message service: persistence for guestbook messages.
//!
//! New messages are stored approved. Listing only returns approved messages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use quill_common::error::AppError;
use quill_common::types::{Message, MessageStatus, NewMessage, Pagination};
use quill_notifier::MessageStore;

/// Longest accepted message body, in characters.
pub const MAX_CONTENT_CHARS: usize = 5000;
/// Column widths of `messages.email` and `messages.username`.
pub const MAX_EMAIL_CHARS: usize = 100;
pub const MAX_USERNAME_CHARS: usize = 50;

/// Service layer for message persistence.
pub struct MessageService;

impl MessageService {
    /// Validate and insert a new message.
    ///
    /// A `reply_to` pointing at a message that does not exist is rejected.
    pub async fn create(pool: &PgPool, new: &NewMessage) -> Result<Message, AppError> {
        Self::validate(new)?;

        if let Some(parent_id) = new.reply_to {
            Self::get(pool, parent_id).await?.ok_or_else(|| {
                AppError::NotFound(format!("Message {} not found", parent_id))
            })?;
        }

        let message: Message = sqlx::query_as(
            r#"
            INSERT INTO messages (content, user_id, username, email, ip, status, reply_to)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(new.content.trim())
        .bind(new.user_id)
        .bind(&new.username)
        .bind(new.email.trim())
        .bind(&new.ip)
        .bind(MessageStatus::Approved)
        .bind(new.reply_to)
        .fetch_one(pool)
        .await?;

        tracing::info!(
            message_id = message.id,
            user_id = %message.user_id,
            reply_to = ?message.reply_to,
            ip = %message.ip,
            "Message created"
        );

        Ok(message)
    }

    fn validate(new: &NewMessage) -> Result<(), AppError> {
        let content = new.content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("message must not be empty".to_string()));
        }
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(AppError::Validation(format!(
                "message must be at most {} characters",
                MAX_CONTENT_CHARS
            )));
        }
        if new.email.trim().chars().count() > MAX_EMAIL_CHARS {
            return Err(AppError::Validation(format!(
                "email must be at most {} characters",
                MAX_EMAIL_CHARS
            )));
        }
        if new.username.chars().count() > MAX_USERNAME_CHARS {
            return Err(AppError::Validation(format!(
                "username must be at most {} characters",
                MAX_USERNAME_CHARS
            )));
        }
        if matches!(new.reply_to, Some(id) if id <= 0) {
            return Err(AppError::Validation("reply_to must be positive".to_string()));
        }
        Ok(())
    }

    pub async fn get(pool: &PgPool, id: i64) -> Result<Option<Message>, AppError> {
        let message = sqlx::query_as("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(message)
    }

    /// One page of approved messages, newest first.
    pub async fn list_approved(
        pool: &PgPool,
        page: Option<i64>,
        page_size: Option<i64>,
    ) -> Result<(Vec<Message>, Pagination), AppError> {
        let (page, page_size) = Pagination::normalize(page, page_size);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE status = $1")
            .bind(MessageStatus::Approved)
            .fetch_one(pool)
            .await?;
        let pagination = Pagination::new(page, page_size, total);

        let messages: Vec<Message> = sqlx::query_as(
            r#"
            SELECT * FROM messages
            WHERE status = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(MessageStatus::Approved)
        .bind(i64::from(page_size))
        .bind(pagination.offset())
        .fetch_all(pool)
        .await?;

        Ok((messages, pagination))
    }

    /// Record when the administrator notification went out.
    pub async fn mark_notified(
        pool: &PgPool,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE messages SET notified_at = $1, updated_at = NOW() WHERE id = $2")
                .bind(at)
                .bind(id)
                .execute(pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Message {} not found", id)));
        }
        Ok(())
    }
}

/// [`MessageStore`] over Postgres, handed to notification tasks.
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn find_message(&self, id: i64) -> Result<Option<Message>, AppError> {
        MessageService::get(&self.pool, id).await
    }

    async fn mark_notified(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        MessageService::mark_notified(&self.pool, id, at).await
    }
}
