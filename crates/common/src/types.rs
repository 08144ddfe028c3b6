use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Moderation state of a guestbook message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum MessageStatus {
    Pending = 0,
    Approved = 1,
    Rejected = 2,
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageStatus::Pending => write!(f, "pending"),
            MessageStatus::Approved => write!(f, "approved"),
            MessageStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A registered account. Accounts are managed elsewhere; this service only reads them.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A guestbook message, optionally replying to an earlier one.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub content: String,
    pub user_id: Uuid,
    pub username: String,
    /// Contact address for reply notifications; empty when none was given.
    pub email: String,
    #[serde(skip_serializing)]
    pub ip: String,
    pub status: MessageStatus,
    pub is_read: bool,
    pub reply_to: Option<i64>,
    /// When the administrator notification for this message was delivered.
    pub notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// The contact address, or `None` if the author left none.
    pub fn contact(&self) -> Option<&str> {
        let email = self.email.trim();
        (!email.is_empty()).then_some(email)
    }
}

/// Fields needed to insert a new message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub content: String,
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub ip: String,
    pub reply_to: Option<i64>,
}

/// Page metadata returned alongside list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub const DEFAULT_PAGE_SIZE: u32 = 20;
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// Normalize raw query values: `page < 1` becomes 1, an out-of-range size becomes the default.
    pub fn normalize(page: Option<i64>, page_size: Option<i64>) -> (u32, u32) {
        let page = page
            .and_then(|p| u32::try_from(p).ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let page_size = page_size
            .and_then(|s| u32::try_from(s).ok())
            .filter(|s| (1..=Self::MAX_PAGE_SIZE).contains(s))
            .unwrap_or(Self::DEFAULT_PAGE_SIZE);
        (page, page_size)
    }

    pub fn new(page: u32, page_size: u32, total: i64) -> Self {
        let size = i64::from(page_size.max(1));
        Self {
            page,
            page_size,
            total,
            pages: (total + size - 1) / size,
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }
}
