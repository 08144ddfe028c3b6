//! Notification task value objects and the emails they compose.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quill_common::types::Message;

use crate::error::NotifyError;

/// Which kind of outbound notification a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Tell the administrators a new message arrived.
    AdminNotify,
    /// Tell the author of the parent message that someone replied.
    ReplyNotify,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::AdminNotify => write!(f, "admin_notify"),
            TaskKind::ReplyNotify => write!(f, "reply_notify"),
        }
    }
}

/// One unit of outbound notification work.
///
/// Owns a copy of every field it needs so it can outlive the request that
/// created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTask {
    pub kind: TaskKind,
    /// The newly created message this task was spawned for.
    pub message_id: i64,
    pub content: String,
    pub sender: String,
    pub contact: String,
    pub origin_ip: String,
    pub parent_id: Option<i64>,
}

impl NotificationTask {
    /// Administrator notification for a freshly persisted message.
    pub fn admin_notify(message: &Message) -> Self {
        Self::from_message(TaskKind::AdminNotify, message)
    }

    /// Reply notification, or `None` when the message replies to nothing.
    pub fn reply_notify(message: &Message) -> Option<Self> {
        message
            .reply_to
            .filter(|id| *id > 0)
            .map(|_| Self::from_message(TaskKind::ReplyNotify, message))
    }

    /// Every task a new message triggers, admin notification first.
    pub fn for_message(message: &Message) -> Vec<Self> {
        std::iter::once(Self::admin_notify(message))
            .chain(Self::reply_notify(message))
            .collect()
    }

    fn from_message(kind: TaskKind, message: &Message) -> Self {
        Self {
            kind,
            message_id: message.id,
            content: message.content.clone(),
            sender: message.username.clone(),
            contact: message.email.clone(),
            origin_ip: message.ip.clone(),
            parent_id: message.reply_to,
        }
    }

    /// The parent message id a reply notification must resolve.
    pub fn require_parent(&self) -> Result<i64, NotifyError> {
        match self.parent_id {
            Some(id) if id > 0 => Ok(id),
            _ => Err(NotifyError::InvalidPayload(format!(
                "{} task for message {} has no parent message",
                self.kind, self.message_id
            ))),
        }
    }

    /// Subject and HTML body of the administrator email.
    pub fn admin_email(&self, now: DateTime<Utc>) -> (String, String) {
        let contact = if self.contact.trim().is_empty() {
            "(none)"
        } else {
            self.contact.as_str()
        };
        let body = format!(
            "<h3>Your blog received a new message</h3>\n\
             <p><strong>From:</strong> {}</p>\n\
             <p><strong>Email:</strong> {}</p>\n\
             <p><strong>IP address:</strong> {}</p>\n\
             <p><strong>Time:</strong> {}</p>\n\
             <hr>\n\
             <p><strong>Message:</strong></p>\n\
             <p>{}</p>\n\
             <hr>\n\
             <p>Sign in to the admin console to review it.</p>",
            escape_html(&self.sender),
            escape_html(contact),
            escape_html(&self.origin_ip),
            now.format("%Y-%m-%d %H:%M:%S UTC"),
            escape_html(&self.content),
        );
        ("New message on your blog".to_string(), body)
    }

    /// Subject and HTML body of the email sent to the parent's author.
    pub fn reply_email(&self, parent: &Message) -> (String, String) {
        let body = format!(
            "<h3>Someone replied to your message</h3>\n\
             <p><strong>Your message:</strong></p>\n\
             <p>{}</p>\n\
             <hr>\n\
             <p><strong>Reply:</strong></p>\n\
             <p>{}</p>\n\
             <hr>\n\
             <p>Thanks for stopping by!</p>",
            escape_html(&parent.content),
            escape_html(&self.content),
        );
        ("Your message received a reply".to_string(), body)
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
