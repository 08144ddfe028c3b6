//! Task bodies: what a [`NotificationTask`] does once it holds a slot.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use quill_common::error::AppError;
use quill_common::types::Message;

use crate::error::NotifyError;
use crate::task::{NotificationTask, TaskKind};
use crate::transport::{Delivery, MailTransport};

/// How a task body finished when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Delivered,
    /// Mail transport has no host or credentials.
    Unconfigured,
    /// Nobody to notify (no admin recipients, or the parent left no address).
    NoRecipient,
}

/// Runs the body of a notification task. The dispatcher owns slots,
/// fault isolation and logging; executors only do the work.
#[async_trait]
pub trait TaskExecutor: Send + Sync + 'static {
    async fn execute(&self, task: &NotificationTask) -> Result<Completion, NotifyError>;
}

/// Message persistence as seen from inside a notification task.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn find_message(&self, id: i64) -> Result<Option<Message>, AppError>;

    async fn mark_notified(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError>;
}

/// Production executor: composes the email, sends it, records `notified_at`.
pub struct NotificationExecutor {
    transport: Arc<dyn MailTransport>,
    store: Arc<dyn MessageStore>,
    admin_emails: Vec<String>,
}

impl NotificationExecutor {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        store: Arc<dyn MessageStore>,
        admin_emails: Vec<String>,
    ) -> Self {
        Self {
            transport,
            store,
            admin_emails,
        }
    }

    async fn notify_admins(&self, task: &NotificationTask) -> Result<Completion, NotifyError> {
        if self.admin_emails.is_empty() {
            return Ok(Completion::NoRecipient);
        }

        let (subject, body) = task.admin_email(Utc::now());
        if self.transport.send(&self.admin_emails, &subject, &body).await? == Delivery::Skipped {
            return Ok(Completion::Unconfigured);
        }

        // Best effort: the mail already went out.
        if let Err(e) = self.store.mark_notified(task.message_id, Utc::now()).await {
            tracing::warn!(
                message_id = task.message_id,
                error = %e,
                "Failed to record notified_at"
            );
        }

        Ok(Completion::Delivered)
    }

    async fn notify_parent_author(
        &self,
        task: &NotificationTask,
    ) -> Result<Completion, NotifyError> {
        let parent_id = task.require_parent()?;
        let parent = self
            .store
            .find_message(parent_id)
            .await?
            .ok_or(NotifyError::ParentNotFound(parent_id))?;

        let Some(to) = parent.contact() else {
            return Ok(Completion::NoRecipient);
        };

        let (subject, body) = task.reply_email(&parent);
        match self.transport.send(&[to.to_string()], &subject, &body).await? {
            Delivery::Sent => Ok(Completion::Delivered),
            Delivery::Skipped => Ok(Completion::Unconfigured),
        }
    }
}

#[async_trait]
impl TaskExecutor for NotificationExecutor {
    async fn execute(&self, task: &NotificationTask) -> Result<Completion, NotifyError> {
        if !self.transport.is_configured() {
            return Ok(Completion::Unconfigured);
        }

        match task.kind {
            TaskKind::AdminNotify => self.notify_admins(task).await,
            TaskKind::ReplyNotify => self.notify_parent_author(task).await,
        }
    }
}
