//! Detached notification delivery.
//!
//! After a message is persisted the API hands one or two [`NotificationTask`]s
//! to the [`Dispatcher`], which runs each on its own tokio task behind a
//! counting semaphore:
//! - at most `max_concurrent` tasks execute at once, any number may wait
//! - a failing or panicking task is logged and its slot released
//! - nothing is retried and nothing is reported back to the request
//!
//! Delivery goes through a [`MailTransport`] (the Resend HTTP API in
//! production) and reply notifications resolve the parent message through a
//! [`MessageStore`].

pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod task;
pub mod transport;

pub use dispatcher::{DispatchReport, Dispatcher, TaskOutcome};
pub use error::NotifyError;
pub use executor::{Completion, MessageStore, NotificationExecutor, TaskExecutor};
pub use task::{NotificationTask, TaskKind};
pub use transport::{Delivery, MailTransport, ResendMailer};
