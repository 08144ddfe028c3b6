//! Quill HTTP API.
//!
//! Endpoints:
//! - GET  /health
//! - POST /api/messages: Leave a message (authenticated), notifications are detached
//! - GET  /api/messages: Approved messages, paginated
//! - POST /api/metrics/visit: Count a unique visitor, return the total

pub mod middleware;
pub mod routes;
pub mod state;
