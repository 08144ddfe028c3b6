//! Shared application state for the Axum API server.

use quill_common::config::AppConfig;
use quill_engine::visit::VisitCounter;
use quill_notifier::Dispatcher;
use sqlx::PgPool;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Detached notification delivery; handlers submit and move on.
    pub dispatcher: Dispatcher,
    pub visits: VisitCounter,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        dispatcher: Dispatcher,
        visits: VisitCounter,
        config: AppConfig,
    ) -> Self {
        Self {
            pool,
            dispatcher,
            visits,
            config,
        }
    }
}
