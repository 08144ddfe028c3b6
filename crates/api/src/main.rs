//! Quill API server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use quill_common::config::AppConfig;
use quill_common::db::{create_pool, run_migrations};
use quill_common::redis_pool::create_redis_pool;
use quill_engine::message::PgMessageStore;
use quill_engine::store::RedisStore;
use quill_engine::visit::VisitCounter;
use quill_notifier::{Dispatcher, MailTransport, NotificationExecutor, ResendMailer};

use quill_api::routes::create_router;
use quill_api::state::AppState;

/// Request bodies above this size are rejected with 413.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "quill_api=debug,quill_notifier=debug,quill_engine=debug,tower_http=debug",
            )
        }))
        .init();

    tracing::info!("Starting Quill API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Create database connection pool
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&pool).await?;

    // Visit counter over Redis
    let redis = create_redis_pool(&config.redis_url).await?;
    let visits = VisitCounter::new(Arc::new(RedisStore::new(redis)));
    visits.init().await?;

    // Notification dispatcher
    let mailer = ResendMailer::from_config(&config)?;
    if !mailer.is_configured() {
        tracing::warn!("Mail transport not configured; message notifications will be skipped");
    }
    if config.admin_emails.is_empty() {
        tracing::warn!("ADMIN_EMAILS is empty; administrators will not be notified");
    }
    let executor = NotificationExecutor::new(
        Arc::new(mailer),
        Arc::new(PgMessageStore::new(pool.clone())),
        config.admin_emails.clone(),
    );
    let dispatcher = Dispatcher::new(Arc::new(executor), config.notify_max_concurrent);
    tracing::info!(
        max_concurrent = dispatcher.max_concurrent(),
        "Notification dispatcher ready"
    );

    // Build application state
    let bind_addr = config.bind_addr;
    let grace = Duration::from_secs(config.shutdown_grace_secs);
    let state = AppState::new(pool, dispatcher.clone(), visits, config);

    // Build router
    let app = create_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    tracing::info!("API server listening on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received shutdown signal, stopping gracefully...");
    })
    .await?;

    // Give detached notifications a bounded chance to finish.
    if tokio::time::timeout(grace, dispatcher.wait_idle()).await.is_err() {
        tracing::warn!(
            pending = dispatcher.pending(),
            "Shutdown grace period elapsed with notifications still outstanding"
        );
    }

    tracing::info!("Quill API server stopped.");
    Ok(())
}
