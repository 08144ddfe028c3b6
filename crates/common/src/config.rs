use std::net::SocketAddr;

use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string (backs the visit counter)
    pub redis_url: String,

    /// JWT secret for bearer token validation
    pub jwt_secret: String,

    /// Address the HTTP server binds to (default: 0.0.0.0:3000)
    pub bind_addr: SocketAddr,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Base URL of the mail HTTP API. Empty disables mail delivery.
    pub mail_api_url: String,

    /// Resend API key for email delivery
    pub resend_api_key: Option<String>,

    /// Email sender address
    pub email_from: Option<String>,

    /// Administrator recipients for new-message notifications
    pub admin_emails: Vec<String>,

    /// Timeout applied by the mail transport to each send (default: 10)
    pub mail_timeout_secs: u64,

    /// Maximum number of notification tasks executing at once (default: 10)
    pub notify_max_concurrent: usize,

    /// How long shutdown waits for outstanding notification tasks (default: 10)
    pub shutdown_grace_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let notify_max_concurrent: usize = std::env::var("NOTIFY_MAX_CONCURRENT")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("NOTIFY_MAX_CONCURRENT must be a valid usize"))?;
        if notify_max_concurrent == 0 {
            anyhow::bail!("NOTIFY_MAX_CONCURRENT must be at least 1");
        }

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
            bind_addr: std::env::var("BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BIND_ADDR must be a valid socket address"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            mail_api_url: std::env::var("MAIL_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com".to_string()),
            resend_api_key: non_empty_var("RESEND_API_KEY"),
            email_from: non_empty_var("EMAIL_FROM"),
            admin_emails: parse_address_list(
                &std::env::var("ADMIN_EMAILS").unwrap_or_default(),
            ),
            mail_timeout_secs: std::env::var("MAIL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("MAIL_TIMEOUT_SECS must be a valid u64"))?,
            notify_max_concurrent,
            shutdown_grace_secs: std::env::var("SHUTDOWN_GRACE_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SHUTDOWN_GRACE_SECS must be a valid u64"))?,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split a comma-separated address list, dropping blank entries.
pub fn parse_address_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
