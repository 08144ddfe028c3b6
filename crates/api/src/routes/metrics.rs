//! Site metrics routes.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use quill_common::error::AppError;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/metrics/visit", post(record_visit))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VisitResponse {
    pub count: i64,
}

/// POST /api/metrics/visit: Count the caller once as a unique visitor.
///
/// Anonymous callers get the current total without being counted.
async fn record_visit(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
) -> Result<Json<VisitResponse>, AppError> {
    let identity = auth.map(|a| a.user_id.to_string());
    let count = state.visits.record_visit(identity.as_deref()).await?;
    Ok(Json(VisitResponse { count }))
}
