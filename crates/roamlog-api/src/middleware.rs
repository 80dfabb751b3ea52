use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Gate for database-backed routes: probe the pool (re-opening it if it was
/// dropped) and answer 503 when the database cannot be reached.
pub async fn require_database(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let pool = state.pool.clone();
    match tokio::task::spawn_blocking(move || pool.probe()).await {
        Ok(Ok(_)) => Ok(next.run(req).await),
        Ok(Err(e)) => {
            warn!("Database probe failed: {:#}", e);
            Err(ApiError::Unavailable)
        }
        Err(e) => Err(ApiError::internal("Database check failed", e)),
    }
}
