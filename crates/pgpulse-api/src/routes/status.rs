//! Status endpoint — answers whether the service can reach its database.
//!
//! Acquisition failures and query failures both map to 503 but carry different
//! `error` strings, so "database unreachable" and "database reachable but
//! broken" can be told apart.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use pgpulse_db::{ConnectionPool, DbError, Lease};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// One result row of the timestamp query.
#[derive(Debug, Serialize)]
pub struct TimeRow {
    pub time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct UnavailableBody {
    error: &'static str,
    message: String,
}

/// Status router.
pub fn router<P: ConnectionPool>() -> Router<Arc<AppState<P>>> {
    Router::new().route("/api/status", get(status::<P>))
}

async fn status<P: ConnectionPool>(State(state): State<Arc<AppState<P>>>) -> Response {
    match probe(&state.pool).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => unavailable(&err),
    }
}

/// Acquire a lease, run the timestamp query, and release the lease before
/// the outcome is inspected.
pub async fn probe<P: ConnectionPool>(pool: &P) -> Result<Vec<TimeRow>, DbError> {
    let mut lease = pool.acquire().await.inspect_err(|err| {
        tracing::error!(error = ?err.driver_error(), "Error acquiring database connection");
    })?;

    let result = lease.server_time().await;
    lease.release();

    let time = result.inspect_err(|err| {
        tracing::error!(error = ?err.driver_error(), "Error executing status query");
    })?;

    Ok(vec![TimeRow { time }])
}

/// 503 with the failure category and the driver's message.
pub fn unavailable(err: &DbError) -> Response {
    let body = UnavailableBody {
        error: err.category(),
        message: err.driver_error().to_string(),
    };
    (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
}
