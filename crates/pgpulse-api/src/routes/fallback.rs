//! Catch-all for unmatched paths and unsupported methods.

use axum::{extract::State, http::Method, http::Uri, response::Response};
use pgpulse_common::error::ApiError;
use pgpulse_db::ConnectionPool;
use std::sync::Arc;

use crate::AppState;

pub async fn not_found<P: ConnectionPool>(
    State(state): State<Arc<AppState<P>>>,
    method: Method,
    uri: Uri,
) -> Response {
    tracing::debug!(%method, %uri, "No route");
    state.errors.respond(&ApiError::NotFound)
}
