//! # pgpulse-api
//!
//! HTTP layer: the database status endpoint plus the generic 404 and panic
//! fallbacks. Handlers are generic over [`ConnectionPool`] so the router can be
//! driven by a fake pool in tests.

pub mod middleware;
pub mod routes;

use axum::Router;
use pgpulse_common::config::DeploymentMode;
use pgpulse_common::error::ErrorResponder;
use pgpulse_db::ConnectionPool;
use std::sync::Arc;

/// Shared application state available to all route handlers.
pub struct AppState<P> {
    /// The one pool for the life of the process.
    pub pool: P,
    pub errors: ErrorResponder,
}

impl<P: ConnectionPool> AppState<P> {
    pub fn new(pool: P, mode: DeploymentMode) -> Self {
        Self {
            pool,
            errors: ErrorResponder::new(mode),
        }
    }
}

/// Build the complete router with all routes and middleware.
pub fn build_router<P: ConnectionPool>(state: AppState<P>) -> Router {
    let errors = state.errors;

    Router::new()
        .merge(routes::status::router::<P>())
        .fallback(routes::fallback::not_found::<P>)
        .method_not_allowed_fallback(routes::fallback::not_found::<P>)
        .layer(tower_http::catch_panic::CatchPanicLayer::custom(
            middleware::PanicResponder::new(errors),
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
