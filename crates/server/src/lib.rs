//! Sandpiper order and return lifecycle engine, as a library.
//!
//! Exposes the server's modules so integration tests can build the
//! router and repositories against an in-memory database.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the full application router.
#[must_use]
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/health/ready", get(routes::ready))
        .nest("/api/orders", routes::order_routes())
        .nest("/api/returns", routes::return_routes())
        .nest("/api/payment", routes::payment_routes())
        .nest("/api/webhooks", routes::webhook_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
