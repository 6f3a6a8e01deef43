//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                      - Liveness check
//! GET  /health/ready                - Readiness check (database ping)
//!
//! # Orders
//! POST /api/orders                  - Create order
//! GET  /api/orders                  - List all orders (staff)
//! GET  /api/orders/mine             - List own orders
//! GET  /api/orders/{id}             - Get order (owner or staff)
//! PUT  /api/orders/{id}/pay         - Settle verified payment
//! PUT  /api/orders/{id}/ship        - Mark shipped (staff)
//! PUT  /api/orders/{id}/deliver     - Mark delivered (staff)
//! PUT  /api/orders/{id}/cancel      - Cancel order (owner or staff)
//! POST /api/orders/shipping-rate    - Quote shipping for a subtotal
//!
//! # Returns
//! POST /api/returns                 - File return request
//! GET  /api/returns                 - List all return requests (staff)
//! GET  /api/returns/mine            - List own return requests
//! PUT  /api/returns/{id}            - Advance return request (staff)
//!
//! # Payment
//! POST /api/payment/orders          - Create gateway payment intent
//! GET  /api/payment/key             - Publishable gateway key
//!
//! # Webhooks
//! POST /api/webhooks/shipping       - Courier scan events (unauthenticated)
//! ```

pub mod orders;
pub mod payment;
pub mod returns;
pub mod webhooks;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};

use crate::state::AppState;

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(orders::create).get(orders::list_all))
        .route("/mine", get(orders::list_mine))
        .route("/shipping-rate", post(orders::quote_shipping))
        .route("/{id}", get(orders::get))
        .route("/{id}/pay", put(orders::pay))
        .route("/{id}/ship", put(orders::ship))
        .route("/{id}/deliver", put(orders::deliver))
        .route("/{id}/cancel", put(orders::cancel))
}

/// Create the return routes router.
pub fn return_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(returns::create).get(returns::list_all))
        .route("/mine", get(returns::list_mine))
        .route("/{id}", put(returns::update))
}

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(payment::create_order))
        .route("/key", get(payment::public_key))
}

/// Create the webhook routes router.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/shipping", post(webhooks::shipping))
}

/// `GET /health` - Liveness check.
pub async fn health() -> &'static str {
    "ok"
}

/// `GET /health/ready` - Readiness check: verifies the database answers.
pub async fn ready(State(state): State<AppState>) -> Result<&'static str, StatusCode> {
    sqlx::query("SELECT 1")
        .execute(state.pool())
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        })?;
    Ok("ok")
}
