//! Inbound webhook route handlers.

use axum::{Json, extract::State, http::StatusCode};

use crate::error::Result;
use crate::services::shipment_sync::{ShipmentEvent, ShipmentSync};
use crate::state::AppState;

/// `POST /api/webhooks/shipping` - Apply a courier scan event.
///
/// The provider offers no signing scheme for these callbacks, so the
/// route is unauthenticated; it only mirrors courier data and replays
/// are harmless. See DESIGN.md.
pub async fn shipping(
    State(state): State<AppState>,
    Json(event): Json<ShipmentEvent>,
) -> Result<StatusCode> {
    ShipmentSync::new(state.pool()).apply(&event).await?;
    Ok(StatusCode::OK)
}
