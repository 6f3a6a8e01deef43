//! Payment gateway route handlers.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::payment::GatewayOrder;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentOrderRequest {
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PublicKeyResponse {
    pub key_id: String,
}

/// `POST /api/payment/orders` - Create a gateway payment intent for the
/// given amount (major units; converted to minor units upstream).
pub async fn create_order(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Json(req): Json<CreatePaymentOrderRequest>,
) -> Result<Json<GatewayOrder>> {
    let order = state.gateway().create_order(req.amount).await?;
    Ok(Json(order))
}

/// `GET /api/payment/key` - Expose the publishable key id the client
/// embeds in its checkout widget. No auth: the key id is client-facing;
/// the signing secret never leaves the server.
pub async fn public_key(State(state): State<AppState>) -> Json<PublicKeyResponse> {
    Json(PublicKeyResponse {
        key_id: state.gateway().key_id().to_owned(),
    })
}
