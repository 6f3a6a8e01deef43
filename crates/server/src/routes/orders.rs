//! Order route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sandpiper_core::{OrderId, ProductId};

use crate::error::Result;
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::{Order, OrderItem, OrderWithOwner, PaymentConfirmation, ShippingAddress};
use crate::services::orders::{NewOrder, OrderService, shipping_rate};
use crate::state::AppState;

/// A checkout line item as sent by the client.
#[derive(Debug, Deserialize)]
pub struct OrderItemInput {
    pub product_id: ProductId,
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub price: Decimal,
    pub quantity: i64,
}

/// Shipping address as sent by the client.
#[derive(Debug, Deserialize)]
pub struct ShippingAddressInput {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Checkout payload.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemInput>,
    pub shipping_address: ShippingAddressInput,
    pub payment_method: String,
    pub items_price: Decimal,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
}

/// Gateway confirmation triple posted after the client-side payment
/// flow completes.
#[derive(Debug, Deserialize)]
pub struct PayRequest {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

/// Cart snapshot to quote shipping for. The address does not affect the
/// flat rate but is part of the quote request shape.
#[derive(Debug, Deserialize)]
pub struct ShippingRateRequest {
    pub items: Vec<OrderItemInput>,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddressInput>,
}

#[derive(Debug, Serialize)]
pub struct ShippingRateResponse {
    pub shipping_price: Decimal,
}

/// `POST /api/orders` - Create a new order.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let items = req
        .items
        .into_iter()
        .map(|item| OrderItem {
            product_id: item.product_id,
            name: item.name,
            image: item.image,
            unit_price: item.price,
            quantity: item.quantity,
        })
        .collect();

    let order = OrderService::new(state.pool(), state.gateway())
        .create(
            &user,
            NewOrder {
                items,
                shipping_address: ShippingAddress {
                    address: req.shipping_address.address,
                    city: req.shipping_address.city,
                    postal_code: req.shipping_address.postal_code,
                    country: req.shipping_address.country,
                },
                payment_method: req.payment_method,
                items_price: req.items_price,
                tax_price: req.tax_price,
                shipping_price: req.shipping_price,
                total_price: req.total_price,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /api/orders` - List every order with owner details (staff).
pub async fn list_all(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<OrderWithOwner>>> {
    let orders = OrderService::new(state.pool(), state.gateway())
        .list_all()
        .await?;
    Ok(Json(orders))
}

/// `GET /api/orders/mine` - List the caller's orders.
pub async fn list_mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderService::new(state.pool(), state.gateway())
        .list_mine(&user)
        .await?;
    Ok(Json(orders))
}

/// `GET /api/orders/{id}` - Get one order (owner or staff).
pub async fn get(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool(), state.gateway())
        .get_authorized(&user, id)
        .await?;
    Ok(Json(order))
}

/// `PUT /api/orders/{id}/pay` - Settle a verified payment.
pub async fn pay(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
    Json(req): Json<PayRequest>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool(), state.gateway())
        .pay(
            &user,
            id,
            PaymentConfirmation {
                gateway_order_id: req.gateway_order_id,
                gateway_payment_id: req.gateway_payment_id,
                signature: req.signature,
            },
        )
        .await?;
    Ok(Json(order))
}

/// `PUT /api/orders/{id}/ship` - Mark shipped (staff).
pub async fn ship(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool(), state.gateway())
        .ship(id)
        .await?;
    Ok(Json(order))
}

/// `PUT /api/orders/{id}/deliver` - Mark delivered (staff).
pub async fn deliver(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool(), state.gateway())
        .deliver(id)
        .await?;
    Ok(Json(order))
}

/// `PUT /api/orders/{id}/cancel` - Cancel an order (owner or staff).
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool(), state.gateway())
        .cancel(&user, id)
        .await?;
    Ok(Json(order))
}

/// `POST /api/orders/shipping-rate` - Quote the shipping charge for a
/// cart. The subtotal is summed from the posted line items.
pub async fn quote_shipping(
    RequireAuth(_user): RequireAuth,
    Json(req): Json<ShippingRateRequest>,
) -> Json<ShippingRateResponse> {
    let subtotal: Decimal = req
        .items
        .iter()
        .map(|item| item.price * Decimal::from(item.quantity))
        .sum();
    Json(ShippingRateResponse {
        shipping_price: shipping_rate(subtotal),
    })
}
