//! Order aggregate domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use sandpiper_core::{OrderId, OrderStatus, ProductId, ReturnStatus, ReturnType, UserId};

/// A single product reference plus quantity and price snapshot inside an
/// order. Name, image and unit price are snapshots taken at checkout so
/// later catalog edits do not rewrite order history.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub image: String,
    pub unit_price: Decimal,
    pub quantity: i64,
}

impl OrderItem {
    /// Line subtotal (unit price x quantity).
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Shipping address snapshot taken at checkout.
#[derive(Debug, Clone, Serialize)]
pub struct ShippingAddress {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// The payment gateway's confirmation triple, stored once verified.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentConfirmation {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

/// Denormalized mirror of the order's return request, kept on the order
/// for fast reads. Updated in the same transaction as the return request
/// itself.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnMirror {
    pub is_returned: bool,
    pub return_type: ReturnType,
    pub reason: String,
    pub status: ReturnStatus,
}

/// Denormalized mirror of the shipping provider's view of this order,
/// written by the shipment webhook.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShipmentInfo {
    /// The provider-side order reference, used to match inbound webhooks.
    pub provider_order_id: Option<String>,
    pub shipment_id: Option<String>,
    pub awb_code: Option<String>,
    pub tracking_link: Option<String>,
    pub courier_name: Option<String>,
    /// Courier status text, stored verbatim (only the "delivered" and
    /// "shipped" sentinels drive the order's own status).
    pub shipment_status: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// The order aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub items_price: Decimal,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment: Option<PaymentConfirmation>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub return_request: Option<ReturnMirror>,
    pub shipment: ShipmentInfo,
    pub created_at: DateTime<Utc>,
}

/// Owner name/email summary, populated on the privileged all-orders
/// listing.
#[derive(Debug, Clone, Serialize)]
pub struct OwnerSummary {
    pub name: String,
    pub email: String,
}

/// An order together with its owner summary (staff read model).
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithOwner {
    #[serde(flatten)]
    pub order: Order,
    pub owner: OwnerSummary,
}
