//! Inbound shipment webhook projection.
//!
//! The shipping provider posts courier scan events keyed by its own
//! order reference. Events are matched to an order (provider reference
//! first, raw internal id as a fallback), the courier's status text is
//! mirrored verbatim onto the order, and only two case-insensitive
//! sentinel values drive the order's own lifecycle: "delivered" and
//! "shipped". Everything is idempotent; a replayed event re-stamps the
//! mirror but never re-fires a lifecycle transition, and a late
//! "shipped" never regresses a delivered order.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;

use sandpiper_core::{ID_TEXT_LEN, OrderId};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::models::Order;

/// A shipment scan event as posted by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ShipmentEvent {
    /// Provider-side order reference; occasionally the provider echoes
    /// back our own order id instead.
    pub order_id: String,
    /// Courier status text, stored verbatim.
    pub current_status: String,
    #[serde(default)]
    pub awb: Option<String>,
    #[serde(default)]
    pub courier_name: Option<String>,
    #[serde(default)]
    pub shipment_id: Option<String>,
    #[serde(default)]
    pub current_timestamp: Option<DateTime<Utc>>,
}

/// Shipment webhook sync service.
pub struct ShipmentSync<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ShipmentSync<'a> {
    /// Create a new shipment sync service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Resolve the event's order reference. The provider reference is
    /// authoritative; the fallback only fires for values shaped like one
    /// of our own ids, so provider references can never be misread as
    /// internal ones.
    async fn resolve_order(&self, reference: &str) -> Result<Order> {
        let orders = OrderRepository::new(self.pool);

        if let Some(order) = orders.find_by_provider_ref(reference).await? {
            return Ok(order);
        }

        if reference.len() == ID_TEXT_LEN
            && let Ok(id) = OrderId::parse_str(reference)
            && let Some(order) = orders.get(id).await?
        {
            return Ok(order);
        }

        Err(AppError::NotFound(format!(
            "no order matches shipment reference {reference}"
        )))
    }

    /// Apply one shipment event.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for a blank status,
    /// `AppError::NotFound` when no order matches the reference.
    #[tracing::instrument(skip_all, fields(reference = %event.order_id, status = %event.current_status))]
    pub async fn apply(&self, event: &ShipmentEvent) -> Result<()> {
        let status_text = event.current_status.trim();
        if status_text.is_empty() {
            return Err(AppError::Validation(
                "shipment event is missing a status".to_owned(),
            ));
        }

        let order = self.resolve_order(&event.order_id).await?;
        let orders = OrderRepository::new(self.pool);
        let event_time = event.current_timestamp.unwrap_or_else(Utc::now);

        orders
            .record_shipment_event(
                order.id,
                status_text,
                event.awb.as_deref(),
                event.shipment_id.as_deref(),
                event.courier_name.as_deref(),
                event_time,
            )
            .await?;

        match status_text.to_lowercase().as_str() {
            "delivered" => {
                if !order.is_paid {
                    tracing::warn!(
                        order_id = %order.id,
                        "delivery reported for an unpaid order"
                    );
                }
                if orders.webhook_delivered(order.id, event_time).await? {
                    tracing::info!(order_id = %order.id, "order delivered via shipment event");
                }
            }
            "shipped" => {
                if orders.webhook_shipped(order.id).await? {
                    tracing::info!(order_id = %order.id, "order shipped via shipment event");
                }
            }
            // Any other courier status is mirror-only.
            _ => {}
        }

        Ok(())
    }
}
