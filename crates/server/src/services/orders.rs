//! Order lifecycle operations.
//!
//! Creation, payment settlement, fulfilment transitions and cancellation.
//! Every transition funnels through a conditional update in
//! [`OrderRepository`], so concurrent callers settle on exactly one
//! winner; the side effects here (stock movement, confirmation storage)
//! only run on the winning path.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use sandpiper_core::{OrderId, OrderStatus};

use crate::db::{OrderRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::models::{
    CurrentUser, Order, OrderItem, OrderWithOwner, PaymentConfirmation, ShipmentInfo,
    ShippingAddress,
};
use crate::services::payment::GatewayClient;

/// Flat-rate shipping: free at or above the threshold, a fixed fee below
/// it.
const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::ONE_THOUSAND;

/// Quote the shipping charge for an items subtotal.
#[must_use]
pub fn shipping_rate(items_subtotal: Decimal) -> Decimal {
    if items_subtotal >= FREE_SHIPPING_THRESHOLD {
        Decimal::ZERO
    } else {
        Decimal::from(50)
    }
}

/// Checkout input for a new order. The price breakdown is taken from the
/// client as-is; it is a display snapshot, not a server-side recompute.
pub struct NewOrder {
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub items_price: Decimal,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
}

/// Order lifecycle service.
pub struct OrderService<'a> {
    pool: &'a SqlitePool,
    gateway: &'a GatewayClient,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool, gateway: &'a GatewayClient) -> Self {
        Self { pool, gateway }
    }

    /// Load an order the actor is allowed to see (its owner, or staff).
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown ids and
    /// `AppError::Forbidden` when the actor is neither owner nor staff.
    pub async fn get_authorized(&self, actor: &CurrentUser, id: OrderId) -> Result<Order> {
        let order = OrderRepository::new(self.pool)
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

        if order.user_id != actor.id && !actor.is_admin {
            return Err(AppError::Forbidden(
                "you do not have access to this order".to_owned(),
            ));
        }
        Ok(order)
    }

    /// Create a new order in `Pending` state.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for an empty item list.
    pub async fn create(&self, actor: &CurrentUser, new: NewOrder) -> Result<Order> {
        if new.items.is_empty() {
            return Err(AppError::Validation(
                "order must contain at least one item".to_owned(),
            ));
        }

        let order = Order {
            id: OrderId::new(),
            user_id: actor.id,
            items: new.items,
            shipping_address: new.shipping_address,
            payment_method: new.payment_method,
            items_price: new.items_price,
            tax_price: new.tax_price,
            shipping_price: new.shipping_price,
            total_price: new.total_price,
            status: OrderStatus::Pending,
            is_paid: false,
            paid_at: None,
            payment: None,
            is_delivered: false,
            delivered_at: None,
            return_request: None,
            shipment: ShipmentInfo::default(),
            created_at: Utc::now(),
        };

        OrderRepository::new(self.pool).create(&order).await?;
        tracing::info!(order_id = %order.id, user_id = %order.user_id, "order created");
        Ok(order)
    }

    /// Settle a verified payment on an order.
    ///
    /// Verifies the gateway confirmation signature, then takes the
    /// paid-transition exactly once. Stock is decremented only on the
    /// winning call, per item and best-effort: a missing product is
    /// logged and skipped rather than unwinding an already-settled
    /// payment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` on signature mismatch,
    /// `AppError::Conflict` when the order is cancelled,
    /// `AppError::NotFound` / `AppError::Forbidden` from the
    /// authorization step.
    #[tracing::instrument(skip_all, fields(order_id = %id))]
    pub async fn pay(
        &self,
        actor: &CurrentUser,
        id: OrderId,
        confirmation: PaymentConfirmation,
    ) -> Result<Order> {
        let order = self.get_authorized(actor, id).await?;

        if order.status == OrderStatus::Cancelled {
            return Err(AppError::Conflict(
                "a cancelled order cannot be paid".to_owned(),
            ));
        }

        if !self.gateway.verify(
            &confirmation.gateway_order_id,
            &confirmation.gateway_payment_id,
            &confirmation.signature,
        ) {
            return Err(AppError::Validation(
                "payment signature verification failed".to_owned(),
            ));
        }

        let orders = OrderRepository::new(self.pool);
        let won = orders.mark_paid(id, &confirmation, Utc::now()).await?;

        if won {
            let products = ProductRepository::new(self.pool);
            for item in &order.items {
                if let Err(err) = products.decrement_stock(item.product_id, item.quantity).await {
                    tracing::warn!(
                        order_id = %id,
                        product_id = %item.product_id,
                        error = %err,
                        "stock decrement skipped"
                    );
                }
            }
            tracing::info!(order_id = %id, "order paid");
        } else {
            tracing::debug!(order_id = %id, "duplicate payment confirmation ignored");
        }

        let settled = orders
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

        // A lost transition on a still-unpaid order means a cancel
        // committed between the authorization read and the update.
        if !settled.is_paid {
            return Err(AppError::Conflict(
                "a cancelled order cannot be paid".to_owned(),
            ));
        }

        Ok(settled)
    }

    /// Mark an order shipped (staff fulfilment action).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` when the order is delivered or
    /// cancelled, `AppError::NotFound` for unknown ids.
    pub async fn ship(&self, id: OrderId) -> Result<Order> {
        let orders = OrderRepository::new(self.pool);
        let order = orders
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

        if !orders.mark_shipped(id).await? {
            return Err(AppError::Conflict(format!(
                "order in state {} cannot be shipped",
                order.status
            )));
        }

        orders
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))
    }

    /// Mark an order delivered (staff fulfilment action). Requires the
    /// order to be paid; re-delivering an already delivered order is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Policy` for unpaid orders, `AppError::Conflict`
    /// for cancelled ones, `AppError::NotFound` for unknown ids.
    pub async fn deliver(&self, id: OrderId) -> Result<Order> {
        let orders = OrderRepository::new(self.pool);
        let order = orders
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

        if !order.is_paid {
            return Err(AppError::Policy(
                "an unpaid order cannot be marked delivered".to_owned(),
            ));
        }
        if order.status == OrderStatus::Cancelled {
            return Err(AppError::Conflict(
                "a cancelled order cannot be delivered".to_owned(),
            ));
        }

        if orders.mark_delivered(id, Utc::now()).await? {
            tracing::info!(order_id = %id, "order delivered");
        }

        orders
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))
    }

    /// Cancel an order. Only reachable from `Pending` or `Processing`;
    /// re-cancelling a cancelled order is a no-op. If payment had already
    /// settled, the stock taken at settlement is restored, best-effort.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` once the order has shipped or been
    /// delivered, plus the authorization errors of
    /// [`Self::get_authorized`].
    pub async fn cancel(&self, actor: &CurrentUser, id: OrderId) -> Result<Order> {
        let order = self.get_authorized(actor, id).await?;
        let orders = OrderRepository::new(self.pool);

        if !orders.cancel(id).await? {
            if order.status == OrderStatus::Cancelled {
                // Re-cancelling is a no-op.
                return Ok(order);
            }
            return Err(AppError::Conflict(format!(
                "order in state {} can no longer be cancelled",
                order.status
            )));
        }

        // The paid flag is re-read after the cancel committed: a payment
        // settling between the authorization read and the update would
        // otherwise leave its stock decrement unrestored.
        let cancelled = orders
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

        if cancelled.is_paid {
            let products = ProductRepository::new(self.pool);
            for item in &cancelled.items {
                if let Err(err) = products.increment_stock(item.product_id, item.quantity).await {
                    tracing::warn!(
                        order_id = %id,
                        product_id = %item.product_id,
                        error = %err,
                        "stock restore skipped"
                    );
                }
            }
        }
        tracing::info!(order_id = %id, "order cancelled");

        Ok(cancelled)
    }

    /// List the actor's own orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Repository` if the query fails.
    pub async fn list_mine(&self, actor: &CurrentUser) -> Result<Vec<Order>> {
        Ok(OrderRepository::new(self.pool)
            .list_for_user(actor.id)
            .await?)
    }

    /// List every order with its owner summary (staff view).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Repository` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<OrderWithOwner>> {
        Ok(OrderRepository::new(self.pool).list_all().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipping_free_at_threshold() {
        assert_eq!(shipping_rate(Decimal::from(1000)), Decimal::ZERO);
        assert_eq!(shipping_rate(Decimal::new(100_001, 2)), Decimal::ZERO);
        assert_eq!(shipping_rate(Decimal::from(5000)), Decimal::ZERO);
    }

    #[test]
    fn test_shipping_flat_below_threshold() {
        let flat = Decimal::from(50);
        assert_eq!(shipping_rate(Decimal::new(99_999, 2)), flat);
        assert_eq!(shipping_rate(Decimal::ONE), flat);
        assert_eq!(shipping_rate(Decimal::ZERO), flat);
    }
}
