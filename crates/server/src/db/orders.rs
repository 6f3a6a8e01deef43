//! Order aggregate repository.
//!
//! The order lifecycle guards live here as conditional updates: marking
//! paid, delivering, cancelling and the webhook projections are all
//! `UPDATE ... WHERE <state guard>` statements whose `rows_affected`
//! tells the caller whether it won the transition. Two concurrent
//! `mark_paid` calls therefore settle on exactly one winner, which is what
//! keeps the stock decrement exactly-once.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use sandpiper_core::{OrderId, OrderStatus, ProductId, ReturnStatus, ReturnType, UserId};

use super::RepositoryError;
use crate::models::{
    Order, OrderItem, OrderWithOwner, OwnerSummary, PaymentConfirmation, ReturnMirror,
    ShipmentInfo, ShippingAddress,
};

const ORDER_COLUMNS: &str = "id, user_id, shipping_address, shipping_city, shipping_postal_code, \
     shipping_country, payment_method, items_price, tax_price, shipping_price, total_price, \
     status, is_paid, paid_at, gateway_order_id, gateway_payment_id, gateway_signature, \
     is_delivered, delivered_at, return_requested, return_type, return_reason, return_status, \
     provider_order_id, shipment_id, awb_code, tracking_link, courier_name, shipment_status, \
     shipment_updated_at, created_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    user_id: String,
    shipping_address: String,
    shipping_city: String,
    shipping_postal_code: String,
    shipping_country: String,
    payment_method: String,
    items_price: String,
    tax_price: String,
    shipping_price: String,
    total_price: String,
    status: String,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    gateway_signature: Option<String>,
    is_delivered: bool,
    delivered_at: Option<DateTime<Utc>>,
    return_requested: bool,
    return_type: Option<String>,
    return_reason: Option<String>,
    return_status: Option<String>,
    provider_order_id: Option<String>,
    shipment_id: Option<String>,
    awb_code: Option<String>,
    tracking_link: Option<String>,
    courier_name: Option<String>,
    shipment_status: Option<String>,
    shipment_updated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    product_id: String,
    name: String,
    image: String,
    unit_price: String,
    quantity: i64,
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::DataCorruption(format!("invalid {what} in database: {err}"))
}

impl ItemRow {
    fn into_domain(self) -> Result<OrderItem, RepositoryError> {
        Ok(OrderItem {
            product_id: ProductId::parse_str(&self.product_id)
                .map_err(|e| corrupt("product id", e))?,
            name: self.name,
            image: self.image,
            unit_price: Decimal::from_str(&self.unit_price)
                .map_err(|e| corrupt("unit price", e))?,
            quantity: self.quantity,
        })
    }
}

impl OrderRow {
    fn into_domain(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let return_request = if self.return_requested {
            let return_type = self
                .return_type
                .as_deref()
                .ok_or_else(|| corrupt("return mirror", "missing type"))?;
            let status = self
                .return_status
                .as_deref()
                .ok_or_else(|| corrupt("return mirror", "missing status"))?;
            Some(ReturnMirror {
                is_returned: true,
                return_type: ReturnType::from_str(return_type)
                    .map_err(|e| corrupt("return type", e))?,
                reason: self.return_reason.unwrap_or_default(),
                status: ReturnStatus::from_str(status).map_err(|e| corrupt("return status", e))?,
            })
        } else {
            None
        };

        let payment = match (self.gateway_order_id, self.gateway_payment_id) {
            (Some(gateway_order_id), Some(gateway_payment_id)) => Some(PaymentConfirmation {
                gateway_order_id,
                gateway_payment_id,
                signature: self.gateway_signature.unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(Order {
            id: OrderId::parse_str(&self.id).map_err(|e| corrupt("order id", e))?,
            user_id: UserId::parse_str(&self.user_id).map_err(|e| corrupt("user id", e))?,
            items,
            shipping_address: ShippingAddress {
                address: self.shipping_address,
                city: self.shipping_city,
                postal_code: self.shipping_postal_code,
                country: self.shipping_country,
            },
            payment_method: self.payment_method,
            items_price: Decimal::from_str(&self.items_price)
                .map_err(|e| corrupt("items price", e))?,
            tax_price: Decimal::from_str(&self.tax_price).map_err(|e| corrupt("tax price", e))?,
            shipping_price: Decimal::from_str(&self.shipping_price)
                .map_err(|e| corrupt("shipping price", e))?,
            total_price: Decimal::from_str(&self.total_price)
                .map_err(|e| corrupt("total price", e))?,
            status: OrderStatus::from_str(&self.status).map_err(|e| corrupt("order status", e))?,
            is_paid: self.is_paid,
            paid_at: self.paid_at,
            payment,
            is_delivered: self.is_delivered,
            delivered_at: self.delivered_at,
            return_request,
            shipment: ShipmentInfo {
                provider_order_id: self.provider_order_id,
                shipment_id: self.shipment_id,
                awb_code: self.awb_code,
                tracking_link: self.tracking_link,
                courier_name: self.courier_name,
                shipment_status: self.shipment_status,
                last_updated: self.shipment_updated_at,
            },
            created_at: self.created_at,
        })
    }
}

/// Repository for order aggregate operations.
pub struct OrderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a freshly created order and its line items in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert fails.
    pub async fn create(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO orders (
                id, user_id, shipping_address, shipping_city, shipping_postal_code,
                shipping_country, payment_method, items_price, tax_price, shipping_price,
                total_price, status, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(order.id.to_string())
        .bind(order.user_id.to_string())
        .bind(&order.shipping_address.address)
        .bind(&order.shipping_address.city)
        .bind(&order.shipping_address.postal_code)
        .bind(&order.shipping_address.country)
        .bind(&order.payment_method)
        .bind(order.items_price.to_string())
        .bind(order.tax_price.to_string())
        .bind(order.shipping_price.to_string())
        .bind(order.total_price.to_string())
        .bind(order.status.to_string())
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                r"
                INSERT INTO order_items (order_id, product_id, name, image, unit_price, quantity)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(order.id.to_string())
            .bind(item.product_id.to_string())
            .bind(&item.name)
            .bind(&item.image)
            .bind(item.unit_price.to_string())
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn items_for(&self, order_id: &str) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r"
            SELECT product_id, name, image, unit_price, quantity
            FROM order_items
            WHERE order_id = ?
            ORDER BY id ASC
            ",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(ItemRow::into_domain).collect()
    }

    /// Get an order by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails,
    /// `RepositoryError::DataCorruption` if stored data is invalid.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(r) => {
                let items = self.items_for(&r.id).await?;
                Ok(Some(r.into_domain(items)?))
            }
            None => Ok(None),
        }
    }

    /// Find an order by the shipping provider's order reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails,
    /// `RepositoryError::DataCorruption` if stored data is invalid.
    pub async fn find_by_provider_ref(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE provider_order_id = ?"
        ))
        .bind(provider_order_id)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(r) => {
                let items = self.items_for(&r.id).await?;
                Ok(Some(r.into_domain(items)?))
            }
            None => Ok(None),
        }
    }

    /// List a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails,
    /// `RepositoryError::DataCorruption` if stored data is invalid.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ? ORDER BY created_at DESC"
        ))
        .bind(user_id.to_string())
        .fetch_all(self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.items_for(&row.id).await?;
            orders.push(row.into_domain(items)?);
        }
        Ok(orders)
    }

    /// List every order with its owner summary (staff read model).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails,
    /// `RepositoryError::DataCorruption` if stored data is invalid.
    pub async fn list_all(&self) -> Result<Vec<OrderWithOwner>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            order: OrderRow,
            owner_name: String,
            owner_email: String,
        }

        let rows = sqlx::query_as::<_, Row>(&format!(
            "SELECT {prefixed}, u.name AS owner_name, u.email AS owner_email \
             FROM orders o JOIN users u ON u.id = o.user_id \
             ORDER BY o.created_at DESC",
            prefixed = ORDER_COLUMNS
                .split(", ")
                .map(|c| format!("o.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        ))
        .fetch_all(self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.items_for(&row.order.id).await?;
            orders.push(OrderWithOwner {
                order: row.order.into_domain(items)?,
                owner: OwnerSummary {
                    name: row.owner_name,
                    email: row.owner_email,
                },
            });
        }
        Ok(orders)
    }

    /// Atomically mark an order paid and store the gateway confirmation.
    ///
    /// Returns `true` if this call won the transition, `false` if the
    /// order was already paid or has been cancelled (the caller must then
    /// skip all payment side effects). The cancelled guard lives inside
    /// the conditional update: a cancel committing after the caller's
    /// pre-read must not be reverted to `processing` here.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_paid(
        &self,
        id: OrderId,
        confirmation: &PaymentConfirmation,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE orders
            SET is_paid = 1,
                paid_at = ?,
                status = ?,
                gateway_order_id = ?,
                gateway_payment_id = ?,
                gateway_signature = ?
            WHERE id = ? AND is_paid = 0 AND status != 'cancelled'
            ",
        )
        .bind(paid_at)
        .bind(OrderStatus::Processing.to_string())
        .bind(&confirmation.gateway_order_id)
        .bind(&confirmation.gateway_payment_id)
        .bind(&confirmation.signature)
        .bind(id.to_string())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark an order shipped. Idempotent re-invocation from Shipped is a
    /// no-op re-confirmation; delivered or cancelled orders are left
    /// untouched (`false`).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_shipped(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE orders
            SET status = ?
            WHERE id = ? AND is_delivered = 0 AND status IN ('pending', 'processing', 'shipped')
            ",
        )
        .bind(OrderStatus::Shipped.to_string())
        .bind(id.to_string())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Atomically mark an order delivered. Returns `false` if it already
    /// was (idempotent).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_delivered(
        &self,
        id: OrderId,
        delivered_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE orders
            SET is_delivered = 1, delivered_at = ?, status = ?
            WHERE id = ? AND is_delivered = 0 AND status != 'cancelled'
            ",
        )
        .bind(delivered_at)
        .bind(OrderStatus::Delivered.to_string())
        .bind(id.to_string())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Atomically cancel an order. Cancellation is only reachable from the
    /// early states; returns `false` once the order has shipped, been
    /// delivered, or is already cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn cancel(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE orders
            SET status = ?
            WHERE id = ? AND status IN ('pending', 'processing')
            ",
        )
        .bind(OrderStatus::Cancelled.to_string())
        .bind(id.to_string())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record the shipping provider's order reference once the order is
    /// registered with the provider (webhooks are matched against it).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist,
    /// `RepositoryError::Database` for other database errors.
    pub async fn set_provider_order_id(
        &self,
        id: OrderId,
        provider_order_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE orders SET provider_order_id = ? WHERE id = ?")
            .bind(provider_order_id)
            .bind(id.to_string())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Project a shipment event onto the order's shipping mirror.
    ///
    /// The status text is stored verbatim; awb, shipment id and courier
    /// name only overwrite the stored value when the incoming one is
    /// non-empty, so a blank retry never clobbers known data.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist,
    /// `RepositoryError::Database` for other database errors.
    pub async fn record_shipment_event(
        &self,
        id: OrderId,
        status_text: &str,
        awb_code: Option<&str>,
        shipment_id: Option<&str>,
        courier_name: Option<&str>,
        event_time: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE orders
            SET shipment_status = ?1,
                shipment_updated_at = ?2,
                awb_code = CASE WHEN ?3 IS NULL OR ?3 = '' THEN awb_code ELSE ?3 END,
                shipment_id = CASE WHEN ?4 IS NULL OR ?4 = '' THEN shipment_id ELSE ?4 END,
                courier_name = CASE WHEN ?5 IS NULL OR ?5 = '' THEN courier_name ELSE ?5 END
            WHERE id = ?6
            ",
        )
        .bind(status_text)
        .bind(event_time)
        .bind(awb_code)
        .bind(shipment_id)
        .bind(courier_name)
        .bind(id.to_string())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Webhook projection: mark delivered exactly once. A repeat
    /// "delivered" event is a no-op here (the mirror re-stamp has already
    /// happened in [`Self::record_shipment_event`]).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn webhook_delivered(
        &self,
        id: OrderId,
        delivered_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        self.mark_delivered(id, delivered_at).await
    }

    /// Webhook projection: move to Shipped, never regressing a delivered
    /// order (out-of-order "shipped" after "delivered" must not undo
    /// delivery).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn webhook_shipped(&self, id: OrderId) -> Result<bool, RepositoryError> {
        self.mark_shipped(id).await
    }
}
