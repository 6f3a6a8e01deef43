//! Return eligibility and the return request lifecycle.
//!
//! Eligibility is a pure predicate over the order snapshot so it can be
//! tested without a database. The lifecycle itself is
//! `Requested -> {Approved -> [PickedUp] -> Completed} | Rejected`, with
//! `PickedUp` skippable; every transition dual-writes the denormalized
//! mirror on the order inside one transaction (see
//! [`crate::db::ReturnRepository`]).

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use sandpiper_core::{OrderId, ReturnRequestId, ReturnStatus, ReturnType};

use crate::db::{OrderRepository, ReturnRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::models::{CurrentUser, Order, ReturnRequest, ReturnWithOrderTotal};
use crate::services::shipping::ShippingClient;

/// Days after delivery during which a return may be requested.
const RETURN_WINDOW_DAYS: i64 = 7;

const SECONDS_PER_DAY: i64 = 86_400;

/// Days elapsed since delivery, rounded up so any fraction of a day
/// counts as a full one. The difference is taken as an absolute value:
/// a delivery timestamp slightly in the future (clock skew between
/// webhook source and server) reads as day one, not as a huge negative
/// that would pass the window forever.
fn days_since_delivery(delivered_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let elapsed = (now - delivered_at).num_seconds().abs();
    // Ceiling division; elapsed is non-negative after .abs().
    (elapsed + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
}

/// Check whether an order is eligible for a return request.
///
/// `owner_is_staff` refers to the order's owner, not the caller: staff
/// accounts place test orders, and those never enter the returns flow.
///
/// # Errors
///
/// Returns `AppError::Policy` for undelivered orders, staff-owned orders
/// and an exceeded return window, `AppError::Conflict` when a return
/// request already exists.
pub fn check_eligibility(order: &Order, owner_is_staff: bool, now: DateTime<Utc>) -> Result<()> {
    let Some(delivered_at) = order.delivered_at.filter(|_| order.is_delivered) else {
        return Err(AppError::Policy(
            "only delivered orders can be returned".to_owned(),
        ));
    };

    if order.return_request.is_some() {
        return Err(AppError::Conflict(
            "a return request already exists for this order".to_owned(),
        ));
    }

    if owner_is_staff {
        return Err(AppError::Policy(
            "staff orders are not eligible for return".to_owned(),
        ));
    }

    if days_since_delivery(delivered_at, now) > RETURN_WINDOW_DAYS {
        return Err(AppError::Policy(format!(
            "returns are only accepted within {RETURN_WINDOW_DAYS} days of delivery"
        )));
    }

    Ok(())
}

/// Return request lifecycle service.
pub struct ReturnService<'a> {
    pool: &'a SqlitePool,
    shipping: Option<&'a ShippingClient>,
}

impl<'a> ReturnService<'a> {
    /// Create a new return service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool, shipping: Option<&'a ShippingClient>) -> Self {
        Self { pool, shipping }
    }

    /// File a return request against a delivered order. The request
    /// always starts in `Requested`, whatever the client sent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown orders,
    /// `AppError::Forbidden` when the actor doesn't own the order, plus
    /// the eligibility errors of [`check_eligibility`].
    pub async fn create(
        &self,
        actor: &CurrentUser,
        order_id: OrderId,
        return_type: ReturnType,
        reason: String,
    ) -> Result<ReturnRequest> {
        let order = OrderRepository::new(self.pool)
            .get(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if order.user_id != actor.id {
            return Err(AppError::Forbidden(
                "only the order's owner can request a return".to_owned(),
            ));
        }

        check_eligibility(&order, actor.is_admin, Utc::now())?;

        let request = ReturnRequest {
            id: ReturnRequestId::new(),
            order_id,
            user_id: actor.id,
            return_type,
            reason,
            status: ReturnStatus::Requested,
            is_processed: false,
            processed_at: None,
            created_at: Utc::now(),
        };

        ReturnRepository::new(self.pool).create(&request).await?;
        tracing::info!(return_id = %request.id, order_id = %order_id, "return requested");
        Ok(request)
    }

    /// Advance a return request (staff action). `Approved` may jump
    /// straight to `Completed` when the courier pickup already happened
    /// out of band; completion stamps the request processed. Approval
    /// additionally books a reverse pickup with the shipping provider,
    /// best-effort.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown requests and
    /// `AppError::Conflict` for transitions the state machine forbids or
    /// that lose the concurrent-update race.
    pub async fn update_status(
        &self,
        id: ReturnRequestId,
        new_status: ReturnStatus,
        new_type: Option<ReturnType>,
    ) -> Result<ReturnRequest> {
        let returns = ReturnRepository::new(self.pool);
        let request = returns
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("return request {id} not found")))?;

        if !request.status.can_transition(new_status) {
            return Err(AppError::Conflict(format!(
                "return cannot move from {} to {}",
                request.status, new_status
            )));
        }

        let processed_at = (new_status == ReturnStatus::Completed).then(Utc::now);

        let updated = returns
            .update_status(id, request.order_id, request.status, new_status, new_type, processed_at)
            .await?;

        if new_status == ReturnStatus::Approved && request.status != ReturnStatus::Approved {
            self.book_reverse_pickup(&updated).await;
        }

        tracing::info!(
            return_id = %id,
            from = %request.status,
            to = %new_status,
            "return status updated"
        );
        Ok(updated)
    }

    /// Book the courier pickup for an approved return. Failures are
    /// logged and swallowed: the approval has already committed and staff
    /// can re-book manually.
    async fn book_reverse_pickup(&self, request: &ReturnRequest) {
        let Some(shipping) = self.shipping else {
            tracing::debug!(return_id = %request.id, "no shipping provider configured, pickup skipped");
            return;
        };

        let pickup = async {
            let order = OrderRepository::new(self.pool)
                .get(request.order_id)
                .await?
                .ok_or(crate::db::RepositoryError::NotFound)?;
            let owner = UserRepository::new(self.pool)
                .get(order.user_id)
                .await?
                .ok_or(crate::db::RepositoryError::NotFound)?;

            let pickup = shipping
                .create_return_order(order.id, &order.shipping_address, &owner.name, &order.items)
                .await
                .map_err(AppError::from)?;

            // Store the provider's reference so its scan events for the
            // reverse shipment match this order. A forward-shipment
            // reference, when present, stays authoritative.
            if order.shipment.provider_order_id.is_none() {
                OrderRepository::new(self.pool)
                    .set_provider_order_id(order.id, &pickup.order_id.to_string())
                    .await?;
            }
            Ok::<(), AppError>(())
        };

        if let Err(err) = pickup.await {
            tracing::warn!(return_id = %request.id, error = %err, "reverse pickup booking failed");
        }
    }

    /// List the actor's return requests, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Repository` if the query fails.
    pub async fn list_mine(&self, actor: &CurrentUser) -> Result<Vec<ReturnWithOrderTotal>> {
        Ok(ReturnRepository::new(self.pool)
            .list_for_user(actor.id)
            .await?)
    }

    /// List every return request (staff view).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Repository` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<ReturnWithOrderTotal>> {
        Ok(ReturnRepository::new(self.pool).list_all().await?)
    }
}
