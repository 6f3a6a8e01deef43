//! Return request domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use sandpiper_core::{OrderId, ReturnRequestId, ReturnStatus, ReturnType, UserId};

/// A return or replacement request, tied 1:1 to a delivered order.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnRequest {
    pub id: ReturnRequestId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub return_type: ReturnType,
    pub reason: String,
    pub status: ReturnStatus,
    pub is_processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A return request enriched with the parent order's total (listing read
/// model).
#[derive(Debug, Clone, Serialize)]
pub struct ReturnWithOrderTotal {
    #[serde(flatten)]
    pub request: ReturnRequest,
    pub order_total: Decimal,
}
