//! Return request repository.
//!
//! Every write here is a unit of work over two tables: the return request
//! row and the denormalized mirror on the parent order. Both live in one
//! SQLite transaction so the caller never observes a return whose order
//! mirror is stale.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use sandpiper_core::{OrderId, ReturnRequestId, ReturnStatus, ReturnType, UserId};

use super::RepositoryError;
use crate::models::{ReturnRequest, ReturnWithOrderTotal};

const RETURN_COLUMNS: &str =
    "id, order_id, user_id, return_type, reason, status, is_processed, processed_at, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ReturnRow {
    id: String,
    order_id: String,
    user_id: String,
    return_type: String,
    reason: String,
    status: String,
    is_processed: bool,
    processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::DataCorruption(format!("invalid {what} in database: {err}"))
}

impl ReturnRow {
    fn into_domain(self) -> Result<ReturnRequest, RepositoryError> {
        Ok(ReturnRequest {
            id: ReturnRequestId::parse_str(&self.id).map_err(|e| corrupt("return id", e))?,
            order_id: OrderId::parse_str(&self.order_id).map_err(|e| corrupt("order id", e))?,
            user_id: UserId::parse_str(&self.user_id).map_err(|e| corrupt("user id", e))?,
            return_type: ReturnType::from_str(&self.return_type)
                .map_err(|e| corrupt("return type", e))?,
            reason: self.reason,
            status: ReturnStatus::from_str(&self.status)
                .map_err(|e| corrupt("return status", e))?,
            is_processed: self.is_processed,
            processed_at: self.processed_at,
            created_at: self.created_at,
        })
    }
}

/// Repository for return request operations.
pub struct ReturnRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ReturnRepository<'a> {
    /// Create a new return repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a return request and write the order mirror in one
    /// transaction.
    ///
    /// The `UNIQUE(order_id)` constraint resolves duplicate-create races:
    /// whichever insert commits second gets `Conflict`, regardless of
    /// request ordering.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a return already exists for
    /// the order, `RepositoryError::Database` for other database errors.
    pub async fn create(&self, request: &ReturnRequest) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO return_requests
                (id, order_id, user_id, return_type, reason, status, is_processed, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, ?)
            ",
        )
        .bind(request.id.to_string())
        .bind(request.order_id.to_string())
        .bind(request.user_id.to_string())
        .bind(request.return_type.to_string())
        .bind(&request.reason)
        .bind(request.status.to_string())
        .bind(request.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict(
                    "a return request already exists for this order".to_owned(),
                );
            }
            RepositoryError::Database(e)
        })?;

        sqlx::query(
            r"
            UPDATE orders
            SET return_requested = 1, return_type = ?, return_reason = ?, return_status = ?
            WHERE id = ?
            ",
        )
        .bind(request.return_type.to_string())
        .bind(&request.reason)
        .bind(request.status.to_string())
        .bind(request.order_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Get a return request by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails,
    /// `RepositoryError::DataCorruption` if stored data is invalid.
    pub async fn get(&self, id: ReturnRequestId) -> Result<Option<ReturnRequest>, RepositoryError> {
        let row = sqlx::query_as::<_, ReturnRow>(&format!(
            "SELECT {RETURN_COLUMNS} FROM return_requests WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await?;

        row.map(ReturnRow::into_domain).transpose()
    }

    /// Get the return request for an order, if any (at most one exists).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails,
    /// `RepositoryError::DataCorruption` if stored data is invalid.
    pub async fn find_by_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<ReturnRequest>, RepositoryError> {
        let row = sqlx::query_as::<_, ReturnRow>(&format!(
            "SELECT {RETURN_COLUMNS} FROM return_requests WHERE order_id = ?"
        ))
        .bind(order_id.to_string())
        .fetch_optional(self.pool)
        .await?;

        row.map(ReturnRow::into_domain).transpose()
    }

    /// Advance a return request and synchronize the order mirror, as one
    /// transaction.
    ///
    /// The update is guarded on the status the caller validated against
    /// (`expected_from`); a concurrent staff update that got there first
    /// surfaces as `Conflict` rather than a silently lost transition.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the request changed
    /// concurrently, `RepositoryError::NotFound` if it vanished,
    /// `RepositoryError::Database` for other database errors.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_status(
        &self,
        id: ReturnRequestId,
        order_id: OrderId,
        expected_from: ReturnStatus,
        new_status: ReturnStatus,
        new_type: Option<ReturnType>,
        processed_at: Option<DateTime<Utc>>,
    ) -> Result<ReturnRequest, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE return_requests
            SET status = ?,
                return_type = COALESCE(?, return_type),
                is_processed = CASE WHEN ? IS NULL THEN is_processed ELSE 1 END,
                processed_at = COALESCE(processed_at, ?)
            WHERE id = ? AND status = ?
            ",
        )
        .bind(new_status.to_string())
        .bind(new_type.map(|t| t.to_string()))
        .bind(processed_at)
        .bind(processed_at)
        .bind(id.to_string())
        .bind(expected_from.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(
                "return request was updated concurrently".to_owned(),
            ));
        }

        sqlx::query(
            r"
            UPDATE orders
            SET return_status = ?, return_type = COALESCE(?, return_type)
            WHERE id = ?
            ",
        )
        .bind(new_status.to_string())
        .bind(new_type.map(|t| t.to_string()))
        .bind(order_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// List a user's return requests with parent order totals, newest
    /// first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails,
    /// `RepositoryError::DataCorruption` if stored data is invalid.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ReturnWithOrderTotal>, RepositoryError> {
        self.list_where("WHERE r.user_id = ?", Some(user_id)).await
    }

    /// List every return request with parent order totals (staff read
    /// model).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails,
    /// `RepositoryError::DataCorruption` if stored data is invalid.
    pub async fn list_all(&self) -> Result<Vec<ReturnWithOrderTotal>, RepositoryError> {
        self.list_where("", None).await
    }

    async fn list_where(
        &self,
        filter: &str,
        user_id: Option<UserId>,
    ) -> Result<Vec<ReturnWithOrderTotal>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            request: ReturnRow,
            order_total: String,
        }

        let prefixed = RETURN_COLUMNS
            .split(", ")
            .map(|c| format!("r.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {prefixed}, o.total_price AS order_total \
             FROM return_requests r JOIN orders o ON o.id = r.order_id \
             {filter} ORDER BY r.created_at DESC"
        );

        let mut query = sqlx::query_as::<_, Row>(&sql);
        if let Some(user_id) = user_id {
            query = query.bind(user_id.to_string());
        }
        let rows = query.fetch_all(self.pool).await?;

        rows.into_iter()
            .map(|row| {
                let order_total = Decimal::from_str(&row.order_total)
                    .map_err(|e| corrupt("order total", e))?;
                Ok(ReturnWithOrderTotal {
                    request: row.request.into_domain()?,
                    order_total,
                })
            })
            .collect()
    }
}
