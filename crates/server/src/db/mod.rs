//! Database operations for the lifecycle engine (SQLite).
//!
//! ## Tables
//!
//! - `users` - User directory projection (role + bearer-token lookup)
//! - `products` - Catalog projection carrying the stock ledger
//! - `orders` / `order_items` - Order aggregate with embedded return and
//!   shipment mirrors
//! - `return_requests` - Return state machine, `UNIQUE(order_id)`
//!
//! Every lifecycle check-and-set in this module is a single conditional
//! `UPDATE` observed through `rows_affected`, never a read-then-write, so
//! concurrent requests against the same order settle on exactly one winner.
//!
//! # Migrations
//!
//! Embedded from `crates/server/migrations/` and run on startup (and by
//! the integration-test harness) via [`MIGRATOR`].

pub mod orders;
pub mod products;
pub mod returns;
pub mod users;

use std::str::FromStr;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;

pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use returns::ReturnRepository;
pub use users::UserRepository;

/// Embedded migrations for the engine's schema.
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate return request).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `SQLite` connection pool with sensible defaults.
///
/// An in-memory database (`sqlite::memory:`) is capped at a single
/// connection: each pooled connection would otherwise see its own empty
/// database.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<SqlitePool, sqlx::Error> {
    let url = database_url.expose_secret();
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let max_connections = if url.contains(":memory:") { 1 } else { 5 };

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}
