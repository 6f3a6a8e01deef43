//! Catalog/stock-ledger repository.
//!
//! The catalog is an external collaborator; the engine only reads product
//! price/stock and moves the stock ledger. Both ledger mutations are
//! single atomic `UPDATE`s with no read-then-write window.

use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::SqlitePool;

use sandpiper_core::ProductId;

use super::RepositoryError;
use crate::models::Product;

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    image: String,
    price: String,
    count_in_stock: i64,
}

impl ProductRow {
    fn into_domain(self) -> Result<Product, RepositoryError> {
        let id = ProductId::parse_str(&self.id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid product id in database: {e}"))
        })?;
        let price = Decimal::from_str(&self.price).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid product price in database: {e}"))
        })?;
        Ok(Product {
            id,
            name: self.name,
            image: self.image,
            price,
            count_in_stock: self.count_in_stock,
        })
    }
}

/// Repository for catalog/stock operations.
pub struct ProductRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a catalog entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(
        &self,
        name: &str,
        image: &str,
        price: Decimal,
        count_in_stock: i64,
    ) -> Result<Product, RepositoryError> {
        let product = Product {
            id: ProductId::new(),
            name: name.to_owned(),
            image: image.to_owned(),
            price,
            count_in_stock,
        };

        sqlx::query(
            r"
            INSERT INTO products (id, name, image, price, count_in_stock)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(product.id.to_string())
        .bind(&product.name)
        .bind(&product.image)
        .bind(product.price.to_string())
        .bind(product.count_in_stock)
        .execute(self.pool)
        .await?;

        Ok(product)
    }

    /// Get a product by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails,
    /// `RepositoryError::DataCorruption` if stored data is invalid.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, image, price, count_in_stock
            FROM products
            WHERE id = ?
            ",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await?;

        row.map(ProductRow::into_domain).transpose()
    }

    /// Atomically decrement stock for a paid line item.
    ///
    /// There is deliberately no floor: the count may go negative (see
    /// DESIGN.md).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist,
    /// `RepositoryError::Database` for other database errors.
    pub async fn decrement_stock(
        &self,
        id: ProductId,
        quantity: i64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE products
            SET count_in_stock = count_in_stock - ?
            WHERE id = ?
            ",
        )
        .bind(quantity)
        .bind(id.to_string())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Atomically restore stock (order cancellation).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist,
    /// `RepositoryError::Database` for other database errors.
    pub async fn increment_stock(
        &self,
        id: ProductId,
        quantity: i64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE products
            SET count_in_stock = count_in_stock + ?
            WHERE id = ?
            ",
        )
        .bind(quantity)
        .bind(id.to_string())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
