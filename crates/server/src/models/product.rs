//! Catalog product projection.

use rust_decimal::Decimal;
use serde::Serialize;

use sandpiper_core::ProductId;

/// The slice of a catalog product the lifecycle engine needs: the price
/// snapshot source and the stock ledger entry.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub image: String,
    pub price: Decimal,
    /// Stock ledger entry. May legitimately read negative; see DESIGN.md.
    pub count_in_stock: i64,
}
