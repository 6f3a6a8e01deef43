//! Domain types for the lifecycle engine.
//!
//! These are validated domain objects, separate from database row types;
//! the repositories in [`crate::db`] convert between the two.

pub mod order;
pub mod product;
pub mod return_request;
pub mod user;

pub use order::{
    Order, OrderItem, OrderWithOwner, OwnerSummary, PaymentConfirmation, ReturnMirror,
    ShipmentInfo, ShippingAddress,
};
pub use product::Product;
pub use return_request::{ReturnRequest, ReturnWithOrderTotal};
pub use user::{CurrentUser, User};
