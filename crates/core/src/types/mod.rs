//! Core types for Sandpiper.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod status;

pub use id::*;
pub use money::{CurrencyCode, Money};
pub use status::{OrderStatus, ReturnStatus, ReturnType};
