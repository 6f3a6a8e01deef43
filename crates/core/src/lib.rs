//! Sandpiper Core - Shared types library.
//!
//! This crate provides common types used across all Sandpiper components:
//! - `server` - Order & return lifecycle service
//! - `integration-tests` - End-to-end lifecycle tests
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere,
//! including in pure unit tests of the state machines.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs and money, plus the
//!   order/return status enums and their legal-transition tables

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
