//! Business services: lifecycle logic and outbound API clients.

pub mod orders;
pub mod payment;
pub mod returns;
pub mod shipment_sync;
pub mod shipping;
